//! Framework-agnostic storefront entities.

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;
pub mod selection;
pub mod user;

pub use cart::CartItem;
pub use order::{
    CustomerSnapshot, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    Verification,
};
pub use payment::{PaymentRecord, DIRECT_VERIFICATION_SENTINEL};
pub use product::Product;
pub use selection::{LineRequest, PurchaseSelection};
pub use user::User;
