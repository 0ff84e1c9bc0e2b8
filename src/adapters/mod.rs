pub mod channel_notifier;
pub mod disabled_gateway;
pub mod gateway_transport;
pub mod http_channel;
pub mod log_channel;
pub mod memory_repository;
pub mod postgres_repository;
pub mod razorpay;
pub mod stripe;

pub use channel_notifier::ChannelNotifier;
pub use disabled_gateway::DisabledGateway;
pub use http_channel::HttpChannel;
pub use log_channel::LogChannel;
pub use memory_repository::InMemoryRepository;
pub use postgres_repository::PostgresRepository;
pub use razorpay::RazorpayGateway;
pub use stripe::StripeGateway;
