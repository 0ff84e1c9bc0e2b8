//! Catalog product as seen by checkout.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: BigDecimal,
    pub in_stock: bool,
    pub is_deal: bool,
    pub deal_price: Option<BigDecimal>,
    pub deal_expiry: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: BigDecimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            in_stock: true,
            is_deal: false,
            deal_price: None,
            deal_expiry: None,
        }
    }

    pub fn with_deal(mut self, deal_price: BigDecimal, deal_expiry: Option<DateTime<Utc>>) -> Self {
        self.is_deal = true;
        self.deal_price = Some(deal_price);
        self.deal_expiry = deal_expiry;
        self
    }

    /// Whether the deal price applies at `now`. A deal without an expiry never lapses.
    pub fn deal_active(&self, now: DateTime<Utc>) -> bool {
        self.is_deal
            && self.deal_price.is_some()
            && self.deal_expiry.map_or(true, |expiry| expiry > now)
    }

    pub fn effective_price(&self, now: DateTime<Utc>) -> &BigDecimal {
        match &self.deal_price {
            Some(deal_price) if self.deal_active(now) => deal_price,
            _ => &self.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sofa() -> Product {
        Product::new("P1", "Three seater sofa", BigDecimal::from(1000))
    }

    #[test]
    fn regular_price_without_deal() {
        assert_eq!(sofa().effective_price(Utc::now()), &BigDecimal::from(1000));
    }

    #[test]
    fn open_ended_deal_applies() {
        let product = sofa().with_deal(BigDecimal::from(800), None);
        assert_eq!(product.effective_price(Utc::now()), &BigDecimal::from(800));
    }

    #[test]
    fn unexpired_deal_applies() {
        let now = Utc::now();
        let product = sofa().with_deal(BigDecimal::from(800), Some(now + Duration::hours(1)));
        assert_eq!(product.effective_price(now), &BigDecimal::from(800));
    }

    #[test]
    fn expired_deal_falls_back_to_price() {
        let now = Utc::now();
        let product = sofa().with_deal(BigDecimal::from(500), Some(now - Duration::hours(1)));
        assert!(!product.deal_active(now));
        assert_eq!(product.effective_price(now), &BigDecimal::from(1000));
    }

    #[test]
    fn deal_flag_without_price_is_ignored() {
        let mut product = sofa();
        product.is_deal = true;
        assert_eq!(product.effective_price(Utc::now()), &BigDecimal::from(1000));
    }
}
