//! Server-side pricing. Client-supplied prices and totals never reach here.

use std::collections::HashMap;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};

use crate::domain::{LineRequest, Product, PurchaseSelection};
use crate::ports::Repository;

use super::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub struct QuotedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub lines: Vec<QuotedLine>,
    pub total: BigDecimal,
    pub priced_at: DateTime<Utc>,
}

/// Loads the referenced products and prices the selection at `now`.
pub async fn quote(
    repo: &dyn Repository,
    selection: &PurchaseSelection,
    now: DateTime<Utc>,
) -> EngineResult<Quote> {
    let lines = selection.lines();
    let mut ids: Vec<String> = lines.iter().map(|line| line.product_id.clone()).collect();
    ids.sort();
    ids.dedup();

    let products = repo.get_products(&ids).await?;
    price_lines(&products, &lines, now)
}

/// Sums effective price × quantity per line.
pub fn price_lines(products: &[Product], lines: &[LineRequest], now: DateTime<Utc>) -> EngineResult<Quote> {
    if lines.is_empty() {
        return Err(EngineError::Validation("at least one item is required".to_string()));
    }

    let catalog: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut quoted = Vec::with_capacity(lines.len());
    let mut total = BigDecimal::from(0);

    for line in lines {
        if line.quantity <= 0 {
            return Err(EngineError::Validation(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }

        let product = catalog
            .get(line.product_id.as_str())
            .ok_or_else(|| EngineError::ProductNotFound(line.product_id.clone()))?;

        if !product.in_stock {
            return Err(EngineError::ProductUnavailable(product.id.clone()));
        }

        let unit_price = product.effective_price(now).clone();
        total += &unit_price * BigDecimal::from(line.quantity);

        quoted.push(QuotedLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price,
        });
    }

    Ok(Quote {
        lines: quoted,
        total,
        priced_at: now,
    })
}

/// Converts a major-unit amount into gateway minor units (paise, cents).
pub fn to_minor_units(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100)).with_scale(0).to_i64()
}

pub fn from_minor_units(amount_minor: i64) -> BigDecimal {
    BigDecimal::from(amount_minor) / BigDecimal::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn line(id: &str, quantity: i32) -> LineRequest {
        LineRequest {
            product_id: id.to_string(),
            quantity,
        }
    }

    fn catalog(now: DateTime<Utc>) -> Vec<Product> {
        vec![
            Product::new("P1", "Teak dining table", BigDecimal::from(1000)),
            Product::new("P2", "Bookshelf", BigDecimal::from(2500))
                .with_deal(BigDecimal::from(500), Some(now - Duration::minutes(5))),
            Product::new("P3", "Recliner", BigDecimal::from(4000))
                .with_deal(BigDecimal::from(3200), Some(now + Duration::hours(1))),
        ]
    }

    #[test]
    fn prices_at_catalog_price() {
        let now = Utc::now();
        let quote = price_lines(&catalog(now), &[line("P1", 2)], now).unwrap();
        assert_eq!(quote.total, BigDecimal::from(2000));
        assert_eq!(quote.lines[0].unit_price, BigDecimal::from(1000));
    }

    #[test]
    fn expired_deal_prices_at_regular_price() {
        let now = Utc::now();
        let quote = price_lines(&catalog(now), &[line("P2", 1)], now).unwrap();
        assert_eq!(quote.total, BigDecimal::from(2500));
    }

    #[test]
    fn active_deal_prices_at_deal_price() {
        let now = Utc::now();
        let quote = price_lines(&catalog(now), &[line("P3", 2)], now).unwrap();
        assert_eq!(quote.total, BigDecimal::from(6400));
    }

    #[test]
    fn sums_multiple_lines() {
        let now = Utc::now();
        let quote = price_lines(&catalog(now), &[line("P1", 1), line("P3", 1), line("P2", 2)], now).unwrap();
        assert_eq!(quote.total, BigDecimal::from(1000 + 3200 + 5000));
        assert_eq!(quote.lines.len(), 3);
    }

    #[test]
    fn unknown_product_is_rejected() {
        let now = Utc::now();
        let err = price_lines(&catalog(now), &[line("P1", 1), line("NOPE", 1)], now).unwrap_err();
        assert!(matches!(err, EngineError::ProductNotFound(id) if id == "NOPE"));
    }

    #[test]
    fn out_of_stock_product_is_rejected() {
        let now = Utc::now();
        let mut products = catalog(now);
        products[0].in_stock = false;
        let err = price_lines(&products, &[line("P1", 1)], now).unwrap_err();
        assert!(matches!(err, EngineError::ProductUnavailable(_)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let now = Utc::now();
        assert!(price_lines(&catalog(now), &[line("P1", 0)], now).is_err());
        assert!(price_lines(&catalog(now), &[], now).is_err());
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(&BigDecimal::from(1600)), Some(160_000));
        assert_eq!(to_minor_units(&BigDecimal::from_str("19.99").unwrap()), Some(1999));
        assert_eq!(from_minor_units(1999), BigDecimal::from_str("19.99").unwrap());
    }
}
