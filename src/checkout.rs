use chrono::{Datelike, Duration, NaiveTime, Utc};
use mongodb::bson::DateTime;

use crate::error::ApiError;
use crate::models::{Coupon, DiscountType, OrderItem, StoreSettings};

pub const ORDER_NUMBER_PREFIX: &str = "ORD";

// How many times an insert is retried when the order-number unique index
// rejects it before the whole placement is abandoned.
pub const ORDER_NUMBER_RETRIES: u32 = 3;

pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn subtotal(items: &[OrderItem]) -> f64 {
    round_money(
        items
            .iter()
            .map(|item| item.unit_price * item.quantity as f64)
            .sum(),
    )
}

// Discount amount for an already-validated coupon. Free-shipping coupons
// reduce nothing here; they waive the shipping fee instead.
pub fn discount_for(coupon: &Coupon, subtotal: f64) -> f64 {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => subtotal * coupon.discount_value / 100.0,
        DiscountType::Fixed => coupon.discount_value,
        DiscountType::FreeShipping => 0.0,
    };
    round_money(raw.min(subtotal))
}

pub fn validate_coupon(coupon: &Coupon, subtotal: f64, now: DateTime) -> Result<f64, ApiError> {
    if !coupon.is_valid_at(now) {
        return Err(ApiError::InvalidCoupon("coupon is not valid or has expired"));
    }
    if subtotal < coupon.minimum_purchase {
        return Err(ApiError::MinimumPurchaseNotMet {
            minimum: coupon.minimum_purchase,
        });
    }
    Ok(discount_for(coupon, subtotal))
}

pub fn shipping_for(settings: &StoreSettings, subtotal: f64, waived: bool) -> f64 {
    if waived {
        return 0.0;
    }
    if let Some(threshold) = settings.free_shipping_threshold {
        if subtotal >= threshold {
            return 0.0;
        }
    }
    settings.shipping_fee
}

pub fn tax_for(settings: &StoreSettings, taxable: f64) -> f64 {
    round_money(taxable * settings.tax_rate / 100.0)
}

pub fn total(subtotal: f64, discount: f64, tax: f64, shipping_fee: f64) -> f64 {
    round_money(subtotal - discount + tax + shipping_fee)
}

// ORD-YYMMDD-NNNN. The sequence is a best-effort daily counter; the unique
// index on order_number is what actually prevents collisions.
pub fn order_number(day: chrono::DateTime<Utc>, sequence: u64) -> String {
    format!(
        "{}-{:02}{:02}{:02}-{:04}",
        ORDER_NUMBER_PREFIX,
        day.year() % 100,
        day.month(),
        day.day(),
        sequence
    )
}

// [start of day, start of next day) in UTC, as BSON datetimes for counting
// today's orders.
pub fn day_bounds(now: chrono::DateTime<Utc>) -> (DateTime, DateTime) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1);
    (
        DateTime::from_millis(start.timestamp_millis()),
        DateTime::from_millis(end.timestamp_millis()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::oid::ObjectId;

    fn item(unit_price: f64, quantity: i64) -> OrderItem {
        OrderItem {
            product_id: ObjectId::new(),
            name: "Widget".to_string(),
            unit_price,
            quantity,
        }
    }

    fn percentage_coupon(value: f64, minimum_purchase: f64) -> Coupon {
        Coupon {
            id: None,
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: value,
            minimum_purchase,
            starts_at: None,
            expires_at: None,
            is_active: true,
            usage_count: 0,
            usage_limit: None,
            created_at: DateTime::from_millis(0),
        }
    }

    fn settings(tax_rate: f64, shipping_fee: f64) -> StoreSettings {
        StoreSettings {
            tax_rate,
            shipping_fee,
            ..StoreSettings::default()
        }
    }

    #[test]
    fn subtotal_sums_line_items() {
        let items = vec![item(10.0, 2), item(3.5, 3)];
        assert_eq!(subtotal(&items), 30.5);
    }

    #[test]
    fn plain_cart_total_includes_shipping() {
        // Cart [{qty 2, price 10.00}], no coupon, tax 0, shipping 5.
        let items = vec![item(10.0, 2)];
        let s = subtotal(&items);
        assert_eq!(s, 20.0);
        let cfg = settings(0.0, 5.0);
        let shipping = shipping_for(&cfg, s, false);
        let tax = tax_for(&cfg, s);
        assert_eq!(total(s, 0.0, tax, shipping), 25.0);
    }

    #[test]
    fn percentage_discount_is_proportional() {
        let coupon = percentage_coupon(10.0, 0.0);
        assert_eq!(discount_for(&coupon, 80.0), 8.0);
    }

    #[test]
    fn percentage_discount_never_exceeds_subtotal() {
        let coupon = percentage_coupon(150.0, 0.0);
        assert_eq!(discount_for(&coupon, 40.0), 40.0);
    }

    #[test]
    fn fixed_discount_is_clamped_to_subtotal() {
        let mut coupon = percentage_coupon(0.0, 0.0);
        coupon.discount_type = DiscountType::Fixed;
        coupon.discount_value = 15.0;
        assert_eq!(discount_for(&coupon, 40.0), 15.0);
        assert_eq!(discount_for(&coupon, 10.0), 10.0);
    }

    #[test]
    fn free_shipping_coupon_waives_fee_not_subtotal() {
        let mut coupon = percentage_coupon(0.0, 0.0);
        coupon.discount_type = DiscountType::FreeShipping;
        assert_eq!(discount_for(&coupon, 40.0), 0.0);

        let cfg = settings(0.0, 7.5);
        assert_eq!(shipping_for(&cfg, 40.0, true), 0.0);
        assert_eq!(shipping_for(&cfg, 40.0, false), 7.5);
    }

    #[test]
    fn minimum_purchase_is_enforced() {
        // SAVE10 (10%, minimum 50) against a 40.00 cart.
        let coupon = percentage_coupon(10.0, 50.0);
        let now = DateTime::from_millis(0);
        match validate_coupon(&coupon, 40.0, now) {
            Err(ApiError::MinimumPurchaseNotMet { minimum }) => assert_eq!(minimum, 50.0),
            other => panic!("expected MinimumPurchaseNotMet, got {:?}", other),
        }
        assert_eq!(validate_coupon(&coupon, 50.0, now).unwrap(), 5.0);
    }

    #[test]
    fn exhausted_coupon_is_rejected() {
        let mut coupon = percentage_coupon(10.0, 0.0);
        coupon.usage_limit = Some(3);
        coupon.usage_count = 3;
        let result = validate_coupon(&coupon, 100.0, DateTime::from_millis(0));
        assert!(matches!(result, Err(ApiError::InvalidCoupon(_))));
    }

    #[test]
    fn free_shipping_threshold_applies() {
        let mut cfg = settings(0.0, 5.0);
        cfg.free_shipping_threshold = Some(100.0);
        assert_eq!(shipping_for(&cfg, 99.99, false), 5.0);
        assert_eq!(shipping_for(&cfg, 100.0, false), 0.0);
    }

    #[test]
    fn tax_is_a_percentage_of_the_taxable_amount() {
        let cfg = settings(8.25, 0.0);
        assert_eq!(tax_for(&cfg, 100.0), 8.25);
        assert_eq!(tax_for(&cfg, 0.0), 0.0);
    }

    #[test]
    fn order_number_format_and_padding() {
        let day = Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 0).unwrap();
        assert_eq!(order_number(day, 1), "ORD-260806-0001");
        assert_eq!(order_number(day, 42), "ORD-260806-0042");
        assert_eq!(order_number(day, 10_000), "ORD-260806-10000");
    }

    #[test]
    fn order_numbers_increase_within_a_day() {
        let day = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let numbers: Vec<String> = (1..=5).map(|seq| order_number(day, seq)).collect();
        let mut sorted = numbers.clone();
        sorted.sort();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn day_bounds_cover_exactly_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 23, 59, 59).unwrap();
        let (start, end) = day_bounds(now);
        let expected_start = Utc.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap();
        let expected_end = Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap();
        assert_eq!(start.timestamp_millis(), expected_start.timestamp_millis());
        assert_eq!(end.timestamp_millis(), expected_end.timestamp_millis());
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(round_money(0.1 + 0.2), 0.3);
        assert_eq!(round_money(3.0 * 19.99), 59.97);
    }
}
