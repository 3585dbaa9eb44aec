use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<f64>,
    pub stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ObjectId>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Product {
    // Sale price wins only when it actually undercuts the list price.
    pub fn effective_price(&self) -> f64 {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeShipping,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
            DiscountType::FreeShipping => "free_shipping",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Coupon {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub minimum_purchase: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
    pub is_active: bool,
    pub usage_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<i64>,
    pub created_at: DateTime,
}

impl Coupon {
    pub fn is_valid_at(&self, now: DateTime) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(starts) = self.starts_at {
            if now < starts {
                return false;
            }
        }
        if let Some(expires) = self.expires_at {
            if now > expires {
                return false;
            }
        }
        match self.usage_limit {
            Some(limit) => self.usage_count < limit,
            None => true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Card,
    Paypal,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    // Admin advances one step at a time; cancellation is open to every
    // non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Shipped, Cancelled)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CustomerInfo {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "zip is required"))]
    pub zip: String,
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
}

// Name and price are frozen at order time; later product edits must not
// touch placed orders.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderItem {
    pub product_id: ObjectId,
    pub name: String,
    pub unit_price: f64,
    pub quantity: i64,
}

// Snapshot of the applied coupon terms, not a live reference.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub shipping_fee: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub product_id: ObjectId,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Offer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub discount_percent: f64,
    #[serde(default)]
    pub product_ids: Vec<ObjectId>,
    pub starts_at: DateTime,
    pub ends_at: DateTime,
    pub is_active: bool,
    pub created_at: DateTime,
}

impl Offer {
    pub fn is_live_at(&self, now: DateTime) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Feedback {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub store_name: String,
    pub currency: String,
    pub tax_rate: f64,
    pub shipping_fee: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_shipping_threshold: Option<f64>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            id: None,
            store_name: "Storefront".to_string(),
            currency: "USD".to_string(),
            tax_rate: 0.0,
            shipping_fee: 0.0,
            free_shipping_threshold: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub sale_price: Option<f64>,
    #[validate(range(min = 0))]
    pub stock: i64,
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    #[validate(range(min = 0))]
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, message = "code must be at least 3 characters"))]
    pub code: String,
    pub discount_type: DiscountType,
    #[validate(range(min = 0.0))]
    pub discount_value: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub minimum_purchase: f64,
    pub starts_at: Option<DateTime>,
    pub expires_at: Option<DateTime>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub usage_limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCouponRequest {
    #[validate(range(min = 0.0))]
    pub discount_value: Option<f64>,
    #[validate(range(min = 0.0))]
    pub minimum_purchase: Option<f64>,
    pub starts_at: Option<DateTime>,
    pub expires_at: Option<DateTime>,
    pub is_active: Option<bool>,
    pub usage_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_amount: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerInfo,
    #[validate]
    pub items: Vec<OrderItemRequest>,
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub order_status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub is_approved: Option<bool>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOfferRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount_percent: f64,
    #[serde(default)]
    pub product_ids: Vec<String>,
    pub starts_at: DateTime,
    pub ends_at: DateTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOfferRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount_percent: Option<f64>,
    pub product_ids: Option<Vec<String>>,
    pub starts_at: Option<DateTime>,
    pub ends_at: Option<DateTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeedbackRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFeedbackRequest {
    pub is_resolved: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    pub store_name: Option<String>,
    pub currency: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub tax_rate: Option<f64>,
    #[validate(range(min = 0.0))]
    pub shipping_fee: Option<f64>,
    pub free_shipping_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub include_inactive: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(usage_count: i64, usage_limit: Option<i64>) -> Coupon {
        Coupon {
            id: None,
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10.0,
            minimum_purchase: 0.0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            usage_count,
            usage_limit,
            created_at: DateTime::from_millis(0),
        }
    }

    #[test]
    fn effective_price_prefers_lower_sale_price() {
        let mut product = Product {
            id: None,
            name: "Widget".to_string(),
            description: String::new(),
            price: 10.0,
            sale_price: Some(8.0),
            stock: 5,
            category: None,
            is_active: true,
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        };
        assert_eq!(product.effective_price(), 8.0);

        // A "sale" price above list is ignored.
        product.sale_price = Some(12.0);
        assert_eq!(product.effective_price(), 10.0);

        product.sale_price = None;
        assert_eq!(product.effective_price(), 10.0);
    }

    #[test]
    fn coupon_validity_window() {
        let now = DateTime::from_millis(1_000_000);
        let mut c = coupon(0, None);
        assert!(c.is_valid_at(now));

        c.starts_at = Some(DateTime::from_millis(2_000_000));
        assert!(!c.is_valid_at(now));

        c.starts_at = Some(DateTime::from_millis(500_000));
        c.expires_at = Some(DateTime::from_millis(900_000));
        assert!(!c.is_valid_at(now));

        c.expires_at = Some(DateTime::from_millis(2_000_000));
        assert!(c.is_valid_at(now));

        c.is_active = false;
        assert!(!c.is_valid_at(now));
    }

    #[test]
    fn coupon_usage_limit_exhaustion() {
        let now = DateTime::from_millis(0);
        assert!(coupon(4, Some(5)).is_valid_at(now));
        assert!(!coupon(5, Some(5)).is_valid_at(now));
        assert!(coupon(5, None).is_valid_at(now));
    }

    #[test]
    fn order_status_happy_path_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Processing));
    }

    #[test]
    fn cancellation_only_from_non_terminal_states() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn offer_live_window() {
        let offer = Offer {
            id: None,
            title: "Summer sale".to_string(),
            description: String::new(),
            discount_percent: 20.0,
            product_ids: vec![],
            starts_at: DateTime::from_millis(100),
            ends_at: DateTime::from_millis(200),
            is_active: true,
            created_at: DateTime::from_millis(0),
        };
        assert!(!offer.is_live_at(DateTime::from_millis(50)));
        assert!(offer.is_live_at(DateTime::from_millis(150)));
        assert!(!offer.is_live_at(DateTime::from_millis(250)));
    }
}
