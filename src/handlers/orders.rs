use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    Collection,
};
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::{page_options, parse_object_id, settings};
use crate::auth::AdminUser;
use crate::checkout;
use crate::config::MongoConfig;
use crate::error::{is_duplicate_key, ApiError};
use crate::models::{
    AppliedCoupon, Coupon, CreateOrderRequest, DiscountType, Order, OrderItem, OrderListQuery,
    OrderStatus, PaymentStatus, Product, UpdateOrderStatusRequest,
};

// Places an order: resolves and snapshots each line item, decrements stock
// with conditional updates, applies an optional coupon, prices the order,
// and persists it under a unique order number. Mutations already applied
// are rolled back before any error is returned, so a failed placement
// leaves no stock or usage-count residue.
pub async fn create_order(
    db: web::Data<MongoConfig>,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;
    if payload.items.is_empty() {
        return Err(ApiError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }

    let products: Collection<Product> = db.database.collection("products");
    let coupons: Collection<Coupon> = db.database.collection("coupons");
    let orders: Collection<Order> = db.database.collection("orders");

    let store = settings::load(&db).await?;
    let now = DateTime::now();

    debug!(
        "placing order for {} with {} line items",
        payload.customer.email,
        payload.items.len()
    );

    // Resolve products and freeze the line-item snapshots.
    let mut items: Vec<OrderItem> = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let product_id = parse_object_id(&line.product_id)?;
        let product = products
            .find_one(doc! { "_id": product_id }, None)
            .await?
            .ok_or(ApiError::NotFound("product"))?;
        if !product.is_active {
            return Err(ApiError::NotFound("product"));
        }
        if product.stock < line.quantity {
            return Err(ApiError::InsufficientStock {
                name: product.name,
                available: product.stock,
                requested: line.quantity,
            });
        }
        items.push(OrderItem {
            product_id,
            unit_price: product.effective_price(),
            name: product.name,
            quantity: line.quantity,
        });
    }

    // Decrement stock one item at a time with a stock >= qty guard, so two
    // concurrent orders cannot jointly oversell. A miss means another order
    // got there first; roll back what this one already took.
    let mut decremented: Vec<(ObjectId, i64)> = Vec::new();
    for item in &items {
        let result = products
            .update_one(
                doc! { "_id": item.product_id, "stock": { "$gte": item.quantity } },
                doc! { "$inc": { "stock": -item.quantity } },
                None,
            )
            .await;
        match result {
            Ok(update) if update.modified_count == 1 => {
                decremented.push((item.product_id, item.quantity));
            }
            Ok(_) => {
                restore_stock(&products, &decremented).await;
                let available = products
                    .find_one(doc! { "_id": item.product_id }, None)
                    .await
                    .ok()
                    .flatten()
                    .map(|p| p.stock)
                    .unwrap_or(0);
                return Err(ApiError::InsufficientStock {
                    name: item.name.clone(),
                    available,
                    requested: item.quantity,
                });
            }
            Err(err) => {
                restore_stock(&products, &decremented).await;
                return Err(err.into());
            }
        }
    }

    let subtotal = checkout::subtotal(&items);

    let coupon_application = match payload.coupon_code.as_deref() {
        Some(code) if !code.trim().is_empty() => {
            match apply_coupon(&coupons, code, subtotal, now).await {
                Ok(applied) => Some(applied),
                Err(err) => {
                    restore_stock(&products, &decremented).await;
                    return Err(err);
                }
            }
        }
        _ => None,
    };

    let discount = coupon_application
        .as_ref()
        .map(|(_, applied)| applied.amount)
        .unwrap_or(0.0);
    let free_shipping = coupon_application
        .as_ref()
        .map(|(_, applied)| applied.discount_type == DiscountType::FreeShipping)
        .unwrap_or(false);

    let shipping_fee = checkout::shipping_for(&store, subtotal, free_shipping);
    let tax = checkout::tax_for(&store, subtotal - discount);
    let total = checkout::total(subtotal, discount, tax, shipping_fee);

    let mut order = Order {
        id: None,
        order_number: String::new(),
        customer: payload.customer.clone(),
        shipping_address: payload.shipping_address.clone(),
        items,
        subtotal,
        discount,
        tax,
        shipping_fee,
        total,
        payment_method: payload.payment_method,
        payment_status: PaymentStatus::Pending,
        status: OrderStatus::Pending,
        coupon: coupon_application.as_ref().map(|(_, applied)| applied.clone()),
        notes: payload.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    // The daily sequence is only a label; the unique index on order_number
    // decides collisions. Recount and retry a bounded number of times when
    // a concurrent placement takes the same number.
    let today = Utc::now();
    let (day_start, day_end) = checkout::day_bounds(today);
    let mut attempt = 0;
    let inserted = loop {
        let sequence = match orders
            .count_documents(
                doc! { "created_at": { "$gte": day_start, "$lt": day_end } },
                None,
            )
            .await
        {
            Ok(count) => count + 1,
            Err(err) => {
                rollback(&products, &decremented, &coupons, &coupon_application).await;
                return Err(err.into());
            }
        };
        order.order_number = checkout::order_number(today, sequence);

        match orders.insert_one(&order, None).await {
            Ok(result) => break result,
            Err(err) if is_duplicate_key(&err) && attempt < checkout::ORDER_NUMBER_RETRIES => {
                attempt += 1;
                warn!(
                    "order number {} already taken, retrying ({}/{})",
                    order.order_number,
                    attempt,
                    checkout::ORDER_NUMBER_RETRIES
                );
            }
            Err(err) => {
                rollback(&products, &decremented, &coupons, &coupon_application).await;
                if is_duplicate_key(&err) {
                    return Err(ApiError::Conflict(
                        "could not allocate a unique order number".to_string(),
                    ));
                }
                return Err(err.into());
            }
        }
    };

    order.id = inserted.inserted_id.as_object_id();
    info!(
        "order {} created: subtotal {:.2}, discount {:.2}, total {:.2}",
        order.order_number, order.subtotal, order.discount, order.total
    );
    Ok(HttpResponse::Created().json(order))
}

// Validates the coupon against the current subtotal and takes one usage.
// The increment re-checks the limit in its filter, so two concurrent orders
// cannot both take the last use.
async fn apply_coupon(
    coupons: &Collection<Coupon>,
    code: &str,
    subtotal: f64,
    now: DateTime,
) -> Result<(ObjectId, AppliedCoupon), ApiError> {
    let normalized = code.trim().to_uppercase();
    let coupon = coupons
        .find_one(doc! { "code": &normalized }, None)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;

    let amount = checkout::validate_coupon(&coupon, subtotal, now)?;
    let coupon_id = coupon
        .id
        .ok_or_else(|| ApiError::Internal("coupon document missing id".to_string()))?;

    let mut filter = doc! { "_id": coupon_id, "is_active": true };
    if let Some(limit) = coupon.usage_limit {
        filter.insert("usage_count", doc! { "$lt": limit });
    }
    let update = coupons
        .update_one(filter, doc! { "$inc": { "usage_count": 1 } }, None)
        .await?;
    if update.modified_count == 0 {
        return Err(ApiError::InvalidCoupon("coupon is not valid or has expired"));
    }

    Ok((
        coupon_id,
        AppliedCoupon {
            code: coupon.code,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            amount,
        },
    ))
}

async fn restore_stock(products: &Collection<Product>, applied: &[(ObjectId, i64)]) {
    for &(product_id, quantity) in applied {
        if let Err(err) = products
            .update_one(
                doc! { "_id": product_id },
                doc! { "$inc": { "stock": quantity } },
                None,
            )
            .await
        {
            error!("failed to restore stock for {}: {}", product_id, err);
        }
    }
}

async fn rollback(
    products: &Collection<Product>,
    decremented: &[(ObjectId, i64)],
    coupons: &Collection<Coupon>,
    coupon_application: &Option<(ObjectId, AppliedCoupon)>,
) {
    restore_stock(products, decremented).await;
    if let Some(&(coupon_id, _)) = coupon_application.as_ref() {
        if let Err(err) = coupons
            .update_one(
                doc! { "_id": coupon_id },
                doc! { "$inc": { "usage_count": -1 } },
                None,
            )
            .await
        {
            error!("failed to restore usage count for coupon {}: {}", coupon_id, err);
        }
    }
}

pub async fn list_orders(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    query: web::Query<OrderListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Order> = db.database.collection("orders");

    let mut filter = Document::new();
    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    let mut result = Vec::new();
    let mut cursor = collection
        .find(filter, page_options(query.page, query.limit))
        .await?;
    while let Some(order) = cursor.try_next().await? {
        result.push(order);
    }

    info!("retrieved {} orders", result.len());
    Ok(HttpResponse::Ok().json(result))
}

pub async fn get_order(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Order> = db.database.collection("orders");

    let object_id = parse_object_id(&id)?;
    let order = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("order"))?;

    Ok(HttpResponse::Ok().json(order))
}

// Admin-driven status advance. The update filters on the status the admin
// saw, so a concurrent transition loses cleanly instead of double-applying;
// cancellation restores each line item's quantity to its product.
pub async fn update_order_status(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let orders: Collection<Order> = db.database.collection("orders");
    let products: Collection<Product> = db.database.collection("products");

    let object_id = parse_object_id(&id)?;
    let order = orders
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("order"))?;

    let next = payload.order_status;
    if !order.status.can_transition_to(next) {
        return Err(ApiError::InvalidStatusTransition {
            from: order.status.as_str(),
            to: next.as_str(),
        });
    }

    let result = orders
        .update_one(
            doc! { "_id": object_id, "status": order.status.as_str() },
            doc! { "$set": { "status": next.as_str(), "updated_at": DateTime::now() } },
            None,
        )
        .await?;
    if result.modified_count == 0 {
        return Err(ApiError::Conflict(
            "order status changed concurrently".to_string(),
        ));
    }

    if next == OrderStatus::Cancelled {
        for item in &order.items {
            if let Err(err) = products
                .update_one(
                    doc! { "_id": item.product_id },
                    doc! { "$inc": { "stock": item.quantity } },
                    None,
                )
                .await
            {
                error!(
                    "failed to restore stock for {} on cancellation of {}: {}",
                    item.product_id, order.order_number, err
                );
            }
        }
        info!("order {} cancelled, stock restored", order.order_number);
    } else {
        info!("order {} moved to {}", order.order_number, next.as_str());
    }

    let updated = orders
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    Ok(HttpResponse::Ok().json(updated))
}

// Administrative override, not part of the order lifecycle; no restock.
pub async fn delete_order(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Order> = db.database.collection("orders");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("order"));
    }

    info!("order {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
