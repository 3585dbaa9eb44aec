use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    Collection,
};
use serde::Serialize;
use tracing::{debug, info};
use validator::Validate;

use super::{page_options, parse_object_id};
use crate::auth::AdminUser;
use crate::checkout;
use crate::config::MongoConfig;
use crate::error::{is_duplicate_key, ApiError};
use crate::models::{
    Coupon, CreateCouponRequest, ListQuery, UpdateCouponRequest, ValidateCouponRequest,
};

#[derive(Serialize)]
struct CouponValidation {
    valid: bool,
    discount: f64,
    coupon: Coupon,
}

// Storefront pre-check before checkout. Succeeding here does not reserve a
// use; placement re-validates and takes the usage atomically.
pub async fn validate_coupon(
    db: web::Data<MongoConfig>,
    payload: web::Json<ValidateCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Coupon> = db.database.collection("coupons");

    let normalized = payload.code.trim().to_uppercase();
    debug!("validating coupon {}", normalized);

    let message = match collection.find_one(doc! { "code": &normalized }, None).await? {
        Some(coupon) => {
            match checkout::validate_coupon(&coupon, payload.order_amount, DateTime::now()) {
                Ok(discount) => {
                    return Ok(HttpResponse::Ok().json(CouponValidation {
                        valid: true,
                        discount,
                        coupon,
                    }));
                }
                Err(err) => err.to_string(),
            }
        }
        None => "coupon not found".to_string(),
    };

    Ok(HttpResponse::BadRequest().json(doc! { "valid": false, "message": message }))
}

pub async fn create_coupon(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    payload: web::Json<CreateCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Coupon> = db.database.collection("coupons");

    // Codes are stored uppercase; lookups normalize the same way.
    let coupon = Coupon {
        id: None,
        code: payload.code.trim().to_uppercase(),
        discount_type: payload.discount_type,
        discount_value: payload.discount_value,
        minimum_purchase: payload.minimum_purchase,
        starts_at: payload.starts_at,
        expires_at: payload.expires_at,
        is_active: payload.is_active,
        usage_count: 0,
        usage_limit: payload.usage_limit,
        created_at: DateTime::now(),
    };

    let result = match collection.insert_one(&coupon, None).await {
        Ok(result) => result,
        Err(err) if is_duplicate_key(&err) => {
            return Err(ApiError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }
        Err(err) => return Err(err.into()),
    };

    info!("coupon {} created with id {}", coupon.code, result.inserted_id);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

pub async fn list_coupons(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Coupon> = db.database.collection("coupons");

    let mut coupons = Vec::new();
    let mut cursor = collection
        .find(None, page_options(query.page, query.limit))
        .await?;
    while let Some(coupon) = cursor.try_next().await? {
        coupons.push(coupon);
    }

    Ok(HttpResponse::Ok().json(coupons))
}

pub async fn get_coupon(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Coupon> = db.database.collection("coupons");

    let object_id = parse_object_id(&id)?;
    let coupon = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;

    Ok(HttpResponse::Ok().json(coupon))
}

// The code itself is immutable once issued; orders snapshot the applied
// terms, so edits here never reprice a placed order.
pub async fn update_coupon(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Coupon> = db.database.collection("coupons");

    let object_id = parse_object_id(&id)?;

    let mut update_doc = Document::new();
    if let Some(discount_value) = payload.discount_value {
        update_doc.insert("discount_value", discount_value);
    }
    if let Some(minimum_purchase) = payload.minimum_purchase {
        update_doc.insert("minimum_purchase", minimum_purchase);
    }
    if let Some(starts_at) = payload.starts_at {
        update_doc.insert("starts_at", starts_at);
    }
    if let Some(expires_at) = payload.expires_at {
        update_doc.insert("expires_at", expires_at);
    }
    if let Some(is_active) = payload.is_active {
        update_doc.insert("is_active", is_active);
    }
    if let Some(usage_limit) = payload.usage_limit {
        update_doc.insert("usage_limit", usage_limit);
    }

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("coupon"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;

    info!("coupon {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_coupon(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Coupon> = db.database.collection("coupons");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("coupon"));
    }

    info!("coupon {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
