use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    Collection,
};
use tracing::{debug, info};
use validator::Validate;

use super::{page_options, parse_object_id};
use crate::auth::AdminUser;
use crate::config::MongoConfig;
use crate::error::ApiError;
use crate::models::{CreateOfferRequest, ListQuery, Offer, UpdateOfferRequest};

pub async fn create_offer(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    payload: web::Json<CreateOfferRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    if payload.ends_at < payload.starts_at {
        return Err(ApiError::Validation(
            "offer must end after it starts".to_string(),
        ));
    }

    let collection: Collection<Offer> = db.database.collection("offers");

    let product_ids = parse_product_ids(&payload.product_ids)?;
    let offer = Offer {
        id: None,
        title: payload.title.clone(),
        description: payload.description.clone(),
        discount_percent: payload.discount_percent,
        product_ids,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        is_active: payload.is_active,
        created_at: DateTime::now(),
    };

    let result = collection.insert_one(&offer, None).await?;

    info!("offer created with id {}", result.inserted_id);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

// Storefront endpoint: only offers whose flag is set and whose window
// contains the current time.
pub async fn list_active_offers(db: web::Data<MongoConfig>) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Offer> = db.database.collection("offers");

    let now = DateTime::now();
    debug!("listing offers live at {}", now);

    let mut offers = Vec::new();
    let mut cursor = collection
        .find(
            doc! {
                "is_active": true,
                "starts_at": { "$lte": now },
                "ends_at": { "$gte": now },
            },
            None,
        )
        .await?;
    while let Some(offer) = cursor.try_next().await? {
        offers.push(offer);
    }

    Ok(HttpResponse::Ok().json(offers))
}

pub async fn list_offers(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Offer> = db.database.collection("offers");

    let mut offers = Vec::new();
    let mut cursor = collection
        .find(None, page_options(query.page, query.limit))
        .await?;
    while let Some(offer) = cursor.try_next().await? {
        offers.push(offer);
    }

    Ok(HttpResponse::Ok().json(offers))
}

pub async fn get_offer(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Offer> = db.database.collection("offers");

    let object_id = parse_object_id(&id)?;
    let offer = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("offer"))?;

    Ok(HttpResponse::Ok().json(offer))
}

pub async fn update_offer(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateOfferRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Offer> = db.database.collection("offers");

    let object_id = parse_object_id(&id)?;

    let mut update_doc = Document::new();
    if let Some(title) = &payload.title {
        update_doc.insert("title", title);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(discount_percent) = payload.discount_percent {
        update_doc.insert("discount_percent", discount_percent);
    }
    if let Some(product_ids) = &payload.product_ids {
        update_doc.insert("product_ids", parse_product_ids(product_ids)?);
    }
    if let Some(starts_at) = payload.starts_at {
        update_doc.insert("starts_at", starts_at);
    }
    if let Some(ends_at) = payload.ends_at {
        update_doc.insert("ends_at", ends_at);
    }
    if let Some(is_active) = payload.is_active {
        update_doc.insert("is_active", is_active);
    }

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("offer"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("offer"))?;

    info!("offer {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_offer(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Offer> = db.database.collection("offers");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("offer"));
    }

    info!("offer {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}

fn parse_product_ids(ids: &[String]) -> Result<Vec<ObjectId>, ApiError> {
    ids.iter().map(|id| parse_object_id(id)).collect()
}
