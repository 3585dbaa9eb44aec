use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    Collection,
};
use tracing::info;
use validator::Validate;

use super::{page_options, parse_object_id};
use crate::auth::AdminUser;
use crate::config::MongoConfig;
use crate::error::ApiError;
use crate::models::{CreateReviewRequest, ListQuery, Product, Review, UpdateReviewRequest};

// Reviews enter unapproved and stay hidden from the storefront until an
// admin approves them.
pub async fn create_review(
    db: web::Data<MongoConfig>,
    product_id: web::Path<String>,
    payload: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let products: Collection<Product> = db.database.collection("products");
    let reviews: Collection<Review> = db.database.collection("reviews");

    let product_id = parse_object_id(&product_id)?;
    products
        .find_one(doc! { "_id": product_id }, None)
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    let review = Review {
        id: None,
        product_id,
        author: payload.author.clone(),
        email: payload.email.clone(),
        rating: payload.rating,
        comment: payload.comment.clone(),
        is_approved: false,
        created_at: DateTime::now(),
    };

    let result = reviews.insert_one(&review, None).await?;

    info!("review created for product {}", product_id);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

pub async fn list_product_reviews(
    db: web::Data<MongoConfig>,
    product_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Review> = db.database.collection("reviews");

    let product_id = parse_object_id(&product_id)?;

    let mut reviews = Vec::new();
    let mut cursor = collection
        .find(doc! { "product_id": product_id, "is_approved": true }, None)
        .await?;
    while let Some(review) = cursor.try_next().await? {
        reviews.push(review);
    }

    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn list_reviews(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Review> = db.database.collection("reviews");

    let mut reviews = Vec::new();
    let mut cursor = collection
        .find(None, page_options(query.page, query.limit))
        .await?;
    while let Some(review) = cursor.try_next().await? {
        reviews.push(review);
    }

    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn update_review(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Review> = db.database.collection("reviews");

    let object_id = parse_object_id(&id)?;

    let mut update_doc = Document::new();
    if let Some(is_approved) = payload.is_approved {
        update_doc.insert("is_approved", is_approved);
    }
    if let Some(comment) = &payload.comment {
        update_doc.insert("comment", comment);
    }

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("review"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("review"))?;

    info!("review {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_review(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Review> = db.database.collection("reviews");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("review"));
    }

    info!("review {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
