use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    Collection,
};
use tracing::{debug, info};
use validator::Validate;

use super::parse_object_id;
use crate::auth::AdminUser;
use crate::config::MongoConfig;
use crate::error::ApiError;
use crate::models::{Category, CreateCategoryRequest, UpdateCategoryRequest};

pub async fn create_category(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    payload: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Category> = db.database.collection("categories");

    let category = Category {
        id: None,
        name: payload.name.clone(),
        description: payload.description.clone(),
        is_active: payload.is_active,
        created_at: DateTime::now(),
    };

    let result = collection.insert_one(&category, None).await?;

    info!("category created with id {}", result.inserted_id);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

pub async fn list_categories(db: web::Data<MongoConfig>) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Category> = db.database.collection("categories");

    debug!("listing categories");

    let mut categories = Vec::new();
    let mut cursor = collection.find(None, None).await?;
    while let Some(category) = cursor.try_next().await? {
        categories.push(category);
    }

    Ok(HttpResponse::Ok().json(categories))
}

pub async fn get_category(
    db: web::Data<MongoConfig>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Category> = db.database.collection("categories");

    let object_id = parse_object_id(&id)?;
    let category = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("category"))?;

    Ok(HttpResponse::Ok().json(category))
}

pub async fn update_category(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Category> = db.database.collection("categories");

    let object_id = parse_object_id(&id)?;

    let mut update_doc = Document::new();
    if let Some(name) = &payload.name {
        update_doc.insert("name", name);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(is_active) = payload.is_active {
        update_doc.insert("is_active", is_active);
    }

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("category"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("category"))?;

    info!("category {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_category(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Category> = db.database.collection("categories");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("category"));
    }

    info!("category {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
