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
use crate::models::{CreateFeedbackRequest, Feedback, ListQuery, UpdateFeedbackRequest};

pub async fn create_feedback(
    db: web::Data<MongoConfig>,
    payload: web::Json<CreateFeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Feedback> = db.database.collection("feedback");

    let feedback = Feedback {
        id: None,
        name: payload.name.clone(),
        email: payload.email.clone(),
        subject: payload.subject.clone(),
        message: payload.message.clone(),
        is_resolved: false,
        created_at: DateTime::now(),
    };

    let result = collection.insert_one(&feedback, None).await?;

    info!("feedback received from {}", feedback.email);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

pub async fn list_feedback(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Feedback> = db.database.collection("feedback");

    let mut entries = Vec::new();
    let mut cursor = collection
        .find(None, page_options(query.page, query.limit))
        .await?;
    while let Some(entry) = cursor.try_next().await? {
        entries.push(entry);
    }

    Ok(HttpResponse::Ok().json(entries))
}

pub async fn update_feedback(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateFeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Feedback> = db.database.collection("feedback");

    let object_id = parse_object_id(&id)?;

    let mut update_doc = Document::new();
    if let Some(is_resolved) = payload.is_resolved {
        update_doc.insert("is_resolved", is_resolved);
    }

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("feedback"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("feedback"))?;

    info!("feedback {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_feedback(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Feedback> = db.database.collection("feedback");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("feedback"));
    }

    info!("feedback {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
