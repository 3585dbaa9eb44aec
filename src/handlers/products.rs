use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    Collection,
};
use tracing::{debug, info};
use validator::Validate;

use super::{page_options, parse_object_id};
use crate::auth::AdminUser;
use crate::config::MongoConfig;
use crate::error::ApiError;
use crate::models::{CreateProductRequest, Product, ProductListQuery, UpdateProductRequest};

pub async fn create_product(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    payload: web::Json<CreateProductRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Product> = db.database.collection("products");

    debug!("creating product: {}", payload.name);

    let category = match &payload.category {
        Some(id) => Some(parse_object_id(id)?),
        None => None,
    };

    let now = DateTime::now();
    let product = Product {
        id: None,
        name: payload.name.clone(),
        description: payload.description.clone(),
        price: payload.price,
        sale_price: payload.sale_price,
        stock: payload.stock,
        category,
        is_active: payload.is_active,
        created_at: now,
        updated_at: now,
    };

    let result = collection.insert_one(&product, None).await?;

    info!("product created with id {}", result.inserted_id);
    Ok(HttpResponse::Created().json(doc! { "id": result.inserted_id }))
}

pub async fn list_products(
    db: web::Data<MongoConfig>,
    query: web::Query<ProductListQuery>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Product> = db.database.collection("products");

    let mut filter = Document::new();
    if !query.include_inactive.unwrap_or(false) {
        filter.insert("is_active", true);
    }
    if let Some(category) = &query.category {
        filter.insert("category", parse_object_id(category)?);
    }

    debug!("listing products with filter {:?}", filter);

    let mut products = Vec::new();
    let mut cursor = collection
        .find(filter, page_options(query.page, query.limit))
        .await?;
    while let Some(product) = cursor.try_next().await? {
        products.push(product);
    }

    info!("retrieved {} products", products.len());
    Ok(HttpResponse::Ok().json(products))
}

pub async fn get_product(
    db: web::Data<MongoConfig>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Product> = db.database.collection("products");

    let object_id = parse_object_id(&id)?;
    let product = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    Ok(HttpResponse::Ok().json(product))
}

pub async fn update_product(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
    payload: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<Product> = db.database.collection("products");

    let object_id = parse_object_id(&id)?;
    debug!("updating product {}: {:?}", id, payload);

    let mut update_doc = Document::new();
    if let Some(name) = &payload.name {
        update_doc.insert("name", name);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(price) = payload.price {
        update_doc.insert("price", price);
    }
    if let Some(sale_price) = payload.sale_price {
        update_doc.insert("sale_price", sale_price);
    }
    if let Some(stock) = payload.stock {
        update_doc.insert("stock", stock);
    }
    if let Some(category) = &payload.category {
        update_doc.insert("category", parse_object_id(category)?);
    }
    if let Some(is_active) = payload.is_active {
        update_doc.insert("is_active", is_active);
    }
    update_doc.insert("updated_at", DateTime::now());

    let result = collection
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("product"));
    }

    let updated = collection
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    info!("product {} updated", id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_product(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collection: Collection<Product> = db.database.collection("products");

    let object_id = parse_object_id(&id)?;
    let result = collection.delete_one(doc! { "_id": object_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("product"));
    }

    info!("product {} deleted", id);
    Ok(HttpResponse::Ok().finish())
}
