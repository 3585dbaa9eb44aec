use actix_web::{web, HttpResponse};
use mongodb::{
    bson::doc,
    options::ReplaceOptions,
    Collection,
};
use tracing::info;
use validator::Validate;

use crate::auth::AdminUser;
use crate::config::MongoConfig;
use crate::error::ApiError;
use crate::models::{StoreSettings, UpdateSettingsRequest};

// Tax and shipping rates for order pricing come from this singleton;
// defaults apply until an admin saves one.
pub async fn load(db: &MongoConfig) -> Result<StoreSettings, ApiError> {
    let collection: Collection<StoreSettings> = db.database.collection("settings");
    Ok(collection.find_one(None, None).await?.unwrap_or_default())
}

pub async fn get_settings(db: web::Data<MongoConfig>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(load(&db).await?))
}

pub async fn update_settings(
    db: web::Data<MongoConfig>,
    _admin: AdminUser,
    payload: web::Json<UpdateSettingsRequest>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let collection: Collection<StoreSettings> = db.database.collection("settings");

    let mut settings = load(&db).await?;
    if let Some(store_name) = &payload.store_name {
        settings.store_name = store_name.clone();
    }
    if let Some(currency) = &payload.currency {
        settings.currency = currency.clone();
    }
    if let Some(tax_rate) = payload.tax_rate {
        settings.tax_rate = tax_rate;
    }
    if let Some(shipping_fee) = payload.shipping_fee {
        settings.shipping_fee = shipping_fee;
    }
    if let Some(threshold) = payload.free_shipping_threshold {
        settings.free_shipping_threshold = Some(threshold);
    }

    collection
        .replace_one(
            doc! {},
            &settings,
            ReplaceOptions::builder().upsert(true).build(),
        )
        .await?;

    info!("store settings updated");
    Ok(HttpResponse::Ok().json(settings))
}
