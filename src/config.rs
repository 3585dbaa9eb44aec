use mongodb::{
    bson::doc,
    options::IndexOptions,
    Client, Database, IndexModel,
};
use std::env;
use dotenv::dotenv;

pub struct MongoConfig {
    pub database: Database,
}

impl MongoConfig {
    pub async fn init() -> Result<Self, mongodb::error::Error> {
        dotenv().ok();

        let mongo_uri = env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let database_name = env::var("DATABASE_NAME")
            .unwrap_or_else(|_| "storefront_db".to_string());

        let client = Client::with_uri_str(&mongo_uri).await?;
        let database = client.database(&database_name);

        Ok(MongoConfig { database })
    }

    // The unique index on order_number is the real collision guard for the
    // daily-sequence numbering; the one on coupon code backs case-normalized
    // lookups.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let unique = IndexOptions::builder().unique(true).build();

        self.database
            .collection::<crate::models::Order>("orders")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "order_number": 1 })
                    .options(unique.clone())
                    .build(),
                None,
            )
            .await?;

        self.database
            .collection::<crate::models::Coupon>("coupons")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "code": 1 })
                    .options(unique)
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub refresh_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        AppConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-jwt-secret".to_string()),
            refresh_secret: env::var("REFRESH_SECRET")
                .unwrap_or_else(|_| "dev-refresh-secret".to_string()),
        }
    }
}
