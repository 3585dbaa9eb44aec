mod auth;
mod checkout;
mod config;
mod error;
mod handlers;
mod models;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use config::{AppConfig, MongoConfig};
use handlers::{categories, coupons, feedback, offers, orders, products, reviews, settings};
use mongodb::bson::doc;
use tracing::{info, Level};
use tracing_subscriber::{self, EnvFilter};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("actix_web=info".parse().unwrap())
                .add_directive("storefront_json_api=debug".parse().unwrap()),
        )
        .init();

    info!("Starting storefront API server");

    let mongo_config = MongoConfig::init()
        .await
        .expect("Failed to initialize MongoDB");
    mongo_config
        .ensure_indexes()
        .await
        .expect("Failed to create indexes");

    info!("MongoDB connection established");
    let app_config = AppConfig::from_env();
    let bind_addr = app_config.bind_addr.clone();
    let db_data = web::Data::new(mongo_config);
    let config_data = web::Data::new(app_config);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                // Malformed bodies get the same {message} shape as business errors.
                let message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(doc! { "message": message }),
                )
                .into()
            }))
            .service(
                web::scope("/api/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh_token)),
            )
            .service(
                web::scope("/api/products")
                    .route("", web::post().to(products::create_product))
                    .route("", web::get().to(products::list_products))
                    .route("/{id}", web::get().to(products::get_product))
                    .route("/{id}", web::put().to(products::update_product))
                    .route("/{id}", web::delete().to(products::delete_product))
                    .route("/{id}/reviews", web::get().to(reviews::list_product_reviews))
                    .route("/{id}/reviews", web::post().to(reviews::create_review)),
            )
            .service(
                web::scope("/api/categories")
                    .route("", web::post().to(categories::create_category))
                    .route("", web::get().to(categories::list_categories))
                    .route("/{id}", web::get().to(categories::get_category))
                    .route("/{id}", web::put().to(categories::update_category))
                    .route("/{id}", web::delete().to(categories::delete_category)),
            )
            .service(
                web::scope("/api/orders")
                    .route("", web::post().to(orders::create_order))
                    .route("", web::get().to(orders::list_orders))
                    .route("/{id}", web::get().to(orders::get_order))
                    .route("/{id}/status", web::put().to(orders::update_order_status))
                    .route("/{id}", web::delete().to(orders::delete_order)),
            )
            .service(
                web::scope("/api/coupons")
                    .route("/validate", web::post().to(coupons::validate_coupon))
                    .route("", web::post().to(coupons::create_coupon))
                    .route("", web::get().to(coupons::list_coupons))
                    .route("/{id}", web::get().to(coupons::get_coupon))
                    .route("/{id}", web::put().to(coupons::update_coupon))
                    .route("/{id}", web::delete().to(coupons::delete_coupon)),
            )
            .service(
                web::scope("/api/offers")
                    .route("/active", web::get().to(offers::list_active_offers))
                    .route("", web::post().to(offers::create_offer))
                    .route("", web::get().to(offers::list_offers))
                    .route("/{id}", web::get().to(offers::get_offer))
                    .route("/{id}", web::put().to(offers::update_offer))
                    .route("/{id}", web::delete().to(offers::delete_offer)),
            )
            .service(
                web::scope("/api/reviews")
                    .route("", web::get().to(reviews::list_reviews))
                    .route("/{id}", web::put().to(reviews::update_review))
                    .route("/{id}", web::delete().to(reviews::delete_review)),
            )
            .service(
                web::scope("/api/feedback")
                    .route("", web::post().to(feedback::create_feedback))
                    .route("", web::get().to(feedback::list_feedback))
                    .route("/{id}", web::put().to(feedback::update_feedback))
                    .route("/{id}", web::delete().to(feedback::delete_feedback)),
            )
            .service(
                web::scope("/api/settings")
                    .route("", web::get().to(settings::get_settings))
                    .route("", web::put().to(settings::update_settings)),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await
}
