pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::{OrderService, PromotionService, SharedOrderService, SharedPromotionService};
use auth::JwtKeys;
use domain::order::TransitionPolicy;
use domain::ports::{DirectoryRepository, DishRepository, OrderRepository};
use errors::AppError;
use infrastructure::{DieselDirectoryRepository, DieselDishRepository, DieselOrderRepository};

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("{} pending migration(s) applied", applied.len());
    Ok(())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::change_status,
        handlers::orders::estimate_delivery,
        handlers::orders::assign_courier,
        handlers::orders::confirm_payment,
        handlers::orders::mark_paid,
        handlers::orders::get_order,
        handlers::orders::list_my_orders,
        handlers::orders::list_restaurant_orders,
        handlers::orders::list_assigned_orders,
        handlers::orders::list_orders,
        handlers::orders::delete_order,
        handlers::promotions::apply_promotion,
        handlers::promotions::update_status,
        handlers::promotions::deactivate_promotion,
        handlers::promotions::remove_promotion,
        handlers::promotions::get_for_dish,
        handlers::promotions::list_for_restaurant,
    ),
    tags(
        (name = "commandes", description = "Order lifecycle"),
        (name = "promotion", description = "Dish promotions"),
    )
)]
pub struct ApiDoc;

/// Shared handles registered as app data on every worker.
#[derive(Clone)]
pub struct AppState {
    orders: web::Data<SharedOrderService>,
    promotions: web::Data<SharedPromotionService>,
    keys: web::Data<JwtKeys>,
}

impl AppState {
    pub fn new(
        orders: SharedOrderService,
        promotions: SharedPromotionService,
        jwt_secret: &str,
    ) -> Self {
        Self {
            orders: web::Data::new(orders),
            promotions: web::Data::new(promotions),
            keys: web::Data::new(JwtKeys::from_secret(jwt_secret)),
        }
    }

    /// Wires the Diesel repositories behind both services.
    pub fn from_pool(pool: DbPool, policy: TransitionPolicy, jwt_secret: &str) -> Self {
        let orders: Arc<dyn OrderRepository> = Arc::new(DieselOrderRepository::new(pool.clone()));
        let dishes: Arc<dyn DishRepository> = Arc::new(DieselDishRepository::new(pool.clone()));
        let directory: Arc<dyn DirectoryRepository> =
            Arc::new(DieselDirectoryRepository::new(pool));

        Self::new(
            OrderService::new(orders, dishes.clone(), directory, policy),
            PromotionService::new(dishes),
            jwt_secret,
        )
    }
}

/// Registers app data, extractor error handlers and every `/api` route.
pub fn configure_app(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(state.orders.clone())
        .app_data(state.promotions.clone())
        .app_data(state.keys.clone())
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            AppError::BadRequest(format!("Invalid request body: {err}")).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _req| {
            AppError::BadRequest(format!("Invalid path parameter: {err}")).into()
        }));
    handlers::orders::configure(cfg);
    handlers::promotions::configure(cfg);
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| configure_app(cfg, &state))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
