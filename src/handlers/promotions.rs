use actix_web::{web, HttpResponse};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::SharedPromotionService;
use crate::auth::AuthenticatedUser;
use crate::domain::promotion::{Dish, Promotion, PromotionTerms};
use crate::errors::AppError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromotionRequest {
    pub plat_id: Uuid,
    /// Percent off, 1 to 100, as a number or a decimal string.
    #[serde(deserialize_with = "super::decimal")]
    #[schema(value_type = f64, example = 12.5)]
    pub pourcentage: BigDecimal,
    pub date_debut: DateTime<Utc>,
    pub date_fin: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(alias = "promoMessage")]
    pub message: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStatusRequest {
    pub is_active: bool,
}

/// Promotion fields plus the values derived from the current time.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionView {
    pub pourcentage: f64,
    pub prix_apres_reduction: String,
    pub date_debut: DateTime<Utc>,
    pub date_fin: DateTime<Utc>,
    pub message: String,
    pub is_promotion_active: bool,
    pub manually_disabled: bool,
    pub dates_expired: bool,
    pub jours_restants: String,
}

impl PromotionView {
    fn at(promotion: &Promotion, now: DateTime<Utc>) -> Self {
        let state = promotion.state(now);
        Self {
            pourcentage: promotion.percentage.to_f64().unwrap_or_default(),
            prix_apres_reduction: promotion.discounted_price.to_string(),
            date_debut: promotion.starts_at,
            date_fin: promotion.ends_at,
            message: promotion.message.clone().unwrap_or_default(),
            is_promotion_active: state.effective,
            manually_disabled: state.manually_disabled,
            dates_expired: state.dates_expired,
            jours_restants: promotion.days_left(now),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlatResponse {
    pub id: Uuid,
    pub restaurant: Uuid,
    pub nom: String,
    pub description: Option<String>,
    pub prix: String,
    pub images: Vec<String>,
    pub disponible: bool,
    pub promotion: Option<PromotionView>,
}

impl PlatResponse {
    fn at(dish: Dish, now: DateTime<Utc>) -> Self {
        Self {
            promotion: dish.promotion.as_ref().map(|p| PromotionView::at(p, now)),
            id: dish.id,
            restaurant: dish.restaurant_id,
            nom: dish.name,
            description: dish.description,
            prix: dish.price.to_string(),
            images: dish.images,
            disponible: dish.available,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlatSummary {
    pub id: Uuid,
    pub nom: String,
    pub description: Option<String>,
    pub prix: String,
    /// First image, if any.
    pub image: Option<String>,
}

/// One promoted dish as listed for a restaurant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PromotedDishResponse {
    pub id: Uuid,
    pub plat: PlatSummary,
    #[serde(flatten)]
    pub promotion: PromotionView,
}

impl PromotedDishResponse {
    /// `None` for a dish without promotion.
    fn at(dish: Dish, now: DateTime<Utc>) -> Option<Self> {
        let promotion = PromotionView::at(dish.promotion.as_ref()?, now);
        Some(Self {
            id: dish.id,
            plat: PlatSummary {
                id: dish.id,
                image: dish.images.into_iter().next(),
                nom: dish.name,
                description: dish.description,
                prix: dish.price.to_string(),
            },
            promotion,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromotionResponse {
    pub message: String,
    pub plat: PlatResponse,
    pub jours_restants: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlatEnvelope {
    pub message: String,
    pub plat: PlatResponse,
}

fn apply_message(created: bool, active: bool) -> &'static str {
    match (created, active) {
        (true, true) => "Promotion appliquée avec succès.",
        (true, false) => "Promotion créée mais désactivée.",
        (false, true) => "Promotion activée avec succès.",
        (false, false) => "Promotion mise à jour mais désactivée.",
    }
}

/// POST /api/promotion/apply-promotion
///
/// Creates the dish's promotion, or overwrites the one it already has.
#[utoipa::path(
    post,
    path = "/api/promotion/apply-promotion",
    request_body = ApplyPromotionRequest,
    responses(
        (status = 200, description = "Promotion stored", body = ApplyPromotionResponse),
        (status = 400, description = "Percentage out of range or end not after start"),
        (status = 403, description = "Caller does not own the dish"),
        (status = 404, description = "Dish not found"),
    ),
    tag = "promotion"
)]
pub async fn apply_promotion(
    service: web::Data<SharedPromotionService>,
    user: AuthenticatedUser,
    body: web::Json<ApplyPromotionRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let body = body.into_inner();
    let dish_id = body.plat_id;
    let active = body.is_active;
    let terms = PromotionTerms {
        percentage: body.pourcentage,
        starts_at: body.date_debut,
        ends_at: body.date_fin,
        is_active: body.is_active,
        message: body.message,
    };

    let applied = web::block(move || service.apply(&actor, dish_id, terms)).await??;

    Ok(HttpResponse::Ok().json(ApplyPromotionResponse {
        message: apply_message(applied.created, active).to_string(),
        plat: PlatResponse::at(applied.dish, Utc::now()),
        jours_restants: applied.days_left,
    }))
}

/// PATCH /api/promotion/status/{platId}
#[utoipa::path(
    patch,
    path = "/api/promotion/status/{platId}",
    params(("platId" = Uuid, Path, description = "Dish UUID")),
    request_body = PromotionStatusRequest,
    responses(
        (status = 200, description = "Flag updated", body = PlatEnvelope),
        (status = 403, description = "Caller does not own the dish"),
        (status = 404, description = "Dish or promotion not found"),
    ),
    tag = "promotion"
)]
pub async fn update_status(
    service: web::Data<SharedPromotionService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<PromotionStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let dish_id = path.into_inner();
    let active = body.into_inner().is_active;

    let dish = web::block(move || service.set_active(&actor, dish_id, active)).await??;

    let message = if active {
        "Promotion activée avec succès."
    } else {
        "Promotion désactivée avec succès."
    };
    Ok(HttpResponse::Ok().json(PlatEnvelope {
        message: message.to_string(),
        plat: PlatResponse::at(dish, Utc::now()),
    }))
}

/// DELETE /api/promotion/remove/{platId}
///
/// Turns the promotion off; the row is kept.
#[utoipa::path(
    delete,
    path = "/api/promotion/remove/{platId}",
    params(("platId" = Uuid, Path, description = "Dish UUID")),
    responses(
        (status = 200, description = "Promotion disabled", body = PlatEnvelope),
        (status = 403, description = "Caller does not own the dish"),
        (status = 404, description = "Dish or promotion not found"),
    ),
    tag = "promotion"
)]
pub async fn deactivate_promotion(
    service: web::Data<SharedPromotionService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let dish_id = path.into_inner();

    let dish = web::block(move || service.deactivate(&actor, dish_id)).await??;

    Ok(HttpResponse::Ok().json(PlatEnvelope {
        message: "Promotion désactivée avec succès.".to_string(),
        plat: PlatResponse::at(dish, Utc::now()),
    }))
}

/// PATCH /api/promotion/remove/{platId}
///
/// Deletes the promotion outright.
#[utoipa::path(
    patch,
    path = "/api/promotion/remove/{platId}",
    params(("platId" = Uuid, Path, description = "Dish UUID")),
    responses(
        (status = 200, description = "Promotion removed", body = PlatEnvelope),
        (status = 403, description = "Caller does not own the dish"),
        (status = 404, description = "Dish or promotion not found"),
    ),
    tag = "promotion"
)]
pub async fn remove_promotion(
    service: web::Data<SharedPromotionService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let dish_id = path.into_inner();

    let dish = web::block(move || service.remove(&actor, dish_id)).await??;

    Ok(HttpResponse::Ok().json(PlatEnvelope {
        message: "Promotion supprimée avec succès.".to_string(),
        plat: PlatResponse::at(dish, Utc::now()),
    }))
}

/// GET /api/promotion/plat/{platId}
#[utoipa::path(
    get,
    path = "/api/promotion/plat/{platId}",
    params(("platId" = Uuid, Path, description = "Dish UUID")),
    responses(
        (status = 200, description = "Promotion of the dish", body = PromotedDishResponse),
        (status = 404, description = "Dish or promotion not found"),
    ),
    tag = "promotion"
)]
pub async fn get_for_dish(
    service: web::Data<SharedPromotionService>,
    _user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let dish_id = path.into_inner();

    let dish = web::block(move || service.get_for_dish(dish_id)).await??;

    let view = PromotedDishResponse::at(dish, Utc::now())
        .ok_or_else(|| AppError::NotFound("Promotion not found".into()))?;
    Ok(HttpResponse::Ok().json(view))
}

/// GET /api/promotion/restaurant/{restaurantId}
///
/// Every promoted dish of the restaurant, effective or not. Also served at
/// `.../all` for older clients.
#[utoipa::path(
    get,
    path = "/api/promotion/restaurant/{restaurantId}",
    params(("restaurantId" = Uuid, Path, description = "Restaurant UUID")),
    responses(
        (status = 200, description = "Promoted dishes", body = Vec<PromotedDishResponse>),
    ),
    tag = "promotion"
)]
pub async fn list_for_restaurant(
    service: web::Data<SharedPromotionService>,
    _user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = path.into_inner();

    let dishes = web::block(move || service.list_for_restaurant(restaurant_id)).await??;

    let now = Utc::now();
    let views: Vec<PromotedDishResponse> = dishes
        .into_iter()
        .filter_map(|d| PromotedDishResponse::at(d, now))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/promotion")
            .route("/apply-promotion", web::post().to(apply_promotion))
            .route("/status/{platId}", web::patch().to(update_status))
            .route("/remove/{platId}", web::delete().to(deactivate_promotion))
            .route("/remove/{platId}", web::patch().to(remove_promotion))
            .route("/plat/{platId}", web::get().to(get_for_dish))
            .route("/restaurant/{restaurantId}", web::get().to(list_for_restaurant))
            .route("/restaurant/{restaurantId}/all", web::get().to(list_for_restaurant)),
    );
}
