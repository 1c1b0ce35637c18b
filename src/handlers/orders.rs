use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::SharedOrderService;
use crate::auth::AuthenticatedUser;
use crate::domain::order::{Coordinates, Order, OrderLine, OrderLineInput, PlaceOrderInput};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CoordinatesDto {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderLineRequest {
    /// Dish id.
    pub plat: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Restaurant id.
    pub restaurant: Uuid,
    pub plats: Vec<CreateOrderLineRequest>,
    pub address: String,
    pub coordinates: Option<CoordinatesDto>,
    pub note: Option<String>,
    /// Decimal amount, as a number or a string such as "45.00".
    #[serde(deserialize_with = "super::decimal")]
    #[schema(value_type = String, example = "45.00")]
    pub total: BigDecimal,
    #[serde(default, deserialize_with = "super::decimal")]
    #[schema(value_type = String, example = "2.50")]
    pub service_fee: BigDecimal,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub commande_id: Uuid,
    pub statut: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    /// Minutes until delivery.
    pub estimation_livraison: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub livreur_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub plat: Uuid,
    pub nom: String,
    pub prix: String,
    pub images: Vec<String>,
    pub quantity: i32,
}

impl From<OrderLine> for OrderLineResponse {
    fn from(l: OrderLine) -> Self {
        Self {
            plat: l.dish_id,
            nom: l.name,
            prix: l.unit_price.to_string(),
            images: l.images,
            quantity: l.quantity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub client: Uuid,
    pub restaurant: Uuid,
    pub livreur: Option<Uuid>,
    pub plats: Vec<OrderLineResponse>,
    pub address: String,
    pub coordinates: Option<CoordinatesDto>,
    pub note: Option<String>,
    pub statut: String,
    pub payment_status: String,
    /// Derived from `paymentStatus`.
    pub payee: bool,
    pub estimation_livraison: Option<i32>,
    pub date_sortie: Option<DateTime<Utc>>,
    pub date_livraison: Option<DateTime<Utc>>,
    pub total: String,
    pub service_fee: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            payee: o.is_paid(),
            id: o.id,
            client: o.client_id,
            restaurant: o.restaurant_id,
            livreur: o.courier_id,
            plats: o.lines.into_iter().map(OrderLineResponse::from).collect(),
            address: o.address,
            coordinates: o.coordinates.map(|c| CoordinatesDto {
                latitude: c.latitude,
                longitude: c.longitude,
            }),
            note: o.note,
            statut: o.status.to_string(),
            payment_status: o.payment_status.as_str().to_string(),
            estimation_livraison: o.estimated_minutes,
            date_sortie: o.left_kitchen_at,
            date_livraison: o.delivered_at,
            total: o.total.to_string(),
            service_fee: o.service_fee.to_string(),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub message: String,
    pub commande: OrderResponse,
}

impl OrderEnvelope {
    fn new(message: &str, order: Order) -> Self {
        Self {
            message: message.to_string(),
            commande: order.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListEnvelope {
    pub message: String,
    pub commandes: Vec<OrderResponse>,
}

impl OrderListEnvelope {
    fn new(message: &str, orders: Vec<Order>) -> Self {
        Self {
            message: message.to_string(),
            commandes: orders.into_iter().map(OrderResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmedResponse {
    pub message: String,
    pub commande: OrderResponse,
    pub livreur_completed_deliveries: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl CreateOrderRequest {
    fn into_input(self) -> PlaceOrderInput {
        PlaceOrderInput {
            total: self.total,
            service_fee: self.service_fee,
            restaurant_id: self.restaurant,
            lines: self
                .plats
                .into_iter()
                .map(|l| OrderLineInput {
                    dish_id: l.plat,
                    quantity: l.quantity,
                })
                .collect(),
            address: self.address,
            coordinates: self.coordinates.map(|c| Coordinates {
                latitude: c.latitude,
                longitude: c.longitude,
            }),
            note: self.note,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /api/commandes
///
/// Places an order for the calling client. Line prices are snapshotted from
/// the dishes; the restaurant owner is notified through the outbox in the same
/// transaction.
#[utoipa::path(
    post,
    path = "/api/commandes",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderEnvelope),
        (status = 400, description = "Invalid order"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Restaurant not found"),
    ),
    tag = "commandes"
)]
pub async fn create_order(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let input = body.into_inner().into_input();

    let order = web::block(move || service.place_order(&actor, input)).await??;

    Ok(HttpResponse::Created().json(OrderEnvelope::new("Commande placed successfully", order)))
}

/// PUT /api/commandes/status
#[utoipa::path(
    put,
    path = "/api/commandes/status",
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderEnvelope),
        (status = 400, description = "Unknown status value"),
        (status = 403, description = "Caller may not operate this order"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition refused by the strict policy"),
    ),
    tag = "commandes"
)]
pub async fn change_status(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    body: web::Json<ChangeStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let ChangeStatusRequest {
        commande_id,
        statut,
    } = body.into_inner();

    let order = web::block(move || service.change_status(&actor, commande_id, &statut)).await??;

    Ok(HttpResponse::Ok().json(OrderEnvelope::new(
        "Commande status updated successfully",
        order,
    )))
}

/// PUT /api/commandes/{commandeId}/estimation
///
/// Records the courier's estimate and puts the order en route.
#[utoipa::path(
    put,
    path = "/api/commandes/{commandeId}/estimation",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    request_body = EstimateRequest,
    responses(
        (status = 200, description = "Estimate recorded", body = OrderEnvelope),
        (status = 400, description = "Estimate is not a positive number of minutes"),
        (status = 403, description = "Caller is not the assigned courier"),
        (status = 404, description = "Order not found"),
    ),
    tag = "commandes"
)]
pub async fn estimate_delivery(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<EstimateRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();
    let minutes = body.into_inner().estimation_livraison;

    let order =
        web::block(move || service.estimate_delivery(&actor, order_id, minutes)).await??;

    Ok(HttpResponse::Ok().json(OrderEnvelope::new("Estimation updated successfully", order)))
}

/// PUT /api/commandes/{commandeId}/assign
#[utoipa::path(
    put,
    path = "/api/commandes/{commandeId}/assign",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Courier assigned", body = OrderEnvelope),
        (status = 403, description = "Caller does not manage this order"),
        (status = 404, description = "Order or courier not found"),
    ),
    tag = "commandes"
)]
pub async fn assign_courier(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<AssignRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();
    let courier_id = body.into_inner().livreur_id;

    let order =
        web::block(move || service.assign_courier(&actor, order_id, courier_id)).await??;

    Ok(HttpResponse::Ok().json(OrderEnvelope::new("Commande assigned successfully", order)))
}

/// PUT /api/commandes/{commandeId}/confirm-paid
///
/// Marks the order paid and delivered and credits the courier, atomically.
#[utoipa::path(
    put,
    path = "/api/commandes/{commandeId}/confirm-paid",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Payment confirmed", body = PaymentConfirmedResponse),
        (status = 403, description = "Caller is not the assigned courier"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "No courier, or no courier profile, for this order"),
    ),
    tag = "commandes"
)]
pub async fn confirm_payment(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();

    let confirmation = web::block(move || service.confirm_payment(&actor, order_id)).await??;

    Ok(HttpResponse::Ok().json(PaymentConfirmedResponse {
        message: "Payment confirmed successfully".to_string(),
        commande: confirmation.order.into(),
        livreur_completed_deliveries: confirmation.courier_completed_deliveries,
    }))
}

/// PUT /api/commandes/{commandeId}/paid
///
/// Records payment without touching the delivery status.
#[utoipa::path(
    put,
    path = "/api/commandes/{commandeId}/paid",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Payment recorded", body = OrderEnvelope),
        (status = 403, description = "Caller may not operate this order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "commandes"
)]
pub async fn mark_paid(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();

    let order = web::block(move || service.mark_paid(&actor, order_id)).await??;

    Ok(HttpResponse::Ok().json(OrderEnvelope::new("Payment recorded successfully", order)))
}

/// GET /api/commandes/{commandeId}
#[utoipa::path(
    get,
    path = "/api/commandes/{commandeId}",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderEnvelope),
        (status = 403, description = "Caller is not a party to this order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "commandes"
)]
pub async fn get_order(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();

    let order = web::block(move || service.get_order(&actor, order_id)).await??;

    Ok(HttpResponse::Ok().json(OrderEnvelope::new("Commande retrieved successfully", order)))
}

/// GET /api/commandes/my-commandes
#[utoipa::path(
    get,
    path = "/api/commandes/my-commandes",
    responses((status = 200, description = "Caller's orders", body = OrderListEnvelope)),
    tag = "commandes"
)]
pub async fn list_my_orders(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let orders = web::block(move || service.list_for_client(&actor)).await??;
    Ok(HttpResponse::Ok().json(OrderListEnvelope::new(
        "Commandes retrieved successfully",
        orders,
    )))
}

/// GET /api/commandes/restaurant
#[utoipa::path(
    get,
    path = "/api/commandes/restaurant",
    responses(
        (status = 200, description = "Orders of the caller's restaurant", body = OrderListEnvelope),
        (status = 403, description = "Caller is not a restaurant"),
        (status = 404, description = "Caller owns no restaurant"),
    ),
    tag = "commandes"
)]
pub async fn list_restaurant_orders(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let orders = web::block(move || service.list_for_restaurant(&actor)).await??;
    Ok(HttpResponse::Ok().json(OrderListEnvelope::new(
        "Restaurant commandes retrieved successfully",
        orders,
    )))
}

/// GET /api/commandes/assigned
#[utoipa::path(
    get,
    path = "/api/commandes/assigned",
    responses(
        (status = 200, description = "Orders assigned to the caller", body = OrderListEnvelope),
        (status = 403, description = "Caller is not a courier"),
    ),
    tag = "commandes"
)]
pub async fn list_assigned_orders(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let orders = web::block(move || service.list_assigned(&actor)).await??;
    Ok(HttpResponse::Ok().json(OrderListEnvelope::new(
        "Assigned commandes retrieved successfully",
        orders,
    )))
}

/// GET /api/commandes
#[utoipa::path(
    get,
    path = "/api/commandes",
    responses(
        (status = 200, description = "Every order", body = OrderListEnvelope),
        (status = 403, description = "Caller is not an admin"),
    ),
    tag = "commandes"
)]
pub async fn list_orders(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let orders = web::block(move || service.list_all(&actor)).await??;
    Ok(HttpResponse::Ok().json(OrderListEnvelope::new(
        "All commandes retrieved successfully",
        orders,
    )))
}

/// DELETE /api/commandes/{commandeId}
#[utoipa::path(
    delete,
    path = "/api/commandes/{commandeId}",
    params(("commandeId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order deleted", body = MessageResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Order not found"),
    ),
    tag = "commandes"
)]
pub async fn delete_order(
    service: web::Data<SharedOrderService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let actor = user.actor();
    let order_id = path.into_inner();

    web::block(move || service.delete_order(&actor, order_id)).await??;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Commande deleted successfully".to_string(),
    }))
}

/// Static segments are registered before `/{commandeId}` so they are not
/// captured as ids.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/commandes")
            .route("", web::post().to(create_order))
            .route("", web::get().to(list_orders))
            .route("/status", web::put().to(change_status))
            .route("/my-commandes", web::get().to(list_my_orders))
            .route("/restaurant", web::get().to(list_restaurant_orders))
            .route("/assigned", web::get().to(list_assigned_orders))
            .route("/{commandeId}", web::get().to(get_order))
            .route("/{commandeId}", web::delete().to(delete_order))
            .route("/{commandeId}/estimation", web::put().to(estimate_delivery))
            .route("/{commandeId}/assign", web::put().to(assign_courier))
            .route("/{commandeId}/confirm-paid", web::put().to(confirm_payment))
            .route("/{commandeId}/paid", web::put().to(mark_paid)),
    );
}
