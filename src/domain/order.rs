use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::actor::{Actor, Role, UserSummary};
use super::errors::DomainError;

/// Fulfilment status of an order. The wire strings are part of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Assigned,
    EnRoute,
    Arrived,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Assigned,
        OrderStatus::EnRoute,
        OrderStatus::Arrived,
        OrderStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "en attente",
            OrderStatus::Preparing => "préparation",
            OrderStatus::Ready => "prête",
            OrderStatus::Assigned => "assignée",
            OrderStatus::EnRoute => "en route",
            OrderStatus::Arrived => "arrivée",
            OrderStatus::Delivered => "livrée",
        }
    }

    /// Moves accepted under [`TransitionPolicy::Strict`]. Re-applying the
    /// current status is always accepted.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Preparing)
                | (Preparing, Ready)
                | (Ready, Assigned)
                | (Assigned, EnRoute)
                | (EnRoute, Arrived)
                | (EnRoute, Delivered)
                | (Arrived, Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("Invalid status value '{s}'")))
    }
}

/// The single source of truth for payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::InvalidInput(format!(
                "Invalid payment status '{other}'"
            ))),
        }
    }
}

/// How status writes are checked against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any known status may be written at any time.
    #[default]
    Permissive,
    /// Only moves allowed by [`OrderStatus::can_transition_to`].
    Strict,
}

impl TransitionPolicy {
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> Result<(), DomainError> {
        if self == TransitionPolicy::Strict && !from.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for TransitionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(DomainError::InvalidInput(format!(
                "unknown transition policy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A dish snapshot taken when the order was placed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub dish_id: Uuid,
    pub name: String,
    pub unit_price: BigDecimal,
    pub images: Vec<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub dish_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub restaurant_id: Uuid,
    pub lines: Vec<OrderLineInput>,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub note: Option<String>,
    pub total: BigDecimal,
    pub service_fee: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub restaurant_id: Uuid,
    pub restaurant_owner_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub lines: Vec<OrderLine>,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub estimated_minutes: Option<i32>,
    pub total: BigDecimal,
    pub service_fee: BigDecimal,
    pub left_kitchen_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.courier_id == Some(user_id)
    }

    /// Client, restaurant owner, assigned courier, or admin.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        actor.is_admin()
            || self.client_id == actor.user_id
            || self.restaurant_owner_id == actor.user_id
            || self.is_assigned_to(actor.user_id)
    }

    pub fn ensure_visible_to(&self, actor: &Actor) -> Result<(), DomainError> {
        if self.is_visible_to(actor) {
            Ok(())
        } else {
            Err(DomainError::Forbidden("order belongs to another account".into()))
        }
    }

    /// Admin, restaurant owner, or assigned courier.
    pub fn ensure_operable_by(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_admin()
            || self.restaurant_owner_id == actor.user_id
            || (actor.role == Role::Livreur && self.is_assigned_to(actor.user_id))
        {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "only the restaurant, the assigned courier or an admin may update this order"
                    .into(),
            ))
        }
    }

    pub fn ensure_managed_by(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_admin() || self.restaurant_owner_id == actor.user_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "only the restaurant owner or an admin may assign a courier".into(),
            ))
        }
    }

    pub fn ensure_delivered_by(&self, actor: &Actor) -> Result<(), DomainError> {
        if actor.is_admin() || (actor.role == Role::Livreur && self.is_assigned_to(actor.user_id)) {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "only the assigned courier or an admin may do this".into(),
            ))
        }
    }

    /// Writes `target` and returns the notifications the move triggers.
    pub fn change_status(
        &mut self,
        target: OrderStatus,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        policy.check(self.status, target)?;
        self.status = target;
        self.updated_at = now;

        let mut events = Vec::new();
        match target {
            OrderStatus::Preparing => self.left_kitchen_at = Some(now),
            OrderStatus::EnRoute => events.push(OrderEvent::delivery_en_route(self)),
            OrderStatus::Delivered => {
                self.delivered_at = Some(now);
                events.push(OrderEvent::delivered(self));
            }
            _ => {}
        }
        Ok(events)
    }

    /// Records the courier's estimate and puts the order en route.
    pub fn record_estimate(
        &mut self,
        minutes: i32,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if minutes <= 0 {
            return Err(DomainError::InvalidInput(
                "estimationLivraison must be a positive number of minutes".into(),
            ));
        }
        policy.check(self.status, OrderStatus::EnRoute)?;
        self.estimated_minutes = Some(minutes);
        self.status = OrderStatus::EnRoute;
        self.updated_at = now;
        Ok(vec![OrderEvent::delivery_en_route(self)])
    }

    /// Under the permissive policy this overwrites any status, including
    /// statuses further along than `assignée`.
    pub fn assign_courier(
        &mut self,
        courier: &UserSummary,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        policy.check(self.status, OrderStatus::Assigned)?;
        self.courier_id = Some(courier.id);
        self.status = OrderStatus::Assigned;
        self.updated_at = now;
        Ok(vec![OrderEvent::CourierAssigned {
            order_id: self.id,
            courier_id: courier.id,
            courier_name: format!("{} {}", courier.first_name, courier.last_name),
            courier_email: courier.email.clone(),
            restaurant_id: self.restaurant_id,
            address: self.address.clone(),
        }])
    }

    /// Marks the order paid and delivered. Returns the courier to credit.
    /// A delivery is credited once: confirming an order that is already paid
    /// and delivered is a conflict.
    pub fn confirm_payment(
        &mut self,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, Vec<OrderEvent>), DomainError> {
        if self.is_paid() && self.status == OrderStatus::Delivered {
            return Err(DomainError::Conflict(
                "payment for this order is already confirmed".into(),
            ));
        }
        let courier_id = self.courier_id.ok_or_else(|| {
            DomainError::Conflict("no courier is assigned to this order".into())
        })?;
        policy.check(self.status, OrderStatus::Delivered)?;
        self.payment_status = PaymentStatus::Paid;
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(now);
        self.updated_at = now;
        Ok((courier_id, vec![OrderEvent::delivered(self)]))
    }

    /// Records payment without touching the fulfilment status.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        self.updated_at = now;
    }
}

/// Notification recorded in the outbox alongside the state change that
/// caused it.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Placed {
        order_id: Uuid,
        client_id: Uuid,
        restaurant_owner_id: Uuid,
        restaurant_name: String,
        total: BigDecimal,
    },
    CourierAssigned {
        order_id: Uuid,
        courier_id: Uuid,
        courier_name: String,
        courier_email: String,
        restaurant_id: Uuid,
        address: String,
    },
    DeliveryEnRoute {
        order_id: Uuid,
        client_id: Uuid,
        estimated_minutes: Option<i32>,
    },
    Delivered {
        order_id: Uuid,
        client_id: Uuid,
        restaurant_owner_id: Uuid,
    },
}

impl OrderEvent {
    pub const AGGREGATE_TYPE: &'static str = "Order";

    pub fn placed(order: &Order, restaurant_name: &str) -> Self {
        OrderEvent::Placed {
            order_id: order.id,
            client_id: order.client_id,
            restaurant_owner_id: order.restaurant_owner_id,
            restaurant_name: restaurant_name.to_string(),
            total: order.total.clone(),
        }
    }

    fn delivery_en_route(order: &Order) -> Self {
        OrderEvent::DeliveryEnRoute {
            order_id: order.id,
            client_id: order.client_id,
            estimated_minutes: order.estimated_minutes,
        }
    }

    fn delivered(order: &Order) -> Self {
        OrderEvent::Delivered {
            order_id: order.id,
            client_id: order.client_id,
            restaurant_owner_id: order.restaurant_owner_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed { .. } => "OrderPlaced",
            OrderEvent::CourierAssigned { .. } => "CourierAssigned",
            OrderEvent::DeliveryEnRoute { .. } => "DeliveryEnRoute",
            OrderEvent::Delivered { .. } => "OrderDelivered",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Placed { order_id, .. }
            | OrderEvent::CourierAssigned { order_id, .. }
            | OrderEvent::DeliveryEnRoute { order_id, .. }
            | OrderEvent::Delivered { order_id, .. } => *order_id,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OrderEvent::Placed {
                order_id,
                client_id,
                restaurant_owner_id,
                restaurant_name,
                total,
            } => json!({
                "order_id": order_id,
                "client_id": client_id,
                "restaurant_name": restaurant_name,
                "recipients": [restaurant_owner_id],
                "total": total.to_string(),
            }),
            OrderEvent::CourierAssigned {
                order_id,
                courier_id,
                courier_name,
                courier_email,
                restaurant_id,
                address,
            } => json!({
                "order_id": order_id,
                "restaurant_id": restaurant_id,
                "recipients": [courier_id],
                "courier_name": courier_name,
                "courier_email": courier_email,
                "address": address,
            }),
            OrderEvent::DeliveryEnRoute {
                order_id,
                client_id,
                estimated_minutes,
            } => json!({
                "order_id": order_id,
                "recipients": [client_id],
                "estimated_minutes": estimated_minutes,
            }),
            OrderEvent::Delivered {
                order_id,
                client_id,
                restaurant_owner_id,
            } => json!({
                "order_id": order_id,
                "recipients": [client_id, restaurant_owner_id],
            }),
        }
    }
}
