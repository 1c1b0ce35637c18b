use std::collections::HashMap;

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use uuid::Uuid;

use crate::domain::actor::{Actor, Role};
use crate::domain::errors::DomainError;
use crate::domain::order::{
    Order, OrderEvent, OrderLine, OrderStatus, PaymentStatus, PlaceOrderInput, TransitionPolicy,
};
use crate::domain::ports::{
    DirectoryRepository, DishRepository, OrderFilter, OrderRepository, OrderUpdate,
};

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub order: Order,
    pub courier_completed_deliveries: i32,
}

pub struct OrderService<O, D, U> {
    orders: O,
    dishes: D,
    directory: U,
    policy: TransitionPolicy,
}

impl<O, D, U> OrderService<O, D, U>
where
    O: OrderRepository,
    D: DishRepository,
    U: DirectoryRepository,
{
    pub fn new(orders: O, dishes: D, directory: U, policy: TransitionPolicy) -> Self {
        Self {
            orders,
            dishes,
            directory,
            policy,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn place_order(&self, actor: &Actor, input: PlaceOrderInput) -> Result<Order, DomainError> {
        actor.require_role(Role::Client)?;
        validate_place_order(&input)?;

        let restaurant = self
            .directory
            .find_restaurant(input.restaurant_id)?
            .ok_or(DomainError::NotFound("Restaurant"))?;

        let ids: Vec<Uuid> = input.lines.iter().map(|l| l.dish_id).collect();
        let dishes: HashMap<Uuid, _> = self
            .dishes
            .find_dishes(&ids)?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let now = Utc::now();
        let lines = input
            .lines
            .iter()
            .map(|line| {
                let dish = dishes
                    .get(&line.dish_id)
                    .filter(|d| d.restaurant_id == restaurant.id)
                    .ok_or_else(|| {
                        DomainError::InvalidInput(format!(
                            "dish {} is not on this restaurant's menu",
                            line.dish_id
                        ))
                    })?;
                if !dish.available {
                    return Err(DomainError::InvalidInput(format!(
                        "dish '{}' is not available",
                        dish.name
                    )));
                }
                Ok(OrderLine {
                    dish_id: dish.id,
                    name: dish.name.clone(),
                    unit_price: dish.unit_price_at(now),
                    images: dish.images.clone(),
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let order = Order {
            id: Uuid::new_v4(),
            client_id: actor.user_id,
            restaurant_id: restaurant.id,
            restaurant_owner_id: restaurant.owner_id,
            courier_id: None,
            lines,
            address: input.address.trim().to_string(),
            coordinates: input.coordinates,
            note: input.note,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            estimated_minutes: None,
            total: input.total,
            service_fee: input.service_fee,
            left_kitchen_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        self.orders
            .insert(&order, &[OrderEvent::placed(&order, &restaurant.name)])?;
        log::info!(
            "order {} placed by client {} at restaurant {}",
            order.id,
            actor.user_id,
            restaurant.id
        );
        Ok(order)
    }

    pub fn get_order(&self, actor: &Actor, id: Uuid) -> Result<Order, DomainError> {
        let order = self.load(id)?;
        order.ensure_visible_to(actor)?;
        Ok(order)
    }

    /// Unknown status strings are refused before anything is read or written.
    pub fn change_status(
        &self,
        actor: &Actor,
        id: Uuid,
        status: &str,
    ) -> Result<Order, DomainError> {
        let target: OrderStatus = status.parse()?;
        let policy = self.policy;
        let mut from = target;

        let updated = self.orders.update(id, &mut |order| {
            order.ensure_operable_by(actor)?;
            from = order.status;
            let events = order.change_status(target, policy, Utc::now())?;
            Ok(OrderUpdate::with_events(events))
        })?;

        if !from.can_transition_to(target) {
            log::warn!(
                "order {} moved out of sequence from '{}' to '{}' by {}",
                id,
                from,
                target,
                actor.user_id
            );
        }
        log::info!("order {} status '{}' -> '{}' by {}", id, from, target, actor.user_id);
        Ok(updated.order)
    }

    pub fn estimate_delivery(
        &self,
        actor: &Actor,
        id: Uuid,
        minutes: i32,
    ) -> Result<Order, DomainError> {
        if minutes <= 0 {
            return Err(DomainError::InvalidInput(
                "estimationLivraison must be a positive number of minutes".into(),
            ));
        }
        let policy = self.policy;

        let updated = self.orders.update(id, &mut |order| {
            order.ensure_delivered_by(actor)?;
            let events = order.record_estimate(minutes, policy, Utc::now())?;
            Ok(OrderUpdate::with_events(events))
        })?;

        log::info!("order {} en route, estimated {} min", id, minutes);
        Ok(updated.order)
    }

    pub fn assign_courier(
        &self,
        actor: &Actor,
        id: Uuid,
        courier_id: Uuid,
    ) -> Result<Order, DomainError> {
        // The order is checked before the courier so a missing order is a 404.
        self.load(id)?.ensure_managed_by(actor)?;
        let courier = self
            .directory
            .find_user(courier_id)?
            .filter(|u| u.role == Role::Livreur)
            .ok_or(DomainError::NotFound("Courier"))?;
        let policy = self.policy;
        let mut previous = OrderStatus::Assigned;

        let updated = self.orders.update(id, &mut |order| {
            order.ensure_managed_by(actor)?;
            previous = order.status;
            let events = order.assign_courier(&courier, policy, Utc::now())?;
            Ok(OrderUpdate::with_events(events))
        })?;

        if !previous.can_transition_to(OrderStatus::Assigned) {
            log::warn!(
                "order {} moved out of sequence from '{}' to '{}' by courier assignment",
                id,
                previous,
                OrderStatus::Assigned
            );
        }
        log::info!("order {} assigned to courier {}", id, courier.id);
        Ok(updated.order)
    }

    /// Pays, delivers and credits the courier in one locked update. A second
    /// confirmation of the same order is a conflict.
    pub fn confirm_payment(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<PaymentConfirmation, DomainError> {
        let policy = self.policy;

        let updated = self.orders.update(id, &mut |order| {
            order.ensure_delivered_by(actor)?;
            let (courier_id, events) = order.confirm_payment(policy, Utc::now())?;
            Ok(OrderUpdate::delivered_by(courier_id, events))
        })?;

        let completed = updated.courier_completed_deliveries.ok_or_else(|| {
            DomainError::Internal(format!("order {id} was delivered without a courier credit"))
        })?;
        log::info!(
            "order {} paid and delivered; courier {:?} now has {} deliveries",
            id,
            updated.order.courier_id,
            completed
        );
        Ok(PaymentConfirmation {
            order: updated.order,
            courier_completed_deliveries: completed,
        })
    }

    pub fn mark_paid(&self, actor: &Actor, id: Uuid) -> Result<Order, DomainError> {
        let updated = self.orders.update(id, &mut |order| {
            order.ensure_operable_by(actor)?;
            order.mark_paid(Utc::now());
            Ok(OrderUpdate::default())
        })?;
        log::info!("order {} marked paid", id);
        Ok(updated.order)
    }

    pub fn list_for_client(&self, actor: &Actor) -> Result<Vec<Order>, DomainError> {
        self.orders.list(OrderFilter::Client(actor.user_id))
    }

    pub fn list_for_restaurant(&self, actor: &Actor) -> Result<Vec<Order>, DomainError> {
        actor.require_role(Role::Restaurant)?;
        let restaurant = self
            .directory
            .find_restaurant_by_owner(actor.user_id)?
            .ok_or(DomainError::NotFound("Restaurant"))?;
        self.orders.list(OrderFilter::Restaurant(restaurant.id))
    }

    pub fn list_assigned(&self, actor: &Actor) -> Result<Vec<Order>, DomainError> {
        actor.require_role(Role::Livreur)?;
        self.orders.list(OrderFilter::Courier(actor.user_id))
    }

    pub fn list_all(&self, actor: &Actor) -> Result<Vec<Order>, DomainError> {
        actor.require_role(Role::Admin)?;
        self.orders.list(OrderFilter::All)
    }

    pub fn delete_order(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        actor.require_role(Role::Admin)?;
        if !self.orders.delete(id)? {
            return Err(DomainError::NotFound("Order"));
        }
        log::info!("order {} deleted by admin {}", id, actor.user_id);
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<Order, DomainError> {
        self.orders
            .find_by_id(id)?
            .ok_or(DomainError::NotFound("Order"))
    }
}

fn validate_place_order(input: &PlaceOrderInput) -> Result<(), DomainError> {
    if input.lines.is_empty() {
        return Err(DomainError::InvalidInput("an order needs at least one dish".into()));
    }
    if let Some(line) = input.lines.iter().find(|l| l.quantity <= 0) {
        return Err(DomainError::InvalidInput(format!(
            "quantity for dish {} must be positive",
            line.dish_id
        )));
    }
    if input.address.trim().is_empty() {
        return Err(DomainError::InvalidInput("address is required".into()));
    }
    if input.total < BigDecimal::zero() || input.service_fee < BigDecimal::zero() {
        return Err(DomainError::InvalidInput(
            "total and serviceFee must not be negative".into(),
        ));
    }
    Ok(())
}
