use std::sync::Arc;

use uuid::Uuid;

use super::actor::UserSummary;
use super::errors::DomainError;
use super::order::{Order, OrderEvent};
use super::promotion::{Dish, Promotion};

#[derive(Debug, Clone)]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    Client(Uuid),
    Restaurant(Uuid),
    Courier(Uuid),
}

/// What an order change asks to persist besides the order itself.
#[derive(Debug, Default)]
pub struct OrderUpdate {
    pub events: Vec<OrderEvent>,
    /// User whose courier profile gains one completed delivery.
    pub credit_courier: Option<Uuid>,
}

impl OrderUpdate {
    pub fn with_events(events: Vec<OrderEvent>) -> Self {
        Self {
            events,
            credit_courier: None,
        }
    }

    pub fn delivered_by(courier_user_id: Uuid, events: Vec<OrderEvent>) -> Self {
        Self {
            events,
            credit_courier: Some(courier_user_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdatedOrder {
    pub order: Order,
    /// The courier's new delivery count when one was credited.
    pub courier_completed_deliveries: Option<i32>,
}

/// Mutation applied to the current state of an order.
pub type OrderChange<'a> = dyn FnMut(&mut Order) -> Result<OrderUpdate, DomainError> + 'a;

/// Orders and the outbox events describing their changes. Every write
/// commits the order and its events together or not at all.
pub trait OrderRepository: Send + Sync + 'static {
    fn insert(&self, order: &Order, events: &[OrderEvent]) -> Result<(), DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    /// Runs `change` on the stored order while holding its row lock, then
    /// writes the order, the returned events and any courier credit in the
    /// same transaction. Concurrent updates of one order run one after the
    /// other. Nothing is written when `change` fails, and a missing courier
    /// profile fails with `Conflict`. A missing order is `NotFound`.
    fn update(
        &self,
        id: Uuid,
        change: &mut OrderChange<'_>,
    ) -> Result<UpdatedOrder, DomainError>;
    fn delete(&self, id: Uuid) -> Result<bool, DomainError>;
    fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, DomainError>;
}

pub trait DishRepository: Send + Sync + 'static {
    fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, DomainError>;
    fn find_dishes(&self, ids: &[Uuid]) -> Result<Vec<Dish>, DomainError>;
    fn upsert_promotion(&self, dish_id: Uuid, promotion: &Promotion) -> Result<(), DomainError>;
    fn delete_promotion(&self, dish_id: Uuid) -> Result<bool, DomainError>;
    fn list_promoted(&self, restaurant_id: Uuid) -> Result<Vec<Dish>, DomainError>;
}

/// Read access to accounts owned by other parts of the platform.
pub trait DirectoryRepository: Send + Sync + 'static {
    fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>, DomainError>;
    fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, DomainError>;
    fn find_restaurant_by_owner(&self, owner_id: Uuid) -> Result<Option<Restaurant>, DomainError>;
}

impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    fn insert(&self, order: &Order, events: &[OrderEvent]) -> Result<(), DomainError> {
        (**self).insert(order, events)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        (**self).find_by_id(id)
    }

    fn update(
        &self,
        id: Uuid,
        change: &mut OrderChange<'_>,
    ) -> Result<UpdatedOrder, DomainError> {
        (**self).update(id, change)
    }

    fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        (**self).delete(id)
    }

    fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, DomainError> {
        (**self).list(filter)
    }
}

impl<T: DishRepository + ?Sized> DishRepository for Arc<T> {
    fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, DomainError> {
        (**self).find_dish(id)
    }

    fn find_dishes(&self, ids: &[Uuid]) -> Result<Vec<Dish>, DomainError> {
        (**self).find_dishes(ids)
    }

    fn upsert_promotion(&self, dish_id: Uuid, promotion: &Promotion) -> Result<(), DomainError> {
        (**self).upsert_promotion(dish_id, promotion)
    }

    fn delete_promotion(&self, dish_id: Uuid) -> Result<bool, DomainError> {
        (**self).delete_promotion(dish_id)
    }

    fn list_promoted(&self, restaurant_id: Uuid) -> Result<Vec<Dish>, DomainError> {
        (**self).list_promoted(restaurant_id)
    }
}

impl<T: DirectoryRepository + ?Sized> DirectoryRepository for Arc<T> {
    fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>, DomainError> {
        (**self).find_user(id)
    }

    fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        (**self).find_restaurant(id)
    }

    fn find_restaurant_by_owner(&self, owner_id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        (**self).find_restaurant_by_owner(owner_id)
    }
}
