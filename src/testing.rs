//! In-memory repositories and a seeded fixture for service and handler tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::actor::{Actor, Role, UserSummary};
use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderEvent};
use crate::domain::ports::{
    DirectoryRepository, DishRepository, OrderChange, OrderFilter, OrderRepository, Restaurant,
    UpdatedOrder,
};
use crate::domain::promotion::{Dish, Promotion};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserSummary>,
    restaurants: HashMap<Uuid, Restaurant>,
    couriers: HashMap<Uuid, i32>,
    dishes: HashMap<Uuid, Dish>,
    orders: HashMap<Uuid, Order>,
    order_sequence: Vec<Uuid>,
    outbox: Vec<(Uuid, &'static str)>,
    writes: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("store mutex poisoned")
    }

    pub fn add_user(&self, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().users.insert(
            id,
            UserSummary {
                id,
                first_name: "Test".into(),
                last_name: role.as_str().into(),
                email: format!("{id}@example.test"),
                role,
            },
        );
        id
    }

    pub fn add_restaurant(&self, owner_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().restaurants.insert(
            id,
            Restaurant {
                id,
                owner_id,
                name: "Chez Test".into(),
            },
        );
        id
    }

    pub fn add_courier_profile(&self, user_id: Uuid, completed: i32) {
        self.lock().couriers.insert(user_id, completed);
    }

    pub fn remove_courier_profile(&self, user_id: Uuid) {
        self.lock().couriers.remove(&user_id);
    }

    pub fn add_dish(&self, restaurant_id: Uuid, price: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.lock();
        let owner = state.restaurants[&restaurant_id].owner_id;
        state.dishes.insert(
            id,
            Dish {
                id,
                restaurant_id,
                restaurant_owner_id: owner,
                name: "Couscous royal".into(),
                description: Some("Semoule, agneau, merguez".into()),
                price: BigDecimal::from_str(price).expect("valid price"),
                images: vec!["couscous.jpg".into()],
                available: true,
                promotion: None,
            },
        );
        id
    }

    pub fn set_dish_price(&self, dish_id: Uuid, price: BigDecimal) {
        if let Some(dish) = self.lock().dishes.get_mut(&dish_id) {
            dish.price = price;
        }
    }

    pub fn dish_promotion(&self, dish_id: Uuid) -> Option<Promotion> {
        self.lock().dishes.get(&dish_id).and_then(|d| d.promotion.clone())
    }

    pub fn events_for(&self, order_id: Uuid) -> Vec<&'static str> {
        self.lock()
            .outbox
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, event_type)| *event_type)
            .collect()
    }

    pub fn completed_deliveries(&self, user_id: Uuid) -> Option<i32> {
        self.lock().couriers.get(&user_id).copied()
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

fn record(state: &mut State, events: &[OrderEvent]) {
    state
        .outbox
        .extend(events.iter().map(|e| (e.order_id(), e.event_type())));
    state.writes += 1;
}

impl OrderRepository for InMemoryStore {
    fn insert(&self, order: &Order, events: &[OrderEvent]) -> Result<(), DomainError> {
        let mut state = self.lock();
        state.orders.insert(order.id, order.clone());
        state.order_sequence.push(order.id);
        record(&mut state, events);
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    /// The store mutex stays held while `change` runs, like the row lock.
    fn update(
        &self,
        id: Uuid,
        change: &mut OrderChange<'_>,
    ) -> Result<UpdatedOrder, DomainError> {
        let mut state = self.lock();
        let mut order = state
            .orders
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound("Order"))?;

        let update = change(&mut order)?;
        let courier_completed_deliveries = match update.credit_courier {
            Some(courier_user_id) => {
                let count = state.couriers.get(&courier_user_id).copied().ok_or_else(|| {
                    DomainError::Conflict(format!("no courier profile for user {courier_user_id}"))
                })?;
                state.couriers.insert(courier_user_id, count + 1);
                Some(count + 1)
            }
            None => None,
        };
        state.orders.insert(id, order.clone());
        record(&mut state, &update.events);
        Ok(UpdatedOrder {
            order,
            courier_completed_deliveries,
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut state = self.lock();
        state.order_sequence.retain(|o| *o != id);
        let removed = state.orders.remove(&id).is_some();
        if removed {
            state.writes += 1;
        }
        Ok(removed)
    }

    fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, DomainError> {
        let state = self.lock();
        Ok(state
            .order_sequence
            .iter()
            .rev()
            .filter_map(|id| state.orders.get(id))
            .filter(|o| match filter {
                OrderFilter::All => true,
                OrderFilter::Client(id) => o.client_id == id,
                OrderFilter::Restaurant(id) => o.restaurant_id == id,
                OrderFilter::Courier(id) => o.courier_id == Some(id),
            })
            .cloned()
            .collect())
    }
}

impl DishRepository for InMemoryStore {
    fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, DomainError> {
        Ok(self.lock().dishes.get(&id).cloned())
    }

    fn find_dishes(&self, ids: &[Uuid]) -> Result<Vec<Dish>, DomainError> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.dishes.get(id).cloned()).collect())
    }

    fn upsert_promotion(&self, dish_id: Uuid, promotion: &Promotion) -> Result<(), DomainError> {
        let mut state = self.lock();
        let dish = state
            .dishes
            .get_mut(&dish_id)
            .ok_or(DomainError::NotFound("Dish"))?;
        dish.promotion = Some(promotion.clone());
        state.writes += 1;
        Ok(())
    }

    fn delete_promotion(&self, dish_id: Uuid) -> Result<bool, DomainError> {
        let mut state = self.lock();
        let removed = state
            .dishes
            .get_mut(&dish_id)
            .and_then(|d| d.promotion.take())
            .is_some();
        if removed {
            state.writes += 1;
        }
        Ok(removed)
    }

    fn list_promoted(&self, restaurant_id: Uuid) -> Result<Vec<Dish>, DomainError> {
        let state = self.lock();
        let mut dishes: Vec<Dish> = state
            .dishes
            .values()
            .filter(|d| d.restaurant_id == restaurant_id && d.promotion.is_some())
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(dishes)
    }
}

impl DirectoryRepository for InMemoryStore {
    fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>, DomainError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        Ok(self.lock().restaurants.get(&id).cloned())
    }

    fn find_restaurant_by_owner(&self, owner_id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        Ok(self
            .lock()
            .restaurants
            .values()
            .find(|r| r.owner_id == owner_id)
            .cloned())
    }
}

/// One restaurant with a 20.00 dish, its owner, a client, a courier with a
/// profile, an admin, and a second restaurant owned by someone else.
pub struct Fixture {
    pub store: InMemoryStore,
    pub client_id: Uuid,
    pub owner_id: Uuid,
    pub courier_id: Uuid,
    pub admin_id: Uuid,
    pub restaurant_id: Uuid,
    pub dish_id: Uuid,
    pub other_owner_id: Uuid,
    pub other_dish_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let store = InMemoryStore::default();
        let client_id = store.add_user(Role::Client);
        let owner_id = store.add_user(Role::Restaurant);
        let courier_id = store.add_user(Role::Livreur);
        let admin_id = store.add_user(Role::Admin);
        let restaurant_id = store.add_restaurant(owner_id);
        let dish_id = store.add_dish(restaurant_id, "20.00");
        store.add_courier_profile(courier_id, 4);

        let other_owner_id = store.add_user(Role::Restaurant);
        let other_restaurant_id = store.add_restaurant(other_owner_id);
        let other_dish_id = store.add_dish(other_restaurant_id, "8.50");

        Self {
            store,
            client_id,
            owner_id,
            courier_id,
            admin_id,
            restaurant_id,
            dish_id,
            other_owner_id,
            other_dish_id,
        }
    }

    pub fn client(&self) -> Actor {
        Actor::new(self.client_id, Role::Client)
    }

    pub fn owner(&self) -> Actor {
        Actor::new(self.owner_id, Role::Restaurant)
    }

    pub fn other_owner(&self) -> Actor {
        Actor::new(self.other_owner_id, Role::Restaurant)
    }

    pub fn courier(&self) -> Actor {
        Actor::new(self.courier_id, Role::Livreur)
    }

    pub fn admin(&self) -> Actor {
        Actor::new(self.admin_id, Role::Admin)
    }
}
