use chrono::Utc;
use uuid::Uuid;

use crate::domain::actor::{Actor, Role};
use crate::domain::errors::DomainError;
use crate::domain::ports::DishRepository;
use crate::domain::promotion::{Dish, Promotion, PromotionTerms};

#[derive(Debug, Clone)]
pub struct AppliedPromotion {
    pub dish: Dish,
    /// `true` when the dish had no promotion before this call.
    pub created: bool,
    pub days_left: String,
}

pub struct PromotionService<D> {
    dishes: D,
}

impl<D: DishRepository> PromotionService<D> {
    pub fn new(dishes: D) -> Self {
        Self { dishes }
    }

    /// Creates the dish's promotion or overwrites the existing one in place.
    pub fn apply(
        &self,
        actor: &Actor,
        dish_id: Uuid,
        terms: PromotionTerms,
    ) -> Result<AppliedPromotion, DomainError> {
        terms.validate()?;
        let mut dish = self.owned_dish(actor, dish_id)?;

        let promotion = Promotion::from_terms(&dish.price, terms)?;
        self.dishes.upsert_promotion(dish.id, &promotion)?;

        let created = dish.promotion.is_none();
        let days_left = promotion.days_left(Utc::now());
        log::info!(
            "promotion {} on dish {}: {}% -> {}",
            if created { "created" } else { "replaced" },
            dish.id,
            promotion.percentage,
            promotion.discounted_price
        );
        dish.promotion = Some(promotion);
        Ok(AppliedPromotion {
            dish,
            created,
            days_left,
        })
    }

    /// Flips the manual flag; dates and price are kept.
    pub fn set_active(
        &self,
        actor: &Actor,
        dish_id: Uuid,
        active: bool,
    ) -> Result<Dish, DomainError> {
        let mut dish = self.owned_dish(actor, dish_id)?;
        let promotion = dish
            .promotion
            .as_mut()
            .ok_or(DomainError::NotFound("Promotion"))?;
        promotion.is_active = active;
        self.dishes.upsert_promotion(dish.id, promotion)?;
        log::info!("promotion on dish {} active={}", dish.id, active);
        Ok(dish)
    }

    pub fn deactivate(&self, actor: &Actor, dish_id: Uuid) -> Result<Dish, DomainError> {
        self.set_active(actor, dish_id, false)
    }

    /// Deletes the promotion entirely.
    pub fn remove(&self, actor: &Actor, dish_id: Uuid) -> Result<Dish, DomainError> {
        let mut dish = self.owned_dish(actor, dish_id)?;
        if dish.promotion.is_none() || !self.dishes.delete_promotion(dish.id)? {
            return Err(DomainError::NotFound("Promotion"));
        }
        dish.promotion = None;
        log::info!("promotion removed from dish {}", dish.id);
        Ok(dish)
    }

    pub fn get_for_dish(&self, dish_id: Uuid) -> Result<Dish, DomainError> {
        let dish = self
            .dishes
            .find_dish(dish_id)?
            .ok_or(DomainError::NotFound("Dish"))?;
        if dish.promotion.is_none() {
            return Err(DomainError::NotFound("Promotion"));
        }
        Ok(dish)
    }

    /// Every promoted dish of the restaurant, whether or not the promotion
    /// is currently effective.
    pub fn list_for_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<Dish>, DomainError> {
        self.dishes.list_promoted(restaurant_id)
    }

    fn owned_dish(&self, actor: &Actor, dish_id: Uuid) -> Result<Dish, DomainError> {
        actor.require_role(Role::Restaurant)?;
        let dish = self
            .dishes
            .find_dish(dish_id)?
            .ok_or(DomainError::NotFound("Dish"))?;
        if dish.restaurant_owner_id != actor.user_id {
            log::warn!(
                "user {} tried to change promotion on dish {} of another restaurant",
                actor.user_id,
                dish_id
            );
            return Err(DomainError::Forbidden(
                "dish belongs to another restaurant".into(),
            ));
        }
        Ok(dish)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::{DateTime, Duration};

    use super::*;
    use crate::testing::{Fixture, InMemoryStore};

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn terms(percentage: i32, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> PromotionTerms {
        PromotionTerms {
            percentage: BigDecimal::from(percentage),
            starts_at,
            ends_at,
            is_active: true,
            message: Some("Ramadan".into()),
        }
    }

    fn service(fx: &Fixture) -> PromotionService<InMemoryStore> {
        PromotionService::new(fx.store.clone())
    }

    #[test]
    fn apply_creates_then_replaces_in_place() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();

        let first = svc
            .apply(&fx.owner(), fx.dish_id, terms(25, now, now + Duration::days(3)))
            .unwrap();
        assert!(first.created);
        assert_eq!(
            first.dish.promotion.as_ref().unwrap().discounted_price,
            dec("15.00")
        );
        assert_eq!(first.days_left, "Il reste 3 jours");

        let second = svc
            .apply(&fx.owner(), fx.dish_id, terms(50, now, now + Duration::days(1)))
            .unwrap();
        assert!(!second.created);
        let stored = fx.store.dish_promotion(fx.dish_id).unwrap();
        assert_eq!(stored.percentage, BigDecimal::from(50));
        assert_eq!(stored.discounted_price, dec("10.00"));
        assert_eq!(second.days_left, "Il reste 1 jour");
    }

    #[test]
    fn apply_accepts_fractional_percentage() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();
        let mut half = terms(10, now, now + Duration::days(2));
        half.percentage = dec("12.5");

        svc.apply(&fx.owner(), fx.dish_id, half).unwrap();

        let stored = fx.store.dish_promotion(fx.dish_id).unwrap();
        assert_eq!(stored.percentage, dec("12.50"));
        assert_eq!(stored.discounted_price, dec("17.50"));
    }

    #[test]
    fn apply_validates_before_touching_storage() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();

        for bad in [
            terms(0, now, now + Duration::days(1)),
            terms(101, now, now + Duration::days(1)),
            terms(10, now, now),
            terms(10, now, now - Duration::days(1)),
        ] {
            let err = svc.apply(&fx.owner(), fx.dish_id, bad).unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)));
        }
        assert_eq!(fx.store.write_count(), 0);
        assert!(fx.store.dish_promotion(fx.dish_id).is_none());
    }

    #[test]
    fn apply_requires_the_owning_restaurant() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();
        let t = terms(10, now, now + Duration::days(1));

        assert!(matches!(
            svc.apply(&fx.other_owner(), fx.dish_id, t.clone()),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            svc.apply(&fx.client(), fx.dish_id, t.clone()),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            svc.apply(&fx.owner(), Uuid::new_v4(), t),
            Err(DomainError::NotFound("Dish"))
        ));
    }

    #[test]
    fn apply_with_past_end_reports_finished() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();

        let applied = svc
            .apply(
                &fx.owner(),
                fx.dish_id,
                terms(10, now - Duration::days(5), now - Duration::days(1)),
            )
            .unwrap();
        assert_eq!(applied.days_left, "Promotion terminée");
        let state = applied.dish.promotion.unwrap().state(now);
        assert!(!state.effective);
        assert!(state.dates_expired);
        assert!(!state.manually_disabled);
    }

    #[test]
    fn deactivate_keeps_data_and_remove_deletes_it() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();
        svc.apply(&fx.owner(), fx.dish_id, terms(20, now, now + Duration::days(2)))
            .unwrap();

        let dish = svc.deactivate(&fx.owner(), fx.dish_id).unwrap();
        let promo = dish.promotion.unwrap();
        assert!(!promo.is_active);
        assert_eq!(promo.percentage, BigDecimal::from(20));
        assert!(!fx.store.dish_promotion(fx.dish_id).unwrap().is_active);

        svc.set_active(&fx.owner(), fx.dish_id, true).unwrap();
        assert!(fx.store.dish_promotion(fx.dish_id).unwrap().is_active);

        let dish = svc.remove(&fx.owner(), fx.dish_id).unwrap();
        assert!(dish.promotion.is_none());
        assert!(fx.store.dish_promotion(fx.dish_id).is_none());

        assert!(matches!(
            svc.remove(&fx.owner(), fx.dish_id),
            Err(DomainError::NotFound("Promotion"))
        ));
        assert!(matches!(
            svc.set_active(&fx.owner(), fx.dish_id, true),
            Err(DomainError::NotFound("Promotion"))
        ));
    }

    #[test]
    fn queries_return_active_and_inactive_promotions() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let now = Utc::now();

        assert!(svc.list_for_restaurant(fx.restaurant_id).unwrap().is_empty());
        assert!(matches!(
            svc.get_for_dish(fx.dish_id),
            Err(DomainError::NotFound("Promotion"))
        ));

        let mut disabled = terms(30, now, now + Duration::days(4));
        disabled.is_active = false;
        svc.apply(&fx.owner(), fx.dish_id, disabled).unwrap();

        let listed = svc.list_for_restaurant(fx.restaurant_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].promotion.as_ref().unwrap().state(now).manually_disabled);
        assert_eq!(svc.get_for_dish(fx.dish_id).unwrap().id, fx.dish_id);
        assert!(svc.get_for_dish(fx.other_dish_id).is_err());
    }
}
