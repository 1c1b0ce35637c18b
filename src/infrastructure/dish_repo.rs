use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::DishRepository;
use crate::domain::promotion::{Dish, Promotion};
use crate::schema::{dish_promotions, dishes, restaurants};

use super::models::{DishRow, PromotionRow};

type DishRecord = (DishRow, Uuid, Option<PromotionRow>);

fn to_domain((dish, owner_id, promotion): DishRecord) -> Dish {
    Dish {
        id: dish.id,
        restaurant_id: dish.restaurant_id,
        restaurant_owner_id: owner_id,
        name: dish.name,
        description: dish.description,
        price: dish.price,
        images: dish.images,
        available: dish.available,
        promotion: promotion.map(|p| Promotion {
            is_active: p.is_active,
            percentage: p.percentage,
            discounted_price: p.discounted_price,
            starts_at: p.starts_at,
            ends_at: p.ends_at,
            message: p.message,
        }),
    }
}

pub struct DieselDishRepository {
    pool: DbPool,
}

impl DieselDishRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl DishRepository for DieselDishRepository {
    fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, DomainError> {
        let mut conn = self.pool.get()?;

        let record = dishes::table
            .inner_join(restaurants::table)
            .left_join(dish_promotions::table)
            .filter(dishes::id.eq(id))
            .select((
                DishRow::as_select(),
                restaurants::owner_id,
                dish_promotions::all_columns.nullable(),
            ))
            .first::<DishRecord>(&mut conn)
            .optional()?;

        Ok(record.map(to_domain))
    }

    fn find_dishes(&self, ids: &[Uuid]) -> Result<Vec<Dish>, DomainError> {
        let mut conn = self.pool.get()?;

        let records = dishes::table
            .inner_join(restaurants::table)
            .left_join(dish_promotions::table)
            .filter(dishes::id.eq_any(ids.to_vec()))
            .select((
                DishRow::as_select(),
                restaurants::owner_id,
                dish_promotions::all_columns.nullable(),
            ))
            .load::<DishRecord>(&mut conn)?;

        Ok(records.into_iter().map(to_domain).collect())
    }

    fn upsert_promotion(&self, dish_id: Uuid, promotion: &Promotion) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        let row = PromotionRow {
            dish_id,
            is_active: promotion.is_active,
            percentage: promotion.percentage.clone(),
            discounted_price: promotion.discounted_price.clone(),
            starts_at: promotion.starts_at,
            ends_at: promotion.ends_at,
            message: promotion.message.clone(),
            updated_at: Utc::now(),
        };
        diesel::insert_into(dish_promotions::table)
            .values(&row)
            .on_conflict(dish_promotions::dish_id)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete_promotion(&self, dish_id: Uuid) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(dish_promotions::table.find(dish_id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn list_promoted(&self, restaurant_id: Uuid) -> Result<Vec<Dish>, DomainError> {
        let mut conn = self.pool.get()?;

        let records = dishes::table
            .inner_join(restaurants::table)
            .inner_join(dish_promotions::table)
            .filter(dishes::restaurant_id.eq(restaurant_id))
            .order((dishes::name.asc(), dishes::id.asc()))
            .select((
                DishRow::as_select(),
                restaurants::owner_id,
                dish_promotions::all_columns.nullable(),
            ))
            .load::<DishRecord>(&mut conn)?;

        Ok(records.into_iter().map(to_domain).collect())
    }
}
