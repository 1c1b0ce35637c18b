use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::actor::UserSummary;
use crate::domain::errors::DomainError;
use crate::domain::ports::{DirectoryRepository, Restaurant};
use crate::schema::{restaurants, users};

use super::models::{RestaurantRow, UserRow};

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Restaurant {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
        }
    }
}

pub struct DieselDirectoryRepository {
    pool: DbPool,
}

impl DieselDirectoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl DirectoryRepository for DieselDirectoryRepository {
    fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()?;

        row.map(|u| {
            let role = u.role.parse().map_err(|_| {
                DomainError::Internal(format!("user {} has unknown role '{}'", u.id, u.role))
            })?;
            Ok(UserSummary {
                id: u.id,
                first_name: u.first_name,
                last_name: u.last_name,
                email: u.email,
                role,
            })
        })
        .transpose()
    }

    fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = restaurants::table
            .find(id)
            .select(RestaurantRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(Restaurant::from))
    }

    fn find_restaurant_by_owner(&self, owner_id: Uuid) -> Result<Option<Restaurant>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = restaurants::table
            .filter(restaurants::owner_id.eq(owner_id))
            .order(restaurants::created_at.asc())
            .select(RestaurantRow::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(row.map(Restaurant::from))
    }
}
