pub mod directory_repo;
pub mod dish_repo;
pub mod models;
pub mod order_repo;

use crate::domain::errors::DomainError;

pub use directory_repo::DieselDirectoryRepository;
pub use dish_repo::DieselDishRepository;
pub use order_repo::DieselOrderRepository;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}
