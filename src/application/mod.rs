pub mod order_service;
pub mod promotion_service;

use std::sync::Arc;

use crate::domain::ports::{DirectoryRepository, DishRepository, OrderRepository};

pub use order_service::{OrderService, PaymentConfirmation};
pub use promotion_service::{AppliedPromotion, PromotionService};

pub type SharedOrderService = OrderService<
    Arc<dyn OrderRepository>,
    Arc<dyn DishRepository>,
    Arc<dyn DirectoryRepository>,
>;

pub type SharedPromotionService = PromotionService<Arc<dyn DishRepository>>;
