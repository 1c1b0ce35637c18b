pub mod actor;
pub mod errors;
pub mod order;
pub mod ports;
pub mod promotion;
