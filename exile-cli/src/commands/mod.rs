pub mod add;
pub mod cache;
pub mod resolve;
pub mod rm;
