pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod requests;
pub mod store;
pub mod terminal;
