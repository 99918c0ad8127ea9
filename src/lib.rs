pub mod auth;
pub mod bidding;
pub mod config;
pub mod database;
pub mod feed;
pub mod handlers;
pub mod query;
pub mod sync;
