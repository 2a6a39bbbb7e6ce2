pub mod api;
pub mod app;
pub mod auth;
pub mod authz;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod seed;
pub mod slug;
pub mod state;

pub use app::{router, serve};
pub use state::AppState;
