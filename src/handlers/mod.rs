pub mod auth;
pub mod brands;
pub mod categories;
pub mod colors;
pub mod common;
pub mod health;
pub mod permissions;
pub mod products;
pub mod roles;
pub mod sizes;
pub mod users;
pub mod variants;
