pub mod auth;
pub mod require;
pub mod throttle;

pub use auth::{authenticate, bearer_token};
pub use require::require;
pub use throttle::{throttle, RateLimiter};
