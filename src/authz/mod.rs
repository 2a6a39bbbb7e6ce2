pub mod assignments;
pub mod cache;
pub mod gate;
pub mod grants;
pub mod requirement;

pub use assignments::Assignments;
pub use cache::PermissionCache;
pub use gate::{with_admin_bypass, AdminBypass, CapabilityCheck, Decision, Gate, GrantCheck};
pub use grants::Grants;
pub use requirement::{Requirement, RequirementParseError, Requirements};
