//! Row types. Each maps one table and deserializes from the store's JSON rows.

use serde::{de::DeserializeOwned, Serialize};

use super::store::TableSpec;

pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const TABLE: TableSpec;

    fn id(&self) -> i64;
}

macro_rules! entity {
    ($ty:ty, $table:expr) => {
        impl $crate::database::models::Entity for $ty {
            const TABLE: $crate::database::store::TableSpec = $table;

            fn id(&self) -> i64 {
                self.id
            }
        }
    };
}

pub(crate) use entity;

pub mod access;
pub mod brand;
pub mod category;
pub mod color;
pub mod product;
pub mod size;
pub mod user;

pub use access::{AccessToken, Permission, Role, RolePermission, UserPermission, UserRole};
pub use brand::Brand;
pub use category::Category;
pub use color::Color;
pub use product::{Product, ProductVariant};
pub use size::Size;
pub use user::User;

fn default_one() -> i32 {
    1
}

fn default_true() -> bool {
    true
}
