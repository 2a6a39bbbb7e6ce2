//! Table descriptions shared by both store backends. Postgres mirrors the
//! `unique` groups with partial unique indexes in `migrations/`.

use super::store::TableSpec;

pub const USERS: TableSpec = TableSpec { name: "users", soft_delete: true, unique: &[&["email"], &["uuid"]] };
pub const ROLES: TableSpec = TableSpec { name: "roles", soft_delete: false, unique: &[&["name"]] };
pub const PERMISSIONS: TableSpec = TableSpec { name: "permissions", soft_delete: false, unique: &[&["name"]] };

pub const ROLE_PERMISSIONS: TableSpec = TableSpec {
    name: "role_permissions",
    soft_delete: false,
    unique: &[&["role_id", "permission_id"]],
};
pub const USER_ROLES: TableSpec = TableSpec {
    name: "user_roles",
    soft_delete: false,
    unique: &[&["user_id", "role_id"]],
};
pub const USER_PERMISSIONS: TableSpec = TableSpec {
    name: "user_permissions",
    soft_delete: false,
    unique: &[&["user_id", "permission_id"]],
};
pub const ACCESS_TOKENS: TableSpec = TableSpec { name: "access_tokens", soft_delete: false, unique: &[&["token_hash"]] };

pub const BRANDS: TableSpec = TableSpec { name: "brands", soft_delete: true, unique: &[&["name"], &["slug"]] };
pub const CATEGORIES: TableSpec = TableSpec { name: "categories", soft_delete: true, unique: &[&["slug"]] };
pub const PRODUCTS: TableSpec = TableSpec {
    name: "products",
    soft_delete: true,
    unique: &[&["uuid"], &["sku"], &["slug"]],
};
pub const PRODUCT_VARIANTS: TableSpec = TableSpec { name: "product_variants", soft_delete: true, unique: &[] };
pub const COLORS: TableSpec = TableSpec { name: "colors", soft_delete: true, unique: &[&["name"], &["code"]] };
pub const SIZES: TableSpec = TableSpec { name: "sizes", soft_delete: true, unique: &[&["name"], &["code"]] };

pub const ALL: &[TableSpec] = &[
    USERS,
    ROLES,
    PERMISSIONS,
    ROLE_PERMISSIONS,
    USER_ROLES,
    USER_PERMISSIONS,
    ACCESS_TOKENS,
    BRANDS,
    CATEGORIES,
    PRODUCTS,
    PRODUCT_VARIANTS,
    COLORS,
    SIZES,
];
