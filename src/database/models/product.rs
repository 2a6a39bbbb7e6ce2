use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity;
use crate::database::schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub uuid: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub description: Option<String>,
    #[serde(default)]
    pub base_price: Decimal,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "super::default_one")]
    pub status_id: i32,
    #[serde(default = "super::default_one")]
    pub order: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i64>,
}

entity!(Product, schema::PRODUCTS);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: i64,
    pub product_id: i64,
    pub color_id: Option<i64>,
    pub size_id: Option<i64>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub price_adjustment: Decimal,
    pub sku_extension: String,
    #[serde(default = "super::default_one")]
    pub status_id: i32,
    #[serde(default = "super::default_one")]
    pub order: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i64>,
}

entity!(ProductVariant, schema::PRODUCT_VARIANTS);
