use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity;
use crate::database::schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Size {
    pub id: i64,
    pub name: String,
    pub code: String,
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

entity!(Size, schema::SIZES);
