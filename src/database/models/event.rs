use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub carousel: Vec<String>,
    pub tags: Vec<String>,
    pub icon: String,
    pub start_time: DateTime<Utc>,
    pub address_text: String,
    pub address_lng: f64,
    pub address_lat: f64,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}
