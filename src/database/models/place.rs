use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Place {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub carousel: Vec<String>,
    pub address_text: String,
    pub address_lng: f64,
    pub address_lat: f64,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}
