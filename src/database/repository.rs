use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Event, Place, Route};
use crate::services::resolver::{GeoLookup, LookupError};

// Array columns are NULL for rows saved without them; they decode as empty.
const ROUTE_COLUMNS: &str = "id, company_id, name, description, \
     COALESCE(places, '{}') AS places, COALESCE(events, '{}') AS events, is_deleted";
const PLACE_COLUMNS: &str = "id, name, description, COALESCE(carousel, '{}') AS carousel, \
     address_text, address_lng, address_lat, is_deleted";
const EVENT_COLUMNS: &str = "id, company_id, name, description, COALESCE(carousel, '{}') AS carousel, \
     COALESCE(tags, '{}') AS tags, icon, start_time, address_text, address_lng, address_lat, is_deleted";

/// Read side of the routes table.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn get_route(&self, id: Uuid) -> Result<Route, DatabaseError>;
    async fn all_routes(&self) -> Result<Vec<Route>, DatabaseError>;
    async fn company_routes(&self, company_id: Uuid) -> Result<Vec<Route>, DatabaseError>;
    /// Case-insensitive substring match on name or description.
    async fn search_routes(&self, query: &str) -> Result<Vec<Route>, DatabaseError>;
    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Postgres-backed reads, served from the read pool.
#[derive(Debug, Clone)]
pub struct Repository {
    db: DatabaseManager,
}

impl Repository {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.reader()
    }
}

#[async_trait]
impl RouteStore for Repository {
    async fn get_route(&self, id: Uuid) -> Result<Route, DatabaseError> {
        let sql = format!("SELECT {} FROM routes WHERE id = $1 AND is_deleted = false", ROUTE_COLUMNS);

        sqlx::query_as::<_, Route>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Route not found".to_string()))
    }

    async fn all_routes(&self) -> Result<Vec<Route>, DatabaseError> {
        let sql = format!("SELECT {} FROM routes WHERE is_deleted = false", ROUTE_COLUMNS);

        Ok(sqlx::query_as::<_, Route>(&sql).fetch_all(self.pool()).await?)
    }

    async fn company_routes(&self, company_id: Uuid) -> Result<Vec<Route>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM routes WHERE company_id = $1 AND is_deleted = false",
            ROUTE_COLUMNS
        );

        Ok(sqlx::query_as::<_, Route>(&sql)
            .bind(company_id)
            .fetch_all(self.pool())
            .await?)
    }

    async fn search_routes(&self, query: &str) -> Result<Vec<Route>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM routes \
             WHERE is_deleted = false \
             AND (LOWER(name) LIKE LOWER($1) ESCAPE '\\' OR LOWER(description) LIKE LOWER($1) ESCAPE '\\')",
            ROUTE_COLUMNS
        );

        Ok(sqlx::query_as::<_, Route>(&sql)
            .bind(like_pattern(query))
            .fetch_all(self.pool())
            .await?)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.db.health_check().await
    }
}

#[async_trait]
impl GeoLookup for Repository {
    async fn get_place(&self, id: Uuid) -> Result<Place, LookupError> {
        let sql = format!("SELECT {} FROM places WHERE id = $1 AND is_deleted = false", PLACE_COLUMNS);

        sqlx::query_as::<_, Place>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(DatabaseError::from)?
            .ok_or(LookupError::NotFound)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, LookupError> {
        let sql = format!("SELECT {} FROM events WHERE id = $1 AND is_deleted = false", EVENT_COLUMNS);

        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(DatabaseError::from)?
            .ok_or(LookupError::NotFound)
    }
}

/// `%query%` with LIKE metacharacters escaped
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coalesces(columns: &str, column: &str) -> bool {
        columns.contains(&format!("COALESCE({}, '{{}}') AS {}", column, column))
    }

    #[test]
    fn array_columns_read_null_as_empty() {
        assert!(coalesces(ROUTE_COLUMNS, "places"));
        assert!(coalesces(ROUTE_COLUMNS, "events"));
        assert!(coalesces(PLACE_COLUMNS, "carousel"));
        assert!(coalesces(EVENT_COLUMNS, "carousel"));
        assert!(coalesces(EVENT_COLUMNS, "tags"));
    }

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("park"), "%park%");
        assert_eq!(like_pattern("100%_fun"), "%100\\%\\_fun%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
