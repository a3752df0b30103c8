// testing/mod.rs - in-memory storage for tests and local runs without Postgres

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{Event, Place, Route};
use crate::database::{DatabaseError, RouteStore};
use crate::services::resolver::{GeoLookup, LookupError};

#[derive(Default)]
struct Tables {
    places: HashMap<Uuid, Place>,
    events: HashMap<Uuid, Event>,
    routes: Vec<Route>,
}

/// Shared in-memory tables. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    failing: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Marks one entity lookup as running until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&self, name: &str) -> Uuid {
        self.insert_place(name, false)
    }

    pub fn add_deleted_place(&self, name: &str) -> Uuid {
        self.insert_place(name, true)
    }

    pub fn add_event(&self, name: &str) -> Uuid {
        self.insert_event(name, false)
    }

    pub fn add_deleted_event(&self, name: &str) -> Uuid {
        self.insert_event(name, true)
    }

    pub fn add_route(&self, name: &str, places: Vec<String>, events: Vec<String>) -> Route {
        self.add_company_route(None, name, places, events)
    }

    pub fn add_company_route(
        &self,
        company_id: Option<Uuid>,
        name: &str,
        places: Vec<String>,
        events: Vec<String>,
    ) -> Route {
        let route = Route {
            id: Uuid::new_v4(),
            company_id,
            name: name.to_string(),
            description: format!("{} description", name),
            places,
            events,
            is_deleted: false,
        };
        self.write().routes.push(route.clone());
        route
    }

    /// Every later call fails as if the database were unreachable.
    pub fn fail_lookups(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Every later entity lookup waits forever.
    pub fn stall_lookups(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Highest number of entity lookups that were running at the same time.
    pub fn peak_lookups(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    fn insert_place(&self, name: &str, is_deleted: bool) -> Uuid {
        let id = Uuid::new_v4();
        let place = Place {
            id,
            name: name.to_string(),
            description: format!("{} description", name),
            carousel: vec![],
            address_text: format!("{} address", name),
            address_lng: 37.62,
            address_lat: 55.75,
            is_deleted,
        };
        self.write().places.insert(id, place);
        id
    }

    fn insert_event(&self, name: &str, is_deleted: bool) -> Uuid {
        let id = Uuid::new_v4();
        let event = Event {
            id,
            company_id: None,
            name: name.to_string(),
            description: format!("{} description", name),
            carousel: vec![],
            tags: vec![],
            icon: String::new(),
            start_time: Utc::now(),
            address_text: format!("{} address", name),
            address_lng: 37.62,
            address_lat: 55.75,
            is_deleted,
        };
        self.write().events.insert(id, event);
        id
    }

    async fn guard(&self) -> Result<(), DatabaseError> {
        if self.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("connection refused".to_string()));
        }
        // A real query suspends at least once
        tokio::task::yield_now().await;
        Ok(())
    }

    fn check_available(&self) -> Result<(), DatabaseError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("connection refused".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live_routes(&self, keep: impl Fn(&Route) -> bool) -> Vec<Route> {
        self.read()
            .routes
            .iter()
            .filter(|route| !route.is_deleted && keep(route))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GeoLookup for MemoryStore {
    async fn get_place(&self, id: Uuid) -> Result<Place, LookupError> {
        let _running = self.enter();
        self.guard().await?;
        self.read()
            .places
            .get(&id)
            .filter(|place| !place.is_deleted)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, LookupError> {
        let _running = self.enter();
        self.guard().await?;
        self.read()
            .events
            .get(&id)
            .filter(|event| !event.is_deleted)
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn get_route(&self, id: Uuid) -> Result<Route, DatabaseError> {
        self.check_available()?;
        self.live_routes(|route| route.id == id)
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound("Route not found".to_string()))
    }

    async fn all_routes(&self) -> Result<Vec<Route>, DatabaseError> {
        self.check_available()?;
        Ok(self.live_routes(|_| true))
    }

    async fn company_routes(&self, company_id: Uuid) -> Result<Vec<Route>, DatabaseError> {
        self.check_available()?;
        Ok(self.live_routes(|route| route.company_id == Some(company_id)))
    }

    async fn search_routes(&self, query: &str) -> Result<Vec<Route>, DatabaseError> {
        self.check_available()?;
        let needle = query.to_lowercase();
        Ok(self.live_routes(|route| {
            route.name.to_lowercase().contains(&needle) || route.description.to_lowercase().contains(&needle)
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.check_available()
    }
}
