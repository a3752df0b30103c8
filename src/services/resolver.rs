// services/resolver.rs - best-effort resolution of route references
//
// A route stores plain string ids. Rows can be deleted or ids mistyped after
// the route was saved, so a reference that does not parse or does not
// resolve is dropped from the result. Storage failures are not: they fail
// the whole read.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Event, GeoRef, Place, RefKind, RouteGeo};
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum LookupError {
    /// The row does not exist or is deleted
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("storage failure while resolving {kind} {id}: {source}")]
    Storage {
        kind: RefKind,
        id: Uuid,
        #[source]
        source: DatabaseError,
    },

    #[error("route aggregation timed out")]
    Timeout,
}

/// Read access to the entities a route can reference.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn get_place(&self, id: Uuid) -> Result<Place, LookupError>;
    async fn get_event(&self, id: Uuid) -> Result<Event, LookupError>;
}

#[async_trait]
impl<T: GeoLookup + ?Sized> GeoLookup for Arc<T> {
    async fn get_place(&self, id: Uuid) -> Result<Place, LookupError> {
        (**self).get_place(id).await
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, LookupError> {
        (**self).get_event(id).await
    }
}

pub struct ReferenceResolver<L> {
    lookup: L,
}

impl<L: GeoLookup> ReferenceResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Resolve a homogeneous list of references of one kind.
    pub async fn resolve(&self, refs: &[String], kind: RefKind) -> Result<Vec<RouteGeo>, AggregationError> {
        let tagged: Vec<GeoRef> = refs.iter().map(|id| GeoRef::new(kind, id.clone())).collect();
        self.resolve_tagged(&tagged).await
    }

    /// Resolve references in order. The result is a subsequence of `refs`:
    /// unparseable and missing references are skipped, nothing is reordered
    /// or deduplicated.
    pub async fn resolve_tagged(&self, refs: &[GeoRef]) -> Result<Vec<RouteGeo>, AggregationError> {
        let mut resolved = Vec::with_capacity(refs.len());

        for reference in refs {
            let id = match Uuid::parse_str(reference.id.trim()) {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!("Skipping malformed {} reference '{}'", reference.kind, reference.id);
                    continue;
                }
            };

            match self.fetch(reference.kind, id).await {
                Ok(geo) => resolved.push(geo),
                Err(LookupError::NotFound) => {
                    tracing::debug!("Skipping dangling {} reference {}", reference.kind, id);
                }
                Err(LookupError::Storage(source)) => {
                    tracing::error!("Failed to resolve {} {}: {}", reference.kind, id, source);
                    return Err(AggregationError::Storage {
                        kind: reference.kind,
                        id,
                        source,
                    });
                }
            }
        }

        Ok(resolved)
    }

    async fn fetch(&self, kind: RefKind, id: Uuid) -> Result<RouteGeo, LookupError> {
        match kind {
            RefKind::Place => self.lookup.get_place(id).await.map(RouteGeo::Place),
            RefKind::Event => self.lookup.get_event(id).await.map(RouteGeo::Event),
        }
    }
}
