use std::fmt;

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Event, Place};

/// Base route row. References are stored as strings and resolved on read.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Route {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub places: Vec<String>,
    #[serde(skip)]
    pub events: Vec<String>,
    #[serde(skip)]
    pub is_deleted: bool,
}

impl Route {
    /// References in display order: every event, then every place.
    ///
    /// Storage keeps the two kinds in separate columns, so no cross-kind
    /// ordering exists to recover; this fixed order is what clients expect.
    pub fn geo_refs(&self) -> Vec<GeoRef> {
        self.events
            .iter()
            .map(|id| GeoRef::new(RefKind::Event, id.clone()))
            .chain(self.places.iter().map(|id| GeoRef::new(RefKind::Place, id.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Place,
    Event,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Place => "place",
            RefKind::Event => "event",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference tagged with the kind of entity it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRef {
    pub kind: RefKind,
    pub id: String,
}

impl GeoRef {
    pub fn new(kind: RefKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// One resolved element of a route's geography.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "object", rename_all = "lowercase")]
pub enum RouteGeo {
    Event(Event),
    Place(Place),
}

impl RouteGeo {
    pub fn kind(&self) -> RefKind {
        match self {
            RouteGeo::Event(_) => RefKind::Event,
            RouteGeo::Place(_) => RefKind::Place,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            RouteGeo::Event(event) => event.id,
            RouteGeo::Place(place) => place.id,
        }
    }
}

/// Client-facing route: base fields plus resolved geography.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteWithGeo {
    #[serde(flatten)]
    pub route: Route,
    pub geo: Vec<RouteGeo>,
}
