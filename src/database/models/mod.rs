pub mod event;
pub mod place;
pub mod route;

pub use event::Event;
pub use place::Place;
pub use route::{GeoRef, RefKind, Route, RouteGeo, RouteWithGeo};
