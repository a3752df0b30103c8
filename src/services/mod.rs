pub mod aggregation;
pub mod resolver;

pub use aggregation::RouteAggregationService;
pub use resolver::{AggregationError, GeoLookup, LookupError, ReferenceResolver};
