use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::database::models::{Route, RouteWithGeo};

use super::resolver::{AggregationError, GeoLookup, ReferenceResolver};

/// Routes of one listing aggregated at the same time, unless configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Builds the client-facing `RouteWithGeo` view of stored routes.
///
/// Every handler that returns a route goes through here, so the two shapes
/// never leak inconsistently. Each aggregation is bounded by `timeout`; a
/// timed-out or dropped aggregation yields no partial view.
pub struct RouteAggregationService {
    resolver: ReferenceResolver<Arc<dyn GeoLookup>>,
    timeout: Duration,
    concurrency: usize,
}

impl RouteAggregationService {
    pub fn new(lookup: Arc<dyn GeoLookup>, timeout: Duration) -> Self {
        Self {
            resolver: ReferenceResolver::new(lookup),
            timeout,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Each in-flight route holds one pooled connection while it resolves.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn to_route_with_geo(&self, route: Route) -> Result<RouteWithGeo, AggregationError> {
        tokio::time::timeout(self.timeout, self.aggregate(route))
            .await
            .map_err(|_| Self::timed_out())?
    }

    /// Aggregate a listing. At most `concurrency` routes resolve at once,
    /// output keeps input order.
    pub async fn to_routes_with_geo(&self, routes: Vec<Route>) -> Result<Vec<RouteWithGeo>, AggregationError> {
        let aggregations = stream::iter(routes.into_iter().map(|route| self.aggregate(route)))
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>();

        tokio::time::timeout(self.timeout, aggregations)
            .await
            .map_err(|_| Self::timed_out())?
    }

    async fn aggregate(&self, route: Route) -> Result<RouteWithGeo, AggregationError> {
        let geo = self.resolver.resolve_tagged(&route.geo_refs()).await?;
        Ok(RouteWithGeo { route, geo })
    }

    fn timed_out() -> AggregationError {
        tracing::warn!("Route aggregation exceeded its deadline");
        AggregationError::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{RefKind, RouteGeo};
    use crate::testing::MemoryStore;

    fn service(store: &MemoryStore, timeout: Duration) -> RouteAggregationService {
        RouteAggregationService::new(Arc::new(store.clone()), timeout)
    }

    #[tokio::test]
    async fn events_come_before_places() {
        let store = MemoryStore::new();
        let place = store.add_place("Square");
        let event = store.add_event("Fair");
        let route = store.add_route("City tour", vec![place.to_string()], vec![event.to_string()]);

        let view = service(&store, Duration::from_secs(5))
            .to_route_with_geo(route.clone())
            .await
            .unwrap();

        assert_eq!(view.route, route);
        let geo: Vec<(RefKind, uuid::Uuid)> = view.geo.iter().map(|g| (g.kind(), g.id())).collect();
        assert_eq!(geo, vec![(RefKind::Event, event), (RefKind::Place, place)]);
    }

    #[tokio::test]
    async fn dangling_references_only_shorten_the_view() {
        let store = MemoryStore::new();
        let place = store.add_place("Square");
        let gone = store.add_deleted_event("Cancelled show");
        let route = store.add_route(
            "Tour",
            vec!["garbage".to_string(), place.to_string()],
            vec![gone.to_string()],
        );

        let view = service(&store, Duration::from_secs(5))
            .to_route_with_geo(route)
            .await
            .unwrap();

        assert_eq!(view.geo.len(), 1);
        assert!(matches!(&view.geo[0], RouteGeo::Place(p) if p.id == place));
    }

    #[tokio::test]
    async fn listing_preserves_route_order() {
        let store = MemoryStore::new();
        let place = store.add_place("Square");
        let first = store.add_route("First", vec![place.to_string()], vec![]);
        let second = store.add_route("Second", vec![], vec![]);

        let views = service(&store, Duration::from_secs(5))
            .to_routes_with_geo(vec![first.clone(), second.clone()])
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].route.id, first.id);
        assert_eq!(views[0].geo.len(), 1);
        assert_eq!(views[1].route.id, second.id);
        assert!(views[1].geo.is_empty());
    }

    #[tokio::test]
    async fn listing_resolves_a_bounded_number_of_routes_at_once() {
        let store = MemoryStore::new();
        let routes: Vec<Route> = (0..6)
            .map(|n| {
                let place = store.add_place(&format!("Stop {}", n));
                store.add_route(&format!("Route {}", n), vec![place.to_string()], vec![])
            })
            .collect();

        let views = service(&store, Duration::from_secs(5))
            .with_concurrency(2)
            .to_routes_with_geo(routes.clone())
            .await
            .unwrap();

        assert!(store.peak_lookups() <= 2, "peak was {}", store.peak_lookups());
        let ids: Vec<uuid::Uuid> = views.iter().map(|v| v.route.id).collect();
        assert_eq!(ids, routes.iter().map(|r| r.id).collect::<Vec<_>>());
        assert!(views.iter().all(|v| v.geo.len() == 1));
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let store = MemoryStore::new();
        let route = store.add_route("Solo", vec![], vec![]);

        let views = service(&store, Duration::from_secs(5))
            .with_concurrency(0)
            .to_routes_with_geo(vec![route])
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_lookup_times_out_without_partial_view() {
        let store = MemoryStore::new();
        let place = store.add_place("Square");
        let route = store.add_route("Tour", vec![place.to_string()], vec![]);
        store.stall_lookups();

        let result = service(&store, Duration::from_millis(50))
            .to_route_with_geo(route)
            .await;

        assert!(matches!(result, Err(AggregationError::Timeout)));
    }

    #[tokio::test]
    async fn storage_failure_fails_the_listing() {
        let store = MemoryStore::new();
        let place = store.add_place("Square");
        let route = store.add_route("Tour", vec![place.to_string()], vec![]);
        store.fail_lookups();

        let result = service(&store, Duration::from_secs(5))
            .to_routes_with_geo(vec![route])
            .await;

        assert!(matches!(result, Err(AggregationError::Storage { .. })));
    }
}
