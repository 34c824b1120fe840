use std::sync::Arc;

use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use omw_lib::{position::{LatLng, PositionSample}, profile::Profile, route::RouteMetrics};

use crate::{
    geolocation::{GeolocationFeed, PositionStream, WatchOptions},
    route_resolver::RouteResolver,
    session::{RouteOutcome, RouteRequest, TrackingSession},
    LocationError, RouteError, ValidationError,
};

type PendingRoute = BoxFuture<'static, (RouteRequest, Result<RouteMetrics, RouteError>)>;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    PositionUpdated(LatLng),
    RouteUpdated(RouteMetrics),
    /// A resolver call finished after a newer one was issued, or after its session ended.
    RouteDiscarded { generation: u64 },
    LocationFailed(LocationError),
    RouteFailed(RouteError),
    /// The platform closed the position watch.
    FeedEnded,
}

/// Drives a [`TrackingSession`] from a geolocation feed and a route resolver.
///
/// Everything runs on the task calling [`Tracker::next_event`]: the feed subscription and
/// the in-flight resolver calls are owned here and dropped on stop.
pub struct Tracker {
    session: TrackingSession,
    feed: Arc<dyn GeolocationFeed>,
    resolver: Arc<dyn RouteResolver>,
    watch_options: WatchOptions,
    subscription: Option<PositionStream>,
    in_flight: FuturesUnordered<PendingRoute>,
}

impl Tracker {
    pub fn new(origin: impl Into<String>, feed: Arc<dyn GeolocationFeed>, resolver: Arc<dyn RouteResolver>) -> Self {
        Self {
            session: TrackingSession::new(origin),
            feed,
            resolver,
            watch_options: WatchOptions::default(),
            subscription: None,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn with_watch_options(mut self, watch_options: WatchOptions) -> Self {
        self.watch_options = watch_options;
        self
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// Starts tracking and returns the share link. A running session is stopped first.
    pub fn start(&mut self, profile: &Profile, destination: &str) -> Result<String, ValidationError> {
        let link = self.session.start(profile, destination)?.to_string();

        self.release();
        self.subscription = Some(self.feed.watch(self.watch_options));

        Ok(link)
    }

    pub fn stop(&mut self) {
        self.release();
        self.session.stop();
    }

    fn release(&mut self) {
        // Dropping the stream clears the platform watch.
        self.subscription = None;
        self.in_flight.clear();
    }

    /// Waits for the next position sample or resolver result and applies it.
    ///
    /// Returns `None` when there is nothing left to wait for, i.e. while idle.
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        if self.subscription.is_none() && self.in_flight.is_empty() {
            return None;
        }

        tokio::select! {
            Some((request, result)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                Some(self.apply_route(request, result))
            }
            update = next_sample(&mut self.subscription), if self.subscription.is_some() => {
                Some(match update {
                    Some(Ok(sample)) => self.apply_position(sample),
                    Some(Err(err)) => {
                        tracing::warn!("{}", err);
                        TrackerEvent::LocationFailed(err)
                    }
                    None => {
                        tracing::info!("Position feed ended");
                        self.subscription = None;
                        TrackerEvent::FeedEnded
                    }
                })
            }
        }
    }

    fn apply_position(&mut self, sample: PositionSample) -> TrackerEvent {
        if let Some(request) = self.session.on_position_update(&sample) {
            let resolver = self.resolver.clone();
            self.in_flight.push(Box::pin(async move {
                let result = resolver.resolve(request.origin, &request.destination).await;
                (request, result)
            }));
        }

        TrackerEvent::PositionUpdated(sample.position)
    }

    fn apply_route(&mut self, request: RouteRequest, result: Result<RouteMetrics, RouteError>) -> TrackerEvent {
        match self.session.on_route_resolved(&request, result) {
            Ok(RouteOutcome::Applied) => match self.session.route_metrics() {
                Some(metrics) => TrackerEvent::RouteUpdated(metrics.clone()),
                None => TrackerEvent::RouteDiscarded { generation: request.generation },
            },
            Ok(RouteOutcome::Stale) => TrackerEvent::RouteDiscarded { generation: request.generation },
            Err(err) => {
                tracing::warn!("{}", err);
                TrackerEvent::RouteFailed(err)
            }
        }
    }
}

async fn next_sample(subscription: &mut Option<PositionStream>) -> Option<Result<PositionSample, LocationError>> {
    match subscription {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
