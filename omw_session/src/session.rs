use std::fmt;

use omw_lib::{position::{LatLng, PositionSample}, profile::Profile, route::RouteMetrics};
use rand::{distr::Alphanumeric, Rng};

use crate::{RouteError, ValidationError};

pub const SESSION_ID_LENGTH: usize = 9;

/// Opaque token identifying a session in its share link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Random alphanumeric id that is never equal to `previous`.
    fn generate(previous: Option<&SessionId>) -> Self {
        loop {
            let id: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(SESSION_ID_LENGTH)
                .map(char::from)
                .collect();

            if previous.is_none_or(|prev| prev.0 != id) {
                return Self(id);
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Active,
}

#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: SessionId,
    pub destination: String,
    pub share_link: String,
    pub current_position: Option<LatLng>,
    pub route_metrics: Option<RouteMetrics>,
}

/// Ticket for one resolver call. Hand it back with the result.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub session_id: SessionId,
    pub generation: u64,
    pub origin: LatLng,
    pub destination: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Applied,
    /// The ticket belongs to a stopped session or was superseded by a newer request.
    Stale,
}

/// The live tracking state machine: `Idle -> Active -> Idle`.
///
/// It never performs I/O itself. Position updates produce [`RouteRequest`]s that the
/// caller resolves, and results are only accepted for the latest request of the
/// current session.
#[derive(Debug)]
pub struct TrackingSession {
    origin: String,
    active: Option<ActiveSession>,
    generation: u64,
    previous_id: Option<SessionId>,
}

impl TrackingSession {
    /// `origin` is the scheme and host share links are built on, e.g. `https://omw.app`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            active: None,
            generation: 0,
            previous_id: None,
        }
    }

    pub fn status(&self) -> Status {
        if self.active.is_some() {
            Status::Active
        } else {
            Status::Idle
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn id(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|session| &session.id)
    }

    pub fn share_link(&self) -> Option<&str> {
        self.active.as_ref().map(|session| session.share_link.as_str())
    }

    pub fn current_position(&self) -> Option<LatLng> {
        self.active.as_ref().and_then(|session| session.current_position)
    }

    pub fn route_metrics(&self) -> Option<&RouteMetrics> {
        self.active.as_ref().and_then(|session| session.route_metrics.as_ref())
    }

    /// Latest generation handed out. Zero until the first position update.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new session and returns its share link. An active session is stopped first.
    pub fn start(&mut self, profile: &Profile, destination: &str) -> Result<&str, ValidationError> {
        if !profile.has_first_name() {
            return Err(ValidationError::MissingFirstName);
        }
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(ValidationError::MissingDestination);
        }

        if self.active.is_some() {
            tracing::debug!("Starting over an active session, stopping it first");
            self.stop();
        }

        let id = SessionId::generate(self.previous_id.as_ref());
        let share_link = format!("{}/track/{}", self.origin, id);
        tracing::info!("Tracking session {} started towards {:?}", id, destination);

        let session = self.active.insert(ActiveSession {
            id,
            destination: destination.to_string(),
            share_link,
            current_position: None,
            route_metrics: None,
        });

        Ok(&session.share_link)
    }

    /// Records a new position. Returns the resolver request to issue, or `None` while idle.
    pub fn on_position_update(&mut self, sample: &PositionSample) -> Option<RouteRequest> {
        let session = self.active.as_mut()?;
        session.current_position = Some(sample.position);

        self.generation += 1;

        Some(RouteRequest {
            session_id: session.id.clone(),
            generation: self.generation,
            origin: sample.position,
            destination: session.destination.clone(),
        })
    }

    /// Applies a resolver result.
    ///
    /// A failure for the latest request is returned as the error and leaves the
    /// previous metrics untouched.
    pub fn on_route_resolved(
        &mut self,
        request: &RouteRequest,
        result: Result<RouteMetrics, RouteError>,
    ) -> Result<RouteOutcome, RouteError> {
        let Some(session) = self.active.as_mut() else {
            return Ok(RouteOutcome::Stale);
        };

        if session.id != request.session_id || request.generation != self.generation {
            tracing::trace!(
                "Discarding route for generation {} (latest is {})",
                request.generation,
                self.generation
            );
            return Ok(RouteOutcome::Stale);
        }

        let metrics = result?;
        tracing::debug!(
            "Route updated: {:.1} mi, {} min",
            metrics.distance_miles,
            metrics.eta_minutes
        );
        session.route_metrics = Some(metrics);

        Ok(RouteOutcome::Applied)
    }

    /// Ends the session. Valid from any state.
    pub fn stop(&mut self) {
        if let Some(session) = self.active.take() {
            tracing::info!("Tracking session {} stopped", session.id);
            self.previous_id = Some(session.id);
        }
    }
}
