use std::{sync::Mutex, time::Duration};

use futures::{channel::mpsc, stream::BoxStream, StreamExt};
use omw_lib::position::PositionSample;

use crate::LocationError;

pub type PositionStream = BoxStream<'static, Result<PositionSample, LocationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub enable_high_accuracy: bool,
    /// Oldest cached position the platform may hand back.
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            maximum_age: Duration::from_secs(10),
        }
    }
}

/// Source of device positions.
///
/// `watch` opens a subscription. Dropping the returned stream ends it.
pub trait GeolocationFeed: Send + Sync {
    fn watch(&self, options: WatchOptions) -> PositionStream;
}

/// Feed backed by a channel, for platforms that deliver positions through callbacks.
///
/// Only the most recent `watch` receives samples. Opening a new watch ends the previous stream.
#[derive(Default)]
pub struct ChannelFeed {
    subscriber: Mutex<Option<mpsc::UnboundedSender<Result<PositionSample, LocationError>>>>,
}

impl ChannelFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards a platform callback. Returns false when nobody is watching.
    pub fn push(&self, update: Result<PositionSample, LocationError>) -> bool {
        let Ok(mut subscriber) = self.subscriber.lock() else {
            tracing::error!("Geolocation subscriber lock poisoned");
            return false;
        };

        let Some(tx) = subscriber.as_ref() else {
            return false;
        };
        if tx.unbounded_send(update).is_ok() {
            return true;
        }

        // Receiver dropped, the watch was cleared.
        *subscriber = None;
        false
    }

    pub fn is_watching(&self) -> bool {
        self.subscriber
            .lock()
            .map(|subscriber| subscriber.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}

impl GeolocationFeed for ChannelFeed {
    fn watch(&self, options: WatchOptions) -> PositionStream {
        let (tx, rx) = mpsc::unbounded();

        match self.subscriber.lock() {
            Ok(mut subscriber) => {
                tracing::debug!("Opening position watch {:?}", options);
                *subscriber = Some(tx);
            }
            Err(_) => {
                tracing::error!("Geolocation subscriber lock poisoned");
                let _ = tx.unbounded_send(Err(LocationError::PositionUnavailable));
            }
        }

        rx.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omw_lib::position::LatLng;

    #[tokio::test]
    async fn only_latest_watch_receives() {
        let feed = ChannelFeed::new();
        assert!(!feed.push(Ok(PositionSample::now(LatLng::new(0., 0.)))));

        let mut first = feed.watch(WatchOptions::default());
        let mut second = feed.watch(WatchOptions::default());

        assert!(feed.push(Err(LocationError::PermissionDenied)));
        assert_eq!(second.next().await, Some(Err(LocationError::PermissionDenied)));
        // First sender was replaced and dropped.
        assert_eq!(first.next().await, None);
    }

    #[tokio::test]
    async fn dropping_stream_unsubscribes() {
        let feed = ChannelFeed::new();
        let stream = feed.watch(WatchOptions::default());
        assert!(feed.is_watching());

        drop(stream);
        assert!(!feed.is_watching());
        assert!(!feed.push(Ok(PositionSample::now(LatLng::new(1., 1.)))));
    }
}
