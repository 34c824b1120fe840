use async_trait::async_trait;
use omw_lib::{position::LatLng, route::RouteMetrics};
use serde::Deserialize;

use crate::RouteError;

pub const DIRECTIONS_BASE_URL: &str = "https://maps.googleapis.com";

/// Turns the current position and a destination address into route metrics.
///
/// Called once per position sample, so implementations must be safe to call repeatedly.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve(&self, origin: LatLng, destination: &str) -> Result<RouteMetrics, RouteError>;
}

/// Driving directions from a Google Directions compatible JSON API.
#[derive(Clone)]
pub struct DirectionsResolver {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DirectionsResolver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DIRECTIONS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
    overview_polyline: EncodedPolyline,
}

#[derive(Deserialize)]
struct DirectionsLeg {
    distance: ValueField,
    duration: ValueField,
}

#[derive(Deserialize)]
struct ValueField {
    value: f64,
}

#[derive(Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[async_trait]
impl RouteResolver for DirectionsResolver {
    async fn resolve(&self, origin: LatLng, destination: &str) -> Result<RouteMetrics, RouteError> {
        let url = format!("{}/maps/api/directions/json", self.base_url);
        let origin = origin.to_string();

        let response = self
            .client
            .get(url)
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination),
                ("mode", "driving"),
                ("units", "imperial"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|err| RouteError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::Request(format!("routing service returned {status}")));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| RouteError::InvalidResponse(err.to_string()))?;

        if body.status != "OK" {
            tracing::warn!("Directions request for {:?} failed with {}", destination, body.status);
            return Err(RouteError::Status(body.status));
        }

        let route = body.routes.into_iter().next().ok_or(RouteError::NoRoute)?;
        let leg = route.legs.first().ok_or(RouteError::NoRoute)?;
        let path = decode_polyline(&route.overview_polyline.points)?;

        Ok(RouteMetrics::from_service_units(leg.distance.value, leg.duration.value, path))
    }
}

/// Decodes a Google encoded polyline (1e5 precision).
pub fn decode_polyline(encoded: &str) -> Result<Vec<LatLng>, RouteError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lng = 0i64;
    let mut path = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lng += next_delta(bytes, &mut index)?;
        path.push(LatLng::new(lat as f64 / 1e5, lng as f64 / 1e5));
    }

    Ok(path)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, RouteError> {
    let mut result = 0i64;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(RouteError::InvalidResponse("truncated polyline".into()));
        };
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(RouteError::InvalidResponse("malformed polyline".into()));
        }
        *index += 1;

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn assert_close(a: LatLng, b: LatLng) {
        assert!((a.lat - b.lat).abs() < 1e-6 && (a.lng - b.lng).abs() < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    fn decodes_reference_polyline() {
        let path = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(path.len(), 3);
        assert_close(path[0], LatLng::new(38.5, -120.2));
        assert_close(path[1], LatLng::new(40.7, -120.95));
        assert_close(path[2], LatLng::new(43.252, -126.453));
    }

    #[test]
    fn rejects_truncated_polyline() {
        assert!(matches!(decode_polyline("_p~iF"), Err(RouteError::InvalidResponse(_))));
        assert_eq!(decode_polyline("").unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn resolves_metrics_from_first_leg() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "status": "OK",
            "routes": [{
                "legs": [{
                    "distance": {"text": "1.0 mi", "value": 1609.34},
                    "duration": {"text": "12 mins", "value": 725}
                }],
                "overview_polyline": {"points": "_p~iF~ps|U_ulLnnqC"}
            }]
        });

        Mock::given(method("GET"))
            .and(path("/maps/api/directions/json"))
            .and(query_param("origin", "40.7589,-73.9851"))
            .and(query_param("destination", "1 Main St"))
            .and(query_param("mode", "driving"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let resolver = DirectionsResolver::new("test-key").with_base_url(server.uri());
        let metrics = resolver
            .resolve(LatLng::new(40.7589, -73.9851), "1 Main St")
            .await
            .unwrap();

        assert!((metrics.distance_miles - 1.0).abs() < 0.01);
        assert_eq!(metrics.eta_minutes, 12);
        assert_eq!(metrics.path.len(), 2);
    }

    #[tokio::test]
    async fn non_ok_status_is_route_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/maps/api/directions/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "NOT_FOUND", "routes": []})),
            )
            .mount(&server)
            .await;

        let resolver = DirectionsResolver::new("test-key").with_base_url(server.uri());
        let result = resolver.resolve(LatLng::new(0., 0.), "nowhere").await;

        assert_eq!(result, Err(RouteError::Status("NOT_FOUND".into())));
    }

    #[tokio::test]
    async fn http_failure_is_request_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = DirectionsResolver::new("test-key").with_base_url(server.uri());
        let result = resolver.resolve(LatLng::new(0., 0.), "1 Main St").await;

        assert!(matches!(result, Err(RouteError::Request(_))));
    }
}
