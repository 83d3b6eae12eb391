//! OSM geocoder backend (`nominatim`), rate-limited.
//!
//! The service's usage policy allows one request per second. A query
//! arriving earlier is deferred on a timer and only proceeds if the
//! shared search input still equals the deferred query at expiry —
//! otherwise it is skipped entirely. Hits can be filtered by a
//! configured classification set.

use crate::backend::{BackendCore, HttpMethod, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::collaborators::CoordinateTransform;
use crate::error::{Result, SearchError};
use crate::normalize::{self, normalize_result_events};
use crate::orchestrator::SearchInput;
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Minimum spacing between two remote calls.
const THROTTLE: Duration = Duration::from_millis(1000);

fn default_result_count() -> usize {
    10
}

fn default_category() -> String {
    "OpenStreetMap".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NominatimOptions {
    url: String,
    #[serde(default = "default_result_count")]
    result_count: usize,
    /// Accepted hit classifications; empty accepts everything.
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct NominatimBackend {
    core: BackendCore,
    options: NominatimOptions,
    icon: String,
    transform: Arc<dyn CoordinateTransform>,
    input: Arc<SearchInput>,
    last_call: Mutex<Option<Instant>>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: NominatimOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("nominatim backend: {e}")))?;
    crate::http::validate_service_url(&options.url)?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[(
            Interaction::OnClick,
            &[ActionKind::SetMarker, ActionKind::ZoomToResult],
        )]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(NominatimBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
        transform: env.portal.transform.clone(),
        input: env.input.clone(),
        last_call: Mutex::new(None),
    }))
}

impl NominatimBackend {
    fn request_url(&self, input: &str) -> String {
        format!(
            "{}?format=json&q={}&limit={}&addressdetails=1",
            self.options.url,
            urlencoding::encode(input),
            self.options.result_count
        )
    }

    fn remaining_throttle(&self) -> Option<Duration> {
        let last = self.last_call.lock().expect("throttle lock poisoned");
        last.and_then(|at| THROTTLE.checked_sub(at.elapsed()))
    }

    fn record_call(&self) {
        *self.last_call.lock().expect("throttle lock poisoned") = Some(Instant::now());
    }
}

struct NominatimHit {
    name: String,
    class: String,
    lon_lat: Vec<f64>,
}

fn parse_nominatim_response(body: &str) -> Result<Vec<NominatimHit>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("nominatim response: {e}")))?;
    let entries = value
        .as_array()
        .ok_or_else(|| SearchError::Parse("nominatim response: not an array".into()))?;
    let hits = entries
        .iter()
        .filter_map(|entry| {
            // lat/lon arrive as strings.
            let lat: f64 = normalize::text(entry, "lat").parse().ok()?;
            let lon: f64 = normalize::text(entry, "lon").parse().ok()?;
            let name = normalize::text(entry, "display_name");
            if name.is_empty() {
                return None;
            }
            Some(NominatimHit {
                name,
                class: normalize::text(entry, "class"),
                lon_lat: vec![lon, lat],
            })
        })
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchBackend for NominatimBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "nominatim"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        if let Some(delay) = self.remaining_throttle() {
            tracing::trace!(backend = %self.core.id(), ?delay, "deferring throttled request");
            tokio::time::sleep(delay).await;
            if self.input.current() != input {
                // Superseded while waiting: skip entirely.
                return Err(SearchError::Cancelled);
            }
        }
        self.record_call();

        let outcome = self
            .core
            .request_search(&self.request_url(input), HttpMethod::Get, None)
            .await;
        let body = match outcome {
            RequestOutcome::Finished { body } => body,
            RequestOutcome::Failed { error } => return Err(SearchError::Http(error)),
            RequestOutcome::Aborted => return Err(SearchError::Cancelled),
        };
        let hits = match parse_nominatim_response(&body) {
            Ok(hits) => hits,
            Err(err) => {
                self.core.mark_failed();
                return Err(err);
            }
        };

        let classes = &self.options.classes;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| classes.is_empty() || classes.contains(&hit.class))
            .take(self.options.result_count)
            .enumerate()
            .map(|(ordinal, hit)| {
                let coordinates = self.transform.to_view("EPSG:4326", &hit.lon_lat);
                let mut possible = BTreeMap::new();
                possible.insert(
                    ActionKind::SetMarker,
                    Action::SetMarker {
                        coordinates: coordinates.clone(),
                        feature: None,
                        layer_id: None,
                    },
                );
                possible.insert(
                    ActionKind::ZoomToResult,
                    Action::ZoomToResult { coordinates },
                );
                SearchResult {
                    category: self.options.category.clone(),
                    id: format!("{}-{ordinal}", self.core.id()),
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name: hit.name.clone(),
                    tool_tip: hit.name,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: hit.class,
                    events: normalize_result_events(self.core.events(), &possible),
                }
            })
            .collect();

        self.core.record_results(&results);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPortal;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOMINATIM_RESPONSE: &str = r#"[
        {"display_name": "Stadtpark, Hamburg", "lat": "53.5950", "lon": "10.0169", "class": "leisure"},
        {"display_name": "Stadtpark Apotheke", "lat": "53.5901", "lon": "10.0311", "class": "amenity"}
    ]"#;

    fn backend(portal: &TestPortal, url: &str, classes: serde_json::Value) -> Arc<dyn SearchBackend> {
        from_options(
            "nominatim".into(),
            serde_json::json!({"url": url, "classes": classes}),
            &portal.env(),
        )
        .expect("backend")
    }

    #[test]
    fn parse_reads_string_coordinates() {
        let hits = parse_nominatim_response(NOMINATIM_RESPONSE).expect("parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].lon_lat, vec![10.0169, 53.5950]);
        assert_eq!(hits[0].class, "leisure");
    }

    #[tokio::test]
    async fn classification_filter_applies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NOMINATIM_RESPONSE))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        portal.input.set("stadtpark");
        let backend = backend(&portal, &server.uri(), serde_json::json!(["leisure"]));
        let results = backend.search("stadtpark").await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Stadtpark, Hamburg");
    }

    #[tokio::test]
    async fn second_call_within_throttle_is_skipped_when_input_moved_on() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        let backend = backend(&portal, &server.uri(), serde_json::json!([]));

        // First call fires immediately.
        portal.input.set("first");
        backend.search("first").await.expect("first search");

        // Under 1000 ms later the input has already moved on; the
        // deferred second query must be skipped entirely.
        portal.input.set("third");
        let err = backend.search("second").await.unwrap_err();
        assert!(err.is_cancellation());

        // Exactly one network call fired.
        let received = server.received_requests().await.expect("requests");
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn deferred_call_proceeds_when_input_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        let backend = backend(&portal, &server.uri(), serde_json::json!([]));

        portal.input.set("first");
        backend.search("first").await.expect("first search");

        // Still the current input at timer expiry: the deferred call runs.
        portal.input.set("second");
        backend.search("second").await.expect("second search");

        let received = server.received_requests().await.expect("requests");
        assert_eq!(received.len(), 2);
    }
}
