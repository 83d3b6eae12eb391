//! Federal geocoder backend (`bkg`).
//!
//! One GET per query against the geosearch endpoint; GeoJSON hits are
//! filtered by score threshold and transformed from the service EPSG
//! code into the viewport projection.

use crate::backend::{BackendCore, HttpMethod, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::collaborators::CoordinateTransform;
use crate::error::{Result, SearchError};
use crate::normalize::{self, normalize_result_events};
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_epsg() -> String {
    "EPSG:25832".into()
}

fn default_min_score() -> f64 {
    0.6
}

fn default_result_count() -> usize {
    20
}

fn default_category() -> String {
    "Address".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BkgOptions {
    url: String,
    #[serde(default = "default_epsg")]
    epsg: String,
    #[serde(default = "default_min_score")]
    min_score: f64,
    #[serde(default = "default_result_count")]
    result_count: usize,
    /// Extra service-side filter expression, passed through verbatim.
    #[serde(default)]
    filter: Option<String>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct BkgBackend {
    core: BackendCore,
    options: BkgOptions,
    icon: String,
    transform: Arc<dyn CoordinateTransform>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: BkgOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("bkg backend: {e}")))?;
    crate::http::validate_service_url(&options.url)?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[
            (Interaction::OnClick, &[ActionKind::SetMarker, ActionKind::ZoomToResult]),
            (Interaction::ButtonClick, &[ActionKind::StartRouting]),
        ]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(BkgBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
        transform: env.portal.transform.clone(),
    }))
}

impl BkgBackend {
    fn request_url(&self, input: &str) -> String {
        let mut url = format!(
            "{}?query={}&count={}&outputformat=json",
            self.options.url,
            urlencoding::encode(input),
            self.options.result_count
        );
        if let Some(filter) = &self.options.filter {
            url.push_str("&filter=");
            url.push_str(&urlencoding::encode(filter));
        }
        url
    }
}

struct BkgHit {
    name: String,
    kind: String,
    score: f64,
    coordinates: Vec<f64>,
}

fn parse_bkg_response(body: &str) -> Result<Vec<BkgHit>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("bkg response: {e}")))?;
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Parse("bkg response: no features array".into()))?;
    let hits = features
        .iter()
        .filter_map(|feature| {
            let coordinates: Vec<f64> = feature
                .pointer("/geometry/coordinates")?
                .as_array()?
                .iter()
                .filter_map(Value::as_f64)
                .collect();
            if coordinates.len() < 2 {
                return None;
            }
            Some(BkgHit {
                name: normalize::nested_text(feature, &["properties", "text"]),
                kind: normalize::nested_text(feature, &["properties", "typ"]),
                score: feature
                    .pointer("/properties/score")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                coordinates,
            })
        })
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchBackend for BkgBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "bkg"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        let outcome = self
            .core
            .request_search(&self.request_url(input), HttpMethod::Get, None)
            .await;
        let body = match outcome {
            RequestOutcome::Finished { body } => body,
            RequestOutcome::Failed { error } => return Err(SearchError::Http(error)),
            RequestOutcome::Aborted => return Err(SearchError::Cancelled),
        };
        let hits = match parse_bkg_response(&body) {
            Ok(hits) => hits,
            Err(err) => {
                self.core.mark_failed();
                return Err(err);
            }
        };

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.options.min_score)
            .take(self.options.result_count)
            .enumerate()
            .map(|(ordinal, hit)| {
                let coordinates = self.transform.to_view(&self.options.epsg, &hit.coordinates);
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
                    Action::ZoomToResult {
                        coordinates: coordinates.clone(),
                    },
                );
                possible.insert(
                    ActionKind::StartRouting,
                    Action::StartRouting {
                        coordinates,
                        name: hit.name.clone(),
                    },
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
                    additional_info: hit.kind,
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
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GEOSEARCH_RESPONSE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "geometry": {"type": "Point", "coordinates": [565874.7, 5934140.6]},
                "properties": {"text": "Mollerstraße 1", "typ": "Haus", "score": 1.42}
            },
            {
                "geometry": {"type": "Point", "coordinates": [565001.0, 5934002.0]},
                "properties": {"text": "Mollerweg", "typ": "Strasse", "score": 0.31}
            }
        ]
    }"#;

    fn backend(portal: &TestPortal, url: &str) -> Arc<dyn SearchBackend> {
        from_options(
            "bkg".into(),
            serde_json::json!({"url": url, "minScore": 0.5}),
            &portal.env(),
        )
        .expect("backend")
    }

    #[test]
    fn parse_extracts_name_score_and_coordinates() {
        let hits = parse_bkg_response(GEOSEARCH_RESPONSE).expect("parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Mollerstraße 1");
        assert_eq!(hits[0].kind, "Haus");
        assert!((hits[0].score - 1.42).abs() < f64::EPSILON);
        assert_eq!(hits[0].coordinates, vec![565874.7, 5934140.6]);
    }

    #[test]
    fn parse_rejects_non_geojson() {
        assert!(parse_bkg_response("<html></html>").is_err());
        assert!(parse_bkg_response("{\"unrelated\": true}").is_err());
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let portal = TestPortal::new();
        let err = from_options("bkg".into(), serde_json::json!({}), &portal.env()).err().unwrap();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[tokio::test]
    async fn search_filters_by_score_and_binds_configured_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geosearch"))
            .and(query_param("query", "mollerstraße"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GEOSEARCH_RESPONSE))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        let backend = backend(&portal, &format!("{}/geosearch", server.uri()));
        let results = backend.search("mollerstraße").await.expect("search");

        // The 0.31-score hit is below the 0.5 threshold.
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.name, "Mollerstraße 1");
        assert_eq!(result.additional_info, "Haus");
        assert_eq!(result.backend_id, "bkg");

        // Events are a subset of the configured lists, display fields present.
        let on_click: Vec<ActionKind> = result.events[&Interaction::OnClick]
            .iter()
            .map(Action::kind)
            .collect();
        assert_eq!(on_click, [ActionKind::SetMarker, ActionKind::ZoomToResult]);
        assert_eq!(
            result.events[&Interaction::ButtonClick][0].kind(),
            ActionKind::StartRouting
        );
        assert!(!result.tool_tip.is_empty());

        // Coordinates went through the transform with the configured EPSG.
        let calls = portal.transform.calls.lock().expect("lock");
        assert_eq!(calls[0].0, "EPSG:25832");
    }

    #[tokio::test]
    async fn failed_request_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        let backend = backend(&portal, &server.uri());
        let err = backend.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
        assert_eq!(backend.state(), crate::backend::BackendState::Failed);
    }
}
