//! Photon geocoder backend (`photon`).
//!
//! GeoJSON hits arrive in WGS84; display names are composed from the
//! address parts present on each hit, missing parts simply omitted.

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

fn default_lang() -> String {
    "en".into()
}

fn default_result_count() -> usize {
    10
}

fn default_category() -> String {
    "Address".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotonOptions {
    url: String,
    #[serde(default = "default_lang")]
    lang: String,
    #[serde(default = "default_result_count")]
    result_count: usize,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct PhotonBackend {
    core: BackendCore,
    options: PhotonOptions,
    icon: String,
    transform: Arc<dyn CoordinateTransform>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: PhotonOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("photon backend: {e}")))?;
    crate::http::validate_service_url(&options.url)?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[
            (Interaction::OnClick, &[ActionKind::SetMarker, ActionKind::ZoomToResult]),
            (Interaction::ButtonClick, &[ActionKind::StartRouting]),
        ]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(PhotonBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
        transform: env.portal.transform.clone(),
    }))
}

impl PhotonBackend {
    fn request_url(&self, input: &str) -> String {
        format!(
            "{}/api/?q={}&lang={}&limit={}",
            self.options.url.trim_end_matches('/'),
            urlencoding::encode(input),
            self.options.lang,
            self.options.result_count
        )
    }
}

/// Compose a display name from the address parts a hit actually has.
fn display_name(properties: &Value) -> String {
    let name = normalize::text(properties, "name");
    let street = normalize::text(properties, "street");
    let house_number = normalize::text(properties, "housenumber");
    let postcode = normalize::text(properties, "postcode");
    let city = normalize::text(properties, "city");

    let mut parts: Vec<String> = Vec::new();
    if !name.is_empty() {
        parts.push(name);
    }
    let street_line = match (street.is_empty(), house_number.is_empty()) {
        (false, false) => format!("{street} {house_number}"),
        (false, true) => street,
        _ => String::new(),
    };
    if !street_line.is_empty() {
        parts.push(street_line);
    }
    let place_line = match (postcode.is_empty(), city.is_empty()) {
        (false, false) => format!("{postcode} {city}"),
        (true, false) => city,
        (false, true) => postcode,
        _ => String::new(),
    };
    if !place_line.is_empty() {
        parts.push(place_line);
    }
    parts.join(", ")
}

fn parse_photon_response(body: &str) -> Result<Vec<(String, Vec<f64>)>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("photon response: {e}")))?;
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Parse("photon response: no features array".into()))?;
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
            let name = display_name(feature.get("properties")?);
            if name.is_empty() {
                return None;
            }
            Some((name, coordinates))
        })
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchBackend for PhotonBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "photon"
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
        let hits = match parse_photon_response(&body) {
            Ok(hits) => hits,
            Err(err) => {
                self.core.mark_failed();
                return Err(err);
            }
        };

        let results: Vec<SearchResult> = hits
            .into_iter()
            .take(self.options.result_count)
            .enumerate()
            .map(|(ordinal, (name, lon_lat))| {
                let coordinates = self.transform.to_view("EPSG:4326", &lon_lat);
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
                        name: name.clone(),
                    },
                );
                SearchResult {
                    category: self.options.category.clone(),
                    id: format!("{}-{ordinal}", self.core.id()),
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name: name.clone(),
                    tool_tip: name,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: String::new(),
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

    #[test]
    fn display_name_composes_present_parts() {
        let properties = serde_json::json!({
            "name": "Elbphilharmonie",
            "street": "Platz der Deutschen Einheit",
            "housenumber": "1",
            "postcode": "20457",
            "city": "Hamburg"
        });
        assert_eq!(
            display_name(&properties),
            "Elbphilharmonie, Platz der Deutschen Einheit 1, 20457 Hamburg"
        );
    }

    #[test]
    fn display_name_omits_missing_parts() {
        let properties = serde_json::json!({"city": "Hamburg"});
        assert_eq!(display_name(&properties), "Hamburg");
        let properties = serde_json::json!({"street": "Mollerstraße"});
        assert_eq!(display_name(&properties), "Mollerstraße");
        assert_eq!(display_name(&serde_json::json!({})), "");
    }

    #[test]
    fn parse_skips_hits_without_coordinates_or_name() {
        let body = r#"{"features": [
            {"geometry": {"coordinates": [9.98, 53.54]}, "properties": {"name": "Ok"}},
            {"geometry": {"coordinates": []}, "properties": {"name": "No coords"}},
            {"geometry": {"coordinates": [1.0, 2.0]}, "properties": {}}
        ]}"#;
        let hits = parse_photon_response(body).expect("parse");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "Ok");
    }

    #[tokio::test]
    async fn search_transforms_from_wgs84() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .and(query_param("q", "elbphilharmonie"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"features": [{"geometry": {"coordinates": [9.9841, 53.5413]},
                     "properties": {"name": "Elbphilharmonie", "city": "Hamburg"}}]}"#,
            ))
            .mount(&server)
            .await;

        let portal = TestPortal::new();
        let backend = from_options(
            "photon".into(),
            serde_json::json!({"url": server.uri()}),
            &portal.env(),
        )
        .expect("backend");

        let results = backend.search("elbphilharmonie").await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Elbphilharmonie, Hamburg");

        let calls = portal.transform.calls.lock().expect("lock");
        assert_eq!(calls[0].0, "EPSG:4326");
        assert_eq!(calls[0].1, vec![9.9841, 53.5413]);
    }
}
