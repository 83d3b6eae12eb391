//! WFS gazetteer backend (`gazetteer`).
//!
//! Issues WFS 2.0 stored queries and parses the GML member elements of
//! the response namespace-agnostically. Polygonal hits (districts)
//! additionally bind a highlight action.

use crate::backend::{BackendCore, HttpMethod, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::collaborators::CoordinateTransform;
use crate::error::{Result, SearchError};
use crate::geometry::{self, GeometryKind, HitGeometry};
use crate::normalize::normalize_result_events;
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use crate::wfs::gml;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_stored_query() -> String {
    "findeStrasse".into()
}

fn default_search_attribute() -> String {
    "strassenname".into()
}

fn default_epsg() -> String {
    "EPSG:25832".into()
}

fn default_category() -> String {
    "Street".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GazetteerOptions {
    url: String,
    #[serde(default = "default_stored_query")]
    stored_query: String,
    /// Query parameter name, also the member element carrying the
    /// display name.
    #[serde(default = "default_search_attribute")]
    search_attribute: String,
    #[serde(default = "default_epsg")]
    epsg: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct GazetteerBackend {
    core: BackendCore,
    options: GazetteerOptions,
    icon: String,
    transform: Arc<dyn CoordinateTransform>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: GazetteerOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("gazetteer backend: {e}")))?;
    crate::http::validate_service_url(&options.url)?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[(
            Interaction::OnClick,
            &[
                ActionKind::SetMarker,
                ActionKind::ZoomToResult,
                ActionKind::HighlightFeature,
            ],
        )]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(GazetteerBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
        transform: env.portal.transform.clone(),
    }))
}

impl GazetteerBackend {
    fn request_url(&self, input: &str) -> String {
        format!(
            "{}?service=WFS&request=GetFeature&version=2.0.0&StoredQuery_ID={}&{}={}",
            self.options.url,
            self.options.stored_query,
            self.options.search_attribute,
            urlencoding::encode(input)
        )
    }
}

/// Member elements with their display name and parsed geometry.
fn parse_gazetteer_response(body: &str, search_attribute: &str) -> Vec<(String, HitGeometry)> {
    gml::elements(body, "member")
        .into_iter()
        .filter_map(|member| {
            let name = gml::text(gml::first_element(member, search_attribute)?);
            if name.is_empty() {
                return None;
            }
            let hit = gml::parse_geometry(member)?;
            Some((name, hit))
        })
        .collect()
}

#[async_trait]
impl SearchBackend for GazetteerBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "gazetteer"
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

        let hits = parse_gazetteer_response(&body, &self.options.search_attribute);
        let results: Vec<SearchResult> = hits
            .into_iter()
            .enumerate()
            .filter_map(|(ordinal, (name, hit))| {
                let reconstructed = hit.reconstruct()?;
                let center = geometry::interior_point(&reconstructed)?;
                let coordinates = self.transform.to_view(&self.options.epsg, &center);

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
                if matches!(hit.kind, GeometryKind::Polygon | GeometryKind::MultiPolygon) {
                    possible.insert(
                        ActionKind::HighlightFeature,
                        Action::HighlightFeature { hit: hit.clone() },
                    );
                }
                possible.insert(
                    ActionKind::StartRouting,
                    Action::StartRouting {
                        coordinates,
                        name: name.clone(),
                    },
                );
                Some(SearchResult {
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
                })
            })
            .collect();

        self.core.record_results(&results);
        Ok(results)
    }
}
