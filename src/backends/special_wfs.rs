//! Filter-based WFS backend (`specialWfs`).
//!
//! Builds OGC Filter Encoding request bodies per configured search
//! definition, validates its filter-character settings before sending,
//! and reconstructs polygon/multipolygon hit geometry from the GML
//! response for highlighting.

use crate::backend::{BackendCore, HttpMethod, RequestBody, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::error::{Result, SearchError};
use crate::geometry::{self, HitGeometry};
use crate::normalize::normalize_result_events;
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use crate::wfs::filter::{config_has_errors, ogc_filter_snippet, ogc_is_in_snippet, wfs110_get_feature};
use crate::wfs::gml;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_geometry_name() -> String {
    "app:geom".into()
}

fn default_max_features() -> usize {
    20
}

/// Restrict a definition to features whose property is in a value set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Restriction {
    property_name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WfsSearchDefinition {
    /// Qualified feature type, e.g. `app:bebauungsplaene`.
    type_name: String,
    /// Qualified property names searched with the "contains" operator.
    property_names: Vec<String>,
    #[serde(default = "default_geometry_name")]
    geometry_name: String,
    /// Category label of this definition's hits.
    #[serde(default)]
    name: String,
    #[serde(default)]
    restriction: Option<Restriction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecialWfsOptions {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    wild_card: Option<String>,
    #[serde(default)]
    single_char: Option<String>,
    #[serde(default)]
    escape_char: Option<String>,
    #[serde(default = "default_max_features")]
    max_features: usize,
    #[serde(default)]
    definitions: Vec<WfsSearchDefinition>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct SpecialWfsBackend {
    core: BackendCore,
    url: String,
    wild_card: String,
    single_char: String,
    escape_char: String,
    max_features: usize,
    definitions: Vec<WfsSearchDefinition>,
    icon: String,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: SpecialWfsOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("specialWfs backend: {e}")))?;
    if config_has_errors(
        options.url.as_deref(),
        options.wild_card.as_deref(),
        options.single_char.as_deref(),
        options.escape_char.as_deref(),
    ) {
        return Err(SearchError::Config(
            "specialWfs backend: url and single-character wildCard/singleChar/escapeChar are required".into(),
        ));
    }
    if options.definitions.is_empty() {
        return Err(SearchError::Config(
            "specialWfs backend: at least one search definition is required".into(),
        ));
    }
    crate::http::validate_service_url(options.url.as_deref().unwrap_or_default())?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[(
            Interaction::OnClick,
            &[
                ActionKind::HighlightFeature,
                ActionKind::SetMarker,
                ActionKind::ZoomToResult,
            ],
        )]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(SpecialWfsBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        // Validated above.
        url: options.url.unwrap_or_default(),
        wild_card: options.wild_card.unwrap_or_default(),
        single_char: options.single_char.unwrap_or_default(),
        escape_char: options.escape_char.unwrap_or_default(),
        max_features: options.max_features,
        definitions: options.definitions,
        icon,
    }))
}

/// Filter body for one definition: a "contains" clause per property
/// (OR-combined), AND-combined with the definition's value restriction
/// when present.
fn build_filter(
    definition: &WfsSearchDefinition,
    input: &str,
    wild_card: &str,
    single_char: &str,
    escape_char: &str,
) -> String {
    let clauses: String = definition
        .property_names
        .iter()
        .map(|property| {
            ogc_filter_snippet(false, wild_card, single_char, escape_char, "", property, input)
        })
        .collect();
    let like_part = if definition.property_names.len() > 1 {
        format!("<ogc:Or>{clauses}</ogc:Or>")
    } else {
        clauses
    };
    match &definition.restriction {
        Some(restriction) => {
            let is_in = ogc_is_in_snippet(
                &restriction.values,
                wild_card,
                single_char,
                escape_char,
                "",
                &restriction.property_name,
            );
            format!("<ogc:And>{like_part}{is_in}</ogc:And>")
        }
        None => like_part,
    }
}

/// Local (unprefixed) part of a qualified name.
fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn parse_definition_hits(body: &str, definition: &WfsSearchDefinition) -> Vec<(String, HitGeometry)> {
    gml::elements(body, local_name(&definition.type_name))
        .into_iter()
        .filter_map(|member| {
            let name = definition
                .property_names
                .iter()
                .filter_map(|property| gml::first_element(member, local_name(property)))
                .map(gml::text)
                .find(|text| !text.is_empty())?;
            let hit = gml::parse_geometry(member)?;
            Some((name, hit))
        })
        .collect()
}

#[async_trait]
impl SearchBackend for SpecialWfsBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "specialWfs"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        let mut results: Vec<SearchResult> = Vec::new();
        for definition in &self.definitions {
            let filter = build_filter(
                definition,
                input,
                &self.wild_card,
                &self.single_char,
                &self.escape_char,
            );
            let body = wfs110_get_feature(
                &definition.type_name,
                &definition.property_names,
                &definition.geometry_name,
                &filter,
                self.max_features,
            );
            let outcome = self
                .core
                .request_search(&self.url, HttpMethod::Post, Some(RequestBody::Xml(body)))
                .await;
            let response = match outcome {
                RequestOutcome::Finished { body } => body,
                RequestOutcome::Failed { error } => return Err(SearchError::Http(error)),
                RequestOutcome::Aborted => return Err(SearchError::Cancelled),
            };

            for (name, hit) in parse_definition_hits(&response, definition) {
                let Some(reconstructed) = hit.reconstruct() else {
                    continue;
                };
                let Some(center) = geometry::interior_point(&reconstructed) else {
                    continue;
                };
                let mut possible = BTreeMap::new();
                possible.insert(
                    ActionKind::HighlightFeature,
                    Action::HighlightFeature { hit: hit.clone() },
                );
                possible.insert(
                    ActionKind::SetMarker,
                    Action::SetMarker {
                        coordinates: center.clone(),
                        feature: None,
                        layer_id: None,
                    },
                );
                possible.insert(
                    ActionKind::ZoomToResult,
                    Action::ZoomToResult {
                        coordinates: center,
                    },
                );
                let ordinal = results.len();
                results.push(SearchResult {
                    category: definition.name.clone(),
                    id: format!("{}-{ordinal}", self.core.id()),
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name: name.clone(),
                    tool_tip: name,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: definition.type_name.clone(),
                    events: normalize_result_events(self.core.events(), &possible),
                });
            }
        }

        self.core.record_results(&results);
        Ok(results)
    }
}
