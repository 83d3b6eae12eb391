//! Visible-vector backend (`visibleVector`).
//!
//! Local (`Client`-paging) search over features already rendered on the
//! map. Only currently-visible vector layers configured with a search
//! field participate; cluster-wrapped sources are unwrapped to their
//! underlying features. Marker coordinates come from the interior-point
//! sampler, so concave polygons still get a usable position.

use crate::backend::{BackendCore, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::collaborators::MapView;
use crate::error::{Result, SearchError};
use crate::geometry;
use crate::normalize::normalize_result_events;
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisibleVectorOptions {
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct VisibleVectorBackend {
    core: BackendCore,
    icon: String,
    map: Arc<dyn MapView>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: VisibleVectorOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("visibleVector backend: {e}")))?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[(
            Interaction::OnClick,
            &[
                ActionKind::SetMarker,
                ActionKind::ZoomToResult,
                ActionKind::OpenGetFeatureInfo,
            ],
        )]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(VisibleVectorBackend {
        core: BackendCore::local(id, events),
        icon,
        map: env.portal.map.clone(),
    }))
}

#[async_trait]
impl SearchBackend for VisibleVectorBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "visibleVector"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        self.core.begin_search();
        let needle = input.to_lowercase();

        let mut results: Vec<SearchResult> = Vec::new();
        for layer in self.map.visible_vector_layers() {
            if layer.search_field.is_empty() {
                continue;
            }
            for feature in layer.source.features() {
                let value = feature.text_property(&layer.search_field);
                if value.is_empty() || !value.to_lowercase().contains(&needle) {
                    continue;
                }
                let Some(coordinates) = geometry::interior_point(&feature.geometry) else {
                    continue;
                };

                let mut possible = BTreeMap::new();
                possible.insert(
                    ActionKind::SetMarker,
                    Action::SetMarker {
                        coordinates: coordinates.clone(),
                        feature: Some(feature.clone()),
                        layer_id: Some(layer.id.clone()),
                    },
                );
                possible.insert(
                    ActionKind::ZoomToResult,
                    Action::ZoomToResult {
                        coordinates: coordinates.clone(),
                    },
                );
                possible.insert(
                    ActionKind::OpenGetFeatureInfo,
                    Action::OpenGetFeatureInfo {
                        feature: feature.clone(),
                        layer_id: layer.id.clone(),
                    },
                );
                results.push(SearchResult {
                    category: layer.name.clone(),
                    id: format!("{}-{}", layer.id, feature.id),
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name: value.clone(),
                    tool_tip: value,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: String::new(),
                    events: normalize_result_events(self.core.events(), &possible),
                });
            }
        }

        self.core.record_results(&results);
        self.core.finish_local();
        Ok(results)
    }
}
