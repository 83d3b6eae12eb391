//! Full-text index backend (`elastic`).
//!
//! POSTs a configured JSON payload template with the query injected at
//! a configurable attribute path, and reads hits from a configurable
//! response entry path. Hits are layer records; their actions activate
//! the layer in the topic tree.

use crate::backend::{BackendCore, HttpMethod, RequestBody, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::error::{Result, SearchError};
use crate::normalize::{normalize_result_events, path_text};
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_search_string_attribute() -> String {
    "query.bool.must.query_string.query".into()
}

fn default_response_entry_path() -> String {
    "hits.hits".into()
}

fn default_name_path() -> String {
    "_source.name".into()
}

fn default_id_path() -> String {
    "_source.id".into()
}

fn default_category() -> String {
    "Topic".into()
}

fn default_result_count() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HitMap {
    #[serde(default = "default_name_path")]
    name: String,
    #[serde(default = "default_id_path")]
    id: String,
    #[serde(default)]
    tool_tip: Option<String>,
}

impl Default for HitMap {
    fn default() -> Self {
        Self {
            name: default_name_path(),
            id: default_id_path(),
            tool_tip: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElasticOptions {
    url: String,
    /// Request payload template; the query string is injected at
    /// `search_string_attribute` before each call.
    payload: Value,
    #[serde(default = "default_search_string_attribute")]
    search_string_attribute: String,
    #[serde(default = "default_response_entry_path")]
    response_entry_path: String,
    #[serde(default)]
    hit_map: HitMap,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default = "default_result_count")]
    result_count: usize,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct ElasticBackend {
    core: BackendCore,
    options: ElasticOptions,
    icon: String,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: ElasticOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("elastic backend: {e}")))?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[
            (Interaction::OnClick, &[ActionKind::ActivateLayerInTopicTree]),
            (Interaction::ButtonClick, &[ActionKind::ShowLayerInfo]),
        ]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(ElasticBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
    }))
}

/// Inject the query string at a dot-separated path, creating missing
/// intermediate objects.
fn append_search_string(payload: &mut Value, attribute_path: &str, query: &str) {
    let mut current = payload;
    let segments: Vec<&str> = attribute_path.split('.').collect();
    let Some((last, init)) = segments.split_last() else {
        return;
    };
    for segment in init {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = match current {
            Value::Object(object) => object
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            _ => return,
        };
    }
    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(object) = current {
        object.insert(last.to_string(), Value::String(query.to_string()));
    }
}

/// The hit array at a dot-separated response path.
fn entries_at<'v>(value: &'v Value, path: &str) -> Option<&'v Vec<Value>> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    current.as_array()
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "elastic"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        let mut payload = self.options.payload.clone();
        append_search_string(&mut payload, &self.options.search_string_attribute, input);

        let outcome = self
            .core
            .request_search(
                &self.options.url,
                HttpMethod::Post,
                Some(RequestBody::Json(payload)),
            )
            .await;
        let body = match outcome {
            RequestOutcome::Finished { body } => body,
            RequestOutcome::Failed { error } => return Err(SearchError::Http(error)),
            RequestOutcome::Aborted => return Err(SearchError::Cancelled),
        };
        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                self.core.mark_failed();
                return Err(SearchError::Parse(format!("elastic response: {e}")));
            }
        };
        let Some(entries) = entries_at(&value, &self.options.response_entry_path) else {
            self.core.mark_failed();
            return Err(SearchError::Parse(format!(
                "elastic response: nothing at {}",
                self.options.response_entry_path
            )));
        };

        let results: Vec<SearchResult> = entries
            .iter()
            .filter_map(|hit| {
                let name = path_text(hit, &self.options.hit_map.name);
                let layer_id = path_text(hit, &self.options.hit_map.id);
                if name.is_empty() || layer_id.is_empty() {
                    return None;
                }
                let tool_tip = self
                    .options
                    .hit_map
                    .tool_tip
                    .as_ref()
                    .map(|p| path_text(hit, p))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| name.clone());

                let mut possible = BTreeMap::new();
                possible.insert(
                    ActionKind::ActivateLayerInTopicTree,
                    Action::ActivateLayerInTopicTree {
                        layer_id: layer_id.clone(),
                        source: None,
                    },
                );
                possible.insert(
                    ActionKind::ShowLayerInfo,
                    Action::ShowLayerInfo {
                        layer_id: layer_id.clone(),
                    },
                );
                Some(SearchResult {
                    category: self.options.category.clone(),
                    id: layer_id,
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name,
                    tool_tip,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: String::new(),
                    events: normalize_result_events(self.core.events(), &possible),
                })
            })
            .take(self.options.result_count)
            .collect();

        self.core.record_results(&results);
        Ok(results)
    }
}
