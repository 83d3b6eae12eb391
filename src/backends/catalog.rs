//! Metadata-catalog layer lookup backend (`catalog`).
//!
//! Queries an external catalog service for layer records matching the
//! input; hits bind add-layer and layer-info actions so a found dataset
//! can be pulled into the topic tree.

use crate::backend::{BackendCore, HttpMethod, RequestOutcome, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::error::{Result, SearchError};
use crate::normalize::{self, normalize_result_events};
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_result_count() -> usize {
    20
}

fn default_category() -> String {
    "Layer".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogOptions {
    url: String,
    #[serde(default = "default_result_count")]
    result_count: usize,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct CatalogBackend {
    core: BackendCore,
    options: CatalogOptions,
    icon: String,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: CatalogOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("catalog backend: {e}")))?;
    crate::http::validate_service_url(&options.url)?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[
            (Interaction::OnClick, &[ActionKind::AddLayerToTopicTree]),
            (Interaction::ButtonClick, &[ActionKind::ShowLayerInfo]),
        ]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(CatalogBackend {
        core: BackendCore::remote(id, events, env.client.clone()),
        options,
        icon,
    }))
}

struct CatalogRecord {
    id: String,
    name: String,
    source: String,
    abstract_text: String,
}

fn parse_catalog_response(body: &str) -> Result<Vec<CatalogRecord>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("catalog response: {e}")))?;
    let records = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Parse("catalog response: no results array".into()))?;
    let records = records
        .iter()
        .filter_map(|record| {
            let id = normalize::text(record, "id");
            let name = normalize::text(record, "name");
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(CatalogRecord {
                id,
                name,
                source: normalize::text(record, "source"),
                abstract_text: normalize::text(record, "abstract"),
            })
        })
        .collect();
    Ok(records)
}

#[async_trait]
impl SearchBackend for CatalogBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "catalog"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        let url = format!(
            "{}?searchString={}",
            self.options.url,
            urlencoding::encode(input)
        );
        let outcome = self.core.request_search(&url, HttpMethod::Get, None).await;
        let body = match outcome {
            RequestOutcome::Finished { body } => body,
            RequestOutcome::Failed { error } => return Err(SearchError::Http(error)),
            RequestOutcome::Aborted => return Err(SearchError::Cancelled),
        };
        let records = match parse_catalog_response(&body) {
            Ok(records) => records,
            Err(err) => {
                self.core.mark_failed();
                return Err(err);
            }
        };

        let results: Vec<SearchResult> = records
            .into_iter()
            .take(self.options.result_count)
            .map(|record| {
                let mut possible = BTreeMap::new();
                possible.insert(
                    ActionKind::AddLayerToTopicTree,
                    Action::AddLayerToTopicTree {
                        layer_id: record.id.clone(),
                        source: record.source.clone(),
                        show_in_layer_tree: true,
                        visibility: true,
                    },
                );
                possible.insert(
                    ActionKind::ShowLayerInfo,
                    Action::ShowLayerInfo {
                        layer_id: record.id.clone(),
                    },
                );
                SearchResult {
                    category: self.options.category.clone(),
                    id: record.id,
                    backend_id: self.core.id().to_string(),
                    index: 0,
                    name: record.name.clone(),
                    tool_tip: record.name,
                    icon: self.icon.clone(),
                    image_path: String::new(),
                    additional_info: record.abstract_text,
                    events: normalize_result_events(self.core.events(), &possible),
                }
            })
            .collect();

        self.core.record_results(&results);
        Ok(results)
    }
}
