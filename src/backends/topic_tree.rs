//! Topic-tree backend (`topicTree`).
//!
//! Local (`Client`-paging) search over the portal's own layer
//! configuration: a whitespace-stripped, case-insensitive regex match
//! across the flat layer collection and the nested folder tree, both
//! match sets merged. Entries requiring 3D rendering only appear while
//! the map is in 3D mode.

use crate::backend::{BackendCore, SearchBackend};
use crate::backends::{events_of, override_or, resolve_icon, BackendEnv};
use crate::collaborators::{Folder, LayerCatalog, LayerConfig, MapView};
use crate::error::{Result, SearchError};
use crate::normalize::normalize_result_events;
use crate::types::{Action, ActionKind, Interaction, SearchResult};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn default_topic_category() -> String {
    "Topic".into()
}

fn default_folder_category() -> String {
    "Folder".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicTreeOptions {
    #[serde(default = "default_topic_category")]
    topic_category: String,
    #[serde(default = "default_folder_category")]
    folder_category: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    events: Option<BTreeMap<Interaction, Vec<String>>>,
}

pub struct TopicTreeBackend {
    core: BackendCore,
    options: TopicTreeOptions,
    icon: String,
    layers: Arc<dyn LayerCatalog>,
    map: Arc<dyn MapView>,
}

pub fn from_options(
    id: String,
    options: Value,
    env: &BackendEnv,
) -> Result<Arc<dyn SearchBackend>> {
    let options: TopicTreeOptions = serde_json::from_value(options)
        .map_err(|e| SearchError::Config(format!("topicTree backend: {e}")))?;
    let events = override_or(
        options.events.as_ref(),
        events_of(&[
            (
                Interaction::OnClick,
                &[ActionKind::ActivateLayerInTopicTree, ActionKind::ShowInTree],
            ),
            (Interaction::ButtonClick, &[ActionKind::ShowLayerInfo]),
        ]),
    );
    let icon = resolve_icon(options.icon.clone(), &events, &env.hit_icons);
    Ok(Arc::new(TopicTreeBackend {
        core: BackendCore::local(id, events),
        options,
        icon,
        layers: env.portal.layers.clone(),
        map: env.portal.map.clone(),
    }))
}

/// Whitespace-stripped, case-insensitive pattern. The input is used as
/// a regular expression verbatim; an invalid pattern falls back to a
/// literal-escaped match instead of erroring the query.
fn pattern_for(input: &str) -> Regex {
    let stripped: String = input.split_whitespace().collect();
    match RegexBuilder::new(&stripped).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(_) => RegexBuilder::new(&regex::escape(&stripped))
            .case_insensitive(true)
            .build()
            // An escaped literal always compiles.
            .unwrap_or_else(|_| Regex::new("$^").expect("constant pattern")),
    }
}

impl TopicTreeBackend {
    fn layer_result(&self, layer: &LayerConfig) -> SearchResult {
        let mut possible = BTreeMap::new();
        possible.insert(
            ActionKind::ActivateLayerInTopicTree,
            Action::ActivateLayerInTopicTree {
                layer_id: layer.id.clone(),
                source: (!layer.source.is_empty()).then(|| layer.source.clone()),
            },
        );
        possible.insert(
            ActionKind::ShowInTree,
            Action::ShowInTree {
                layer_id: layer.id.clone(),
            },
        );
        possible.insert(
            ActionKind::ShowLayerInfo,
            Action::ShowLayerInfo {
                layer_id: layer.id.clone(),
            },
        );
        SearchResult {
            category: self.options.topic_category.clone(),
            id: layer.id.clone(),
            backend_id: self.core.id().to_string(),
            index: 0,
            name: layer.name.clone(),
            tool_tip: layer.name.clone(),
            icon: self.icon.clone(),
            image_path: String::new(),
            additional_info: String::new(),
            events: normalize_result_events(self.core.events(), &possible),
        }
    }

    fn folder_result(&self, folder: &Folder) -> SearchResult {
        let mut possible = BTreeMap::new();
        possible.insert(
            ActionKind::ShowInTree,
            Action::ShowInTree {
                layer_id: folder.id.clone(),
            },
        );
        SearchResult {
            category: self.options.folder_category.clone(),
            id: folder.id.clone(),
            backend_id: self.core.id().to_string(),
            index: 0,
            name: folder.name.clone(),
            tool_tip: folder.name.clone(),
            icon: self.icon.clone(),
            image_path: String::new(),
            additional_info: String::new(),
            events: normalize_result_events(self.core.events(), &possible),
        }
    }

    fn collect_folder(
        &self,
        node: &Folder,
        pattern: &Regex,
        three_d: bool,
        seen: &mut BTreeSet<String>,
        results: &mut Vec<SearchResult>,
    ) {
        for layer in &node.layers {
            if layer.requires_3d && !three_d {
                continue;
            }
            if pattern.is_match(&layer.name) && seen.insert(layer.id.clone()) {
                results.push(self.layer_result(layer));
            }
        }
        for child in &node.folders {
            if pattern.is_match(&child.name) && seen.insert(format!("folder:{}", child.id)) {
                results.push(self.folder_result(child));
            }
            self.collect_folder(child, pattern, three_d, seen, results);
        }
    }
}

#[async_trait]
impl SearchBackend for TopicTreeBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn backend_type(&self) -> &'static str {
        "topicTree"
    }

    async fn search(&self, input: &str) -> Result<Vec<SearchResult>> {
        self.core.begin_search();
        let pattern = pattern_for(input);
        let three_d = self.map.is_3d();

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut results: Vec<SearchResult> = Vec::new();
        for layer in self.layers.layers() {
            if layer.requires_3d && !three_d {
                continue;
            }
            if pattern.is_match(&layer.name) && seen.insert(layer.id.clone()) {
                results.push(self.layer_result(&layer));
            }
        }
        self.collect_folder(
            &self.layers.folder_tree(),
            &pattern,
            three_d,
            &mut seen,
            &mut results,
        );

        self.core.record_results(&results);
        self.core.finish_local();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPortal;
    use std::sync::atomic::Ordering;

    fn layer(id: &str, name: &str, requires_3d: bool) -> LayerConfig {
        LayerConfig {
            id: id.into(),
            name: name.into(),
            source: String::new(),
            visibility: false,
            show_in_layer_tree: false,
            stacking_index: None,
            requires_3d,
        }
    }

    fn backend(portal: &TestPortal) -> Arc<dyn SearchBackend> {
        from_options("topicTree".into(), serde_json::json!({}), &portal.env()).expect("backend")
    }

    fn seeded_portal() -> TestPortal {
        let portal = TestPortal::new();
        *portal.layers.layers.lock().expect("lock") = vec![
            layer("100", "Stadtplan", false),
            layer("200", "Gebäude 3D", true),
            layer("300", "Krankenhäuser", false),
        ];
        *portal.layers.tree.lock().expect("lock") = Folder {
            id: "root".into(),
            name: "Themen".into(),
            folders: vec![Folder {
                id: "f-plan".into(),
                name: "Stadtplanung".into(),
                folders: vec![],
                layers: vec![layer("100", "Stadtplan", false)],
            }],
            layers: vec![],
        };
        portal
    }

    #[tokio::test]
    async fn matches_are_merged_from_flat_collection_and_folder_tree() {
        let portal = seeded_portal();
        let results = backend(&portal).search("stadt plan").await.expect("search");

        // Whitespace-stripped pattern: "stadtplan" matches the layer
        // (deduplicated between flat list and tree) and the folder.
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Stadtplan", "Stadtplanung"]);
        assert_eq!(results[0].category, "Topic");
        assert_eq!(results[1].category, "Folder");
    }

    #[tokio::test]
    async fn three_d_entries_hidden_unless_map_is_3d() {
        let portal = seeded_portal();
        let backend = backend(&portal);

        let results = backend.search("gebäude").await.expect("search");
        assert!(results.is_empty());

        portal.map.three_d.store(true, Ordering::SeqCst);
        let results = backend.search("gebäude").await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Gebäude 3D");
    }

    #[tokio::test]
    async fn input_works_as_regular_expression() {
        let portal = seeded_portal();
        let results = backend(&portal)
            .search("kranken.*user")
            .await
            .expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Krankenhäuser");
    }

    #[tokio::test]
    async fn invalid_pattern_falls_back_to_literal_match() {
        let portal = seeded_portal();
        *portal.layers.layers.lock().expect("lock") =
            vec![layer("400", "Plan(Entwurf)", false)];
        let results = backend(&portal).search("plan(ent").await.expect("search");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn layer_hits_bind_activate_and_tree_actions() {
        let portal = seeded_portal();
        let results = backend(&portal).search("krankenhäuser").await.expect("search");
        let kinds: Vec<ActionKind> = results[0].events[&Interaction::OnClick]
            .iter()
            .map(Action::kind)
            .collect();
        assert_eq!(
            kinds,
            [ActionKind::ActivateLayerInTopicTree, ActionKind::ShowInTree]
        );
    }
}
