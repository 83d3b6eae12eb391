//! The action dispatcher: the closed catalog of result interactions.
//!
//! Backends bind [`Action`] payloads onto their results without knowing
//! who consumes them; the dispatcher executes any bound action against
//! the portal collaborators. Every handler degrades gracefully on
//! missing optional payload fields — user interaction must never panic
//! the portal.

use crate::collaborators::{
    AlertSink, Feature, FeatureInfoSink, HighlightStyle, LayerCatalog, LayerConfig, Localizer,
    MapView, MenuControl, Panel, StyleCatalog,
};
use crate::geometry::{Geometry, HitGeometry};
use crate::types::{Action, Interaction, SearchResult};
use std::sync::Arc;

/// Collaborators the dispatcher acts through.
#[derive(Clone)]
pub struct DispatcherContext {
    pub map: Arc<dyn MapView>,
    pub layers: Arc<dyn LayerCatalog>,
    pub styles: Arc<dyn StyleCatalog>,
    pub alerts: Arc<dyn AlertSink>,
    pub menu: Arc<dyn MenuControl>,
    pub feature_info: Arc<dyn FeatureInfoSink>,
    pub localizer: Arc<dyn Localizer>,
}

/// Executes the named side effects bound to search results.
pub struct ActionDispatcher {
    context: DispatcherContext,
    zoom_level: u32,
}

impl ActionDispatcher {
    pub fn new(context: DispatcherContext, zoom_level: u32) -> Self {
        Self {
            context,
            zoom_level,
        }
    }

    /// Run every action a result binds for the interaction, in
    /// configured order. An interaction without bindings is a no-op.
    pub fn dispatch(&self, result: &SearchResult, interaction: Interaction) {
        let Some(actions) = result.events.get(&interaction) else {
            return;
        };
        for action in actions {
            self.run(action);
        }
    }

    /// Execute one action of the catalog.
    pub fn run(&self, action: &Action) {
        tracing::trace!(action = %action.kind(), "dispatching action");
        match action {
            Action::SetMarker {
                coordinates,
                feature,
                layer_id,
            } => self.set_marker(coordinates, feature.as_ref(), layer_id.as_deref()),
            Action::ZoomToResult { coordinates } => self.zoom_to_result(coordinates),
            Action::ActivateLayerInTopicTree { layer_id, source } => {
                self.activate_layer_in_topic_tree(layer_id, source.as_deref())
            }
            Action::AddLayerToTopicTree {
                layer_id,
                source,
                show_in_layer_tree,
                visibility,
            } => self.add_layer_to_topic_tree(layer_id, source, *show_in_layer_tree, *visibility),
            Action::HighlightFeature { hit } => self.highlight_feature(hit),
            Action::OpenGetFeatureInfo { feature, layer_id } => {
                self.open_get_feature_info(feature, layer_id)
            }
            Action::ShowInTree { layer_id } => self.show_in_tree(layer_id),
            Action::ShowLayerInfo { layer_id } => self.show_layer_info(layer_id),
            Action::StartRouting { coordinates, name } => self.start_routing(coordinates, name),
        }
    }

    fn set_marker(&self, coordinates: &[f64], feature: Option<&Feature>, layer_id: Option<&str>) {
        if let Some(feature) = feature {
            if matches!(feature.geometry, Geometry::MultiPolygon(_)) {
                let style = layer_id
                    .and_then(|id| self.context.styles.style_by_id(id))
                    .unwrap_or_default();
                self.context.map.highlight(&feature.geometry, &style);
            }
        }
        if coordinates.len() < 2 {
            tracing::debug!("marker payload without coordinates ignored");
            return;
        }
        self.context.map.place_marker(coordinates);
    }

    fn zoom_to_result(&self, coordinates: &[f64]) {
        if coordinates.len() < 2 {
            tracing::debug!("zoom payload without coordinates ignored");
            return;
        }
        self.context.map.zoom_to(coordinates, self.zoom_level);
    }

    fn activate_layer_in_topic_tree(&self, layer_id: &str, source: Option<&str>) {
        match self.context.layers.layer_by_id(layer_id) {
            Some(mut layer) => {
                if !layer.show_in_layer_tree {
                    // A fresh stacking index only on first showing.
                    layer.stacking_index = Some(self.context.layers.next_stacking_index());
                    layer.show_in_layer_tree = true;
                }
                layer.visibility = true;
                self.context.layers.replace_layer(layer);
            }
            None => self.add_layer_to_topic_tree(layer_id, source.unwrap_or(""), true, true),
        }
    }

    fn add_layer_to_topic_tree(
        &self,
        layer_id: &str,
        source: &str,
        show_in_layer_tree: bool,
        visibility: bool,
    ) {
        if self.context.layers.layer_by_id(layer_id).is_some() {
            // Already present: converge through activation.
            self.activate_layer_in_topic_tree(layer_id, Some(source));
            return;
        }
        let mut layer = self
            .context
            .layers
            .raw_layer_by_id(layer_id)
            .unwrap_or_else(|| LayerConfig {
                id: layer_id.to_string(),
                name: layer_id.to_string(),
                source: String::new(),
                visibility: false,
                show_in_layer_tree: false,
                stacking_index: None,
                requires_3d: false,
            });
        if !source.is_empty() {
            layer.source = source.to_string();
        }
        layer.show_in_layer_tree = show_in_layer_tree;
        layer.visibility = visibility;
        layer.stacking_index = Some(self.context.layers.next_stacking_index());
        if !self.context.layers.insert_layer(layer) {
            let message = self
                .context
                .localizer
                .translate("common:search.layerInsertionFailed");
            self.context.alerts.error(&format!("{message}: {layer_id}"));
        }
    }

    fn highlight_feature(&self, hit: &HitGeometry) {
        let Some(geometry) = hit.reconstruct() else {
            tracing::debug!("highlight payload with degenerate geometry ignored");
            return;
        };
        self.context
            .map
            .highlight(&geometry, &HighlightStyle::default());
    }

    fn open_get_feature_info(&self, feature: &Feature, layer_id: &str) {
        self.context.feature_info.show_feature(feature, layer_id);
    }

    /// Current configuration first, then the static raw catalog — a
    /// raw-only layer is materialized hidden into the configuration.
    fn resolve_layer(&self, layer_id: &str) -> Option<LayerConfig> {
        if let Some(layer) = self.context.layers.layer_by_id(layer_id) {
            return Some(layer);
        }
        let mut raw = self.context.layers.raw_layer_by_id(layer_id)?;
        raw.visibility = false;
        raw.show_in_layer_tree = false;
        self.context.layers.insert_layer(raw.clone());
        Some(raw)
    }

    fn warn_layer_missing(&self, layer_id: &str) {
        let message = self
            .context
            .localizer
            .translate("common:search.layerNotFound");
        self.context.alerts.warn(&format!("{message}: {layer_id}"));
    }

    fn show_in_tree(&self, layer_id: &str) {
        match self.resolve_layer(layer_id) {
            Some(_) => self.context.menu.switch_panel(Panel::TopicTree),
            None => self.warn_layer_missing(layer_id),
        }
    }

    fn show_layer_info(&self, layer_id: &str) {
        match self.resolve_layer(layer_id) {
            Some(layer) => {
                tracing::debug!(layer = %layer.name, "showing layer info");
                self.context.menu.switch_panel(Panel::LayerInfo);
            }
            None => self.warn_layer_missing(layer_id),
        }
    }

    fn start_routing(&self, coordinates: &[f64], name: &str) {
        self.context.menu.switch_panel(Panel::Routing);
        if !self.context.menu.is_side_panel_expanded() {
            self.context.menu.expand_side_panel();
        }
        if coordinates.len() >= 2 {
            self.context.menu.seed_routing_waypoint(coordinates, name);
        }
    }
}
