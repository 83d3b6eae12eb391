//! Trait seams for the geoportal subsystems the search engine consumes.
//!
//! The engine never touches the map, the layer configuration, or the UI
//! directly. Every effect goes through one of these traits, injected at
//! construction time. This keeps the federation core testable and keeps
//! shared application state behind accessor calls — backends and the
//! orchestrator read it, only the named dispatcher actions mutate it.

use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A vector feature as rendered on the map or decoded from a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub geometry: Geometry,
}

impl Feature {
    /// String value of a property, empty when missing or non-textual.
    pub fn text_property(&self, key: &str) -> String {
        match self.properties.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// One entry of the layer configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub id: String,
    pub name: String,
    /// Owning service or dataset reference.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub visibility: bool,
    #[serde(default)]
    pub show_in_layer_tree: bool,
    /// Position in the layer stack; assigned when first shown.
    #[serde(default)]
    pub stacking_index: Option<i64>,
    /// Entry only renders in 3D mode.
    #[serde(default)]
    pub requires_3d: bool,
}

/// A node of the nested topic-tree folder structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// A vector source as seen by the visible-vector backend. Cluster
/// sources wrap their underlying source; searching always happens on
/// the unwrapped features.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorSourceView {
    Plain { features: Vec<Feature> },
    Clustered { inner: Box<VectorSourceView> },
}

impl VectorSourceView {
    /// The underlying features, unwrapping any cluster nesting.
    pub fn features(&self) -> &[Feature] {
        match self {
            VectorSourceView::Plain { features } => features,
            VectorSourceView::Clustered { inner } => inner.features(),
        }
    }
}

/// A currently-visible vector layer eligible for local search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayerView {
    pub id: String,
    pub name: String,
    /// Feature property the layer is searched by; layers without one
    /// are not searchable.
    pub search_field: String,
    pub source: VectorSourceView,
}

/// Fill/stroke parameters for a polygon highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            fill_color: "rgba(215, 102, 41, 0.9)".into(),
            stroke_color: "rgba(215, 101, 41, 0.9)".into(),
            stroke_width: 1.0,
        }
    }
}

/// Panels of the surrounding application the dispatcher can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Routing,
    TopicTree,
    LayerInfo,
    FeatureInfo,
}

/// Forward transform between a source EPSG code and the viewport
/// projection.
pub trait CoordinateTransform: Send + Sync {
    fn to_view(&self, source_epsg: &str, coordinate: &[f64]) -> Vec<f64>;
}

/// Viewport accessor/mutator.
pub trait MapView: Send + Sync {
    /// EPSG code of the viewport projection.
    fn projection_code(&self) -> String;
    /// Whether the map currently renders in 3D mode.
    fn is_3d(&self) -> bool;
    fn zoom_to(&self, coordinate: &[f64], zoom_level: u32);
    fn place_marker(&self, coordinate: &[f64]);
    fn highlight(&self, geometry: &Geometry, style: &HighlightStyle);
    /// Currently-visible vector layers, restricted to those configured
    /// with a search field.
    fn visible_vector_layers(&self) -> Vec<VectorLayerView>;
}

/// Layer configuration store.
pub trait LayerCatalog: Send + Sync {
    fn layer_by_id(&self, id: &str) -> Option<LayerConfig>;
    /// Flat listing of every configured layer.
    fn layers(&self) -> Vec<LayerConfig>;
    /// Nested folder tree of the topic tree.
    fn folder_tree(&self) -> Folder;
    /// Static raw catalog fallback: layers known to the application but
    /// not (yet) part of the current configuration.
    fn raw_layer_by_id(&self, id: &str) -> Option<LayerConfig>;
    /// Insert a new layer node. Returns `false` on insertion failure.
    fn insert_layer(&self, layer: LayerConfig) -> bool;
    /// Replace an existing layer node. Returns `false` when absent.
    fn replace_layer(&self, layer: LayerConfig) -> bool;
    /// Compute the stacking index for the next layer shown in the tree.
    fn next_stacking_index(&self) -> i64;
}

/// Named style lookup for highlights.
pub trait StyleCatalog: Send + Sync {
    fn style_by_id(&self, id: &str) -> Option<HighlightStyle>;
}

/// User-visible warning/error publication.
pub trait AlertSink: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Menu and side-panel control.
pub trait MenuControl: Send + Sync {
    fn switch_panel(&self, panel: Panel);
    fn is_side_panel_expanded(&self) -> bool;
    fn expand_side_panel(&self);
    /// Seed the routing module with its first waypoint.
    fn seed_routing_waypoint(&self, coordinate: &[f64], name: &str);
}

/// Consumer of a feature+layer pair for GetFeatureInfo display.
pub trait FeatureInfoSink: Send + Sync {
    fn show_feature(&self, feature: &Feature, layer_id: &str);
}

/// Resolve a translation key to display text.
pub trait Localizer: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// The collaborator set a backend instance may need at query time.
#[derive(Clone)]
pub struct PortalContext {
    pub map: Arc<dyn MapView>,
    pub layers: Arc<dyn LayerCatalog>,
    pub transform: Arc<dyn CoordinateTransform>,
    pub alerts: Arc<dyn AlertSink>,
    pub localizer: Arc<dyn Localizer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_text_property_degrades_to_empty() {
        let mut properties = serde_json::Map::new();
        properties.insert("name".into(), serde_json::json!("Altona"));
        properties.insert("count".into(), serde_json::json!(7));
        properties.insert("nested".into(), serde_json::json!({"x": 1}));
        let feature = Feature {
            id: "f1".into(),
            properties,
            geometry: Geometry::Point(vec![0.0, 0.0]),
        };
        assert_eq!(feature.text_property("name"), "Altona");
        assert_eq!(feature.text_property("count"), "7");
        assert_eq!(feature.text_property("nested"), "");
        assert_eq!(feature.text_property("missing"), "");
    }

    #[test]
    fn clustered_source_unwraps_to_inner_features() {
        let feature = Feature {
            id: "f1".into(),
            properties: serde_json::Map::new(),
            geometry: Geometry::Point(vec![1.0, 2.0]),
        };
        let source = VectorSourceView::Clustered {
            inner: Box::new(VectorSourceView::Clustered {
                inner: Box::new(VectorSourceView::Plain {
                    features: vec![feature.clone()],
                }),
            }),
        };
        assert_eq!(source.features(), &[feature]);
    }

    #[test]
    fn layer_config_deserializes_with_defaults() {
        let layer: LayerConfig =
            serde_json::from_value(serde_json::json!({"id": "l1", "name": "Roads"}))
                .expect("deserialize");
        assert_eq!(layer.id, "l1");
        assert!(!layer.visibility);
        assert!(!layer.show_in_layer_tree);
        assert_eq!(layer.stacking_index, None);
        assert!(!layer.requires_3d);
    }
}
