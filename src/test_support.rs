//! Shared fakes for unit tests: collaborator doubles that record every
//! effect so assertions can inspect what the engine did.

use crate::backends::BackendEnv;
use crate::collaborators::{
    AlertSink, CoordinateTransform, Feature, FeatureInfoSink, Folder, HighlightStyle,
    LayerCatalog, LayerConfig, Localizer, MapView, MenuControl, Panel, PortalContext,
    StyleCatalog, VectorLayerView,
};
use crate::geometry::Geometry;
use crate::orchestrator::SearchInput;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeMap {
    pub three_d: AtomicBool,
    pub markers: Mutex<Vec<Vec<f64>>>,
    pub zooms: Mutex<Vec<(Vec<f64>, u32)>>,
    pub highlights: Mutex<Vec<(Geometry, HighlightStyle)>>,
    pub vector_layers: Mutex<Vec<VectorLayerView>>,
}

impl MapView for FakeMap {
    fn projection_code(&self) -> String {
        "EPSG:25832".into()
    }

    fn is_3d(&self) -> bool {
        self.three_d.load(Ordering::SeqCst)
    }

    fn zoom_to(&self, coordinate: &[f64], zoom_level: u32) {
        self.zooms
            .lock()
            .expect("lock")
            .push((coordinate.to_vec(), zoom_level));
    }

    fn place_marker(&self, coordinate: &[f64]) {
        self.markers.lock().expect("lock").push(coordinate.to_vec());
    }

    fn highlight(&self, geometry: &Geometry, style: &HighlightStyle) {
        self.highlights
            .lock()
            .expect("lock")
            .push((geometry.clone(), style.clone()));
    }

    fn visible_vector_layers(&self) -> Vec<VectorLayerView> {
        self.vector_layers.lock().expect("lock").clone()
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub layers: Mutex<Vec<LayerConfig>>,
    pub raw: Mutex<Vec<LayerConfig>>,
    pub tree: Mutex<Folder>,
    pub stacking_calls: AtomicUsize,
    pub fail_insert: AtomicBool,
}

impl LayerCatalog for FakeCatalog {
    fn layer_by_id(&self, id: &str) -> Option<LayerConfig> {
        self.layers
            .lock()
            .expect("lock")
            .iter()
            .find(|layer| layer.id == id)
            .cloned()
    }

    fn layers(&self) -> Vec<LayerConfig> {
        self.layers.lock().expect("lock").clone()
    }

    fn folder_tree(&self) -> Folder {
        self.tree.lock().expect("lock").clone()
    }

    fn raw_layer_by_id(&self, id: &str) -> Option<LayerConfig> {
        self.raw
            .lock()
            .expect("lock")
            .iter()
            .find(|layer| layer.id == id)
            .cloned()
    }

    fn insert_layer(&self, layer: LayerConfig) -> bool {
        if self.fail_insert.load(Ordering::SeqCst) {
            return false;
        }
        self.layers.lock().expect("lock").push(layer);
        true
    }

    fn replace_layer(&self, layer: LayerConfig) -> bool {
        let mut layers = self.layers.lock().expect("lock");
        match layers.iter_mut().find(|candidate| candidate.id == layer.id) {
            Some(slot) => {
                *slot = layer;
                true
            }
            None => false,
        }
    }

    fn next_stacking_index(&self) -> i64 {
        self.stacking_calls.fetch_add(1, Ordering::SeqCst);
        self.layers.lock().expect("lock").len() as i64
    }
}

#[derive(Default)]
pub struct FakeTransform {
    pub calls: Mutex<Vec<(String, Vec<f64>)>>,
}

impl CoordinateTransform for FakeTransform {
    fn to_view(&self, source_epsg: &str, coordinate: &[f64]) -> Vec<f64> {
        self.calls
            .lock()
            .expect("lock")
            .push((source_epsg.to_string(), coordinate.to_vec()));
        coordinate.to_vec()
    }
}

#[derive(Default)]
pub struct FakeAlerts {
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl FakeAlerts {
    pub fn warning_count(&self) -> usize {
        self.warnings.lock().expect("lock").len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().expect("lock").len()
    }
}

impl AlertSink for FakeAlerts {
    fn warn(&self, message: &str) {
        self.warnings.lock().expect("lock").push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().expect("lock").push(message.to_string());
    }
}

/// Returns translation keys verbatim so assertions stay key-based.
#[derive(Default)]
pub struct FakeLocalizer;

impl Localizer for FakeLocalizer {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

#[derive(Default)]
pub struct FakeStyles {
    pub styles: Mutex<BTreeMap<String, HighlightStyle>>,
}

impl StyleCatalog for FakeStyles {
    fn style_by_id(&self, id: &str) -> Option<HighlightStyle> {
        self.styles.lock().expect("lock").get(id).cloned()
    }
}

#[derive(Default)]
pub struct FakeMenu {
    pub switched: Mutex<Vec<Panel>>,
    pub expanded: AtomicBool,
    pub waypoints: Mutex<Vec<(Vec<f64>, String)>>,
}

impl MenuControl for FakeMenu {
    fn switch_panel(&self, panel: Panel) {
        self.switched.lock().expect("lock").push(panel);
    }

    fn is_side_panel_expanded(&self) -> bool {
        self.expanded.load(Ordering::SeqCst)
    }

    fn expand_side_panel(&self) {
        self.expanded.store(true, Ordering::SeqCst);
    }

    fn seed_routing_waypoint(&self, coordinate: &[f64], name: &str) {
        self.waypoints
            .lock()
            .expect("lock")
            .push((coordinate.to_vec(), name.to_string()));
    }
}

#[derive(Default)]
pub struct FakeFeatureInfo {
    pub shown: Mutex<Vec<(String, String)>>,
}

impl FeatureInfoSink for FakeFeatureInfo {
    fn show_feature(&self, feature: &Feature, layer_id: &str) {
        self.shown
            .lock()
            .expect("lock")
            .push((feature.id.clone(), layer_id.to_string()));
    }
}

/// One bundle of collaborator fakes with handles kept for assertions.
pub struct TestPortal {
    pub map: Arc<FakeMap>,
    pub layers: Arc<FakeCatalog>,
    pub transform: Arc<FakeTransform>,
    pub alerts: Arc<FakeAlerts>,
    pub localizer: Arc<FakeLocalizer>,
    pub styles: Arc<FakeStyles>,
    pub menu: Arc<FakeMenu>,
    pub feature_info: Arc<FakeFeatureInfo>,
    pub input: Arc<SearchInput>,
}

impl Default for TestPortal {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPortal {
    pub fn new() -> Self {
        Self {
            map: Arc::new(FakeMap::default()),
            layers: Arc::new(FakeCatalog::default()),
            transform: Arc::new(FakeTransform::default()),
            alerts: Arc::new(FakeAlerts::default()),
            localizer: Arc::new(FakeLocalizer),
            styles: Arc::new(FakeStyles::default()),
            menu: Arc::new(FakeMenu::default()),
            feature_info: Arc::new(FakeFeatureInfo::default()),
            input: SearchInput::new(),
        }
    }

    pub fn context(&self) -> PortalContext {
        PortalContext {
            map: self.map.clone(),
            layers: self.layers.clone(),
            transform: self.transform.clone(),
            alerts: self.alerts.clone(),
            localizer: self.localizer.clone(),
        }
    }

    pub fn env(&self) -> BackendEnv {
        BackendEnv {
            client: crate::http::build_client(5).expect("client"),
            portal: self.context(),
            input: self.input.clone(),
            hit_icons: BTreeMap::new(),
        }
    }
}

/// A point feature with one text property, for vector-search tests.
pub fn point_feature(id: &str, field: &str, value: &str, x: f64, y: f64) -> Feature {
    let mut properties = serde_json::Map::new();
    properties.insert(field.into(), serde_json::json!(value));
    Feature {
        id: id.into(),
        properties,
        geometry: Geometry::Point(vec![x, y]),
    }
}
