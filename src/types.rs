//! Core types: the uniform search result and the closed action catalog.
//!
//! Every backend, whatever its wire format, produces [`SearchResult`]
//! values. Interaction with a result triggers the typed [`Action`]s
//! bound to it — the dispatcher never needs to know which backend
//! produced the hit.

use crate::collaborators::Feature;
use crate::geometry::HitGeometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// User interaction kinds a result can bind actions to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Interaction {
    OnClick,
    OnHover,
    ButtonClick,
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnClick => "onClick",
            Self::OnHover => "onHover",
            Self::ButtonClick => "buttonClick",
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the closed action catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    SetMarker,
    ZoomToResult,
    ActivateLayerInTopicTree,
    AddLayerToTopicTree,
    HighlightFeature,
    OpenGetFeatureInfo,
    ShowInTree,
    ShowLayerInfo,
    StartRouting,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetMarker => "setMarker",
            Self::ZoomToResult => "zoomToResult",
            Self::ActivateLayerInTopicTree => "activateLayerInTopicTree",
            Self::AddLayerToTopicTree => "addLayerToTopicTree",
            Self::HighlightFeature => "highlightFeature",
            Self::OpenGetFeatureInfo => "openGetFeatureInfo",
            Self::ShowInTree => "showInTree",
            Self::ShowLayerInfo => "showLayerInfo",
            Self::StartRouting => "startRouting",
        }
    }

    /// Parse a configured action name. Unknown names resolve to `None`
    /// and stay inert — configuration mistakes never become errors.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.name() == tag)
    }

    pub fn all() -> &'static [ActionKind] {
        &[
            Self::SetMarker,
            Self::ZoomToResult,
            Self::ActivateLayerInTopicTree,
            Self::AddLayerToTopicTree,
            Self::HighlightFeature,
            Self::OpenGetFeatureInfo,
            Self::ShowInTree,
            Self::ShowLayerInfo,
            Self::StartRouting,
        ]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One action of the closed catalog together with its payload, built by
/// the owning backend for a concrete hit. Payload validity is judged by
/// the consuming handler, not centrally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    SetMarker {
        coordinates: Vec<f64>,
        #[serde(default)]
        feature: Option<Feature>,
        #[serde(default)]
        layer_id: Option<String>,
    },
    ZoomToResult {
        coordinates: Vec<f64>,
    },
    ActivateLayerInTopicTree {
        layer_id: String,
        #[serde(default)]
        source: Option<String>,
    },
    AddLayerToTopicTree {
        layer_id: String,
        source: String,
        show_in_layer_tree: bool,
        visibility: bool,
    },
    HighlightFeature {
        hit: HitGeometry,
    },
    OpenGetFeatureInfo {
        feature: Feature,
        layer_id: String,
    },
    ShowInTree {
        layer_id: String,
    },
    ShowLayerInfo {
        layer_id: String,
    },
    StartRouting {
        coordinates: Vec<f64>,
        name: String,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SetMarker { .. } => ActionKind::SetMarker,
            Action::ZoomToResult { .. } => ActionKind::ZoomToResult,
            Action::ActivateLayerInTopicTree { .. } => ActionKind::ActivateLayerInTopicTree,
            Action::AddLayerToTopicTree { .. } => ActionKind::AddLayerToTopicTree,
            Action::HighlightFeature { .. } => ActionKind::HighlightFeature,
            Action::OpenGetFeatureInfo { .. } => ActionKind::OpenGetFeatureInfo,
            Action::ShowInTree { .. } => ActionKind::ShowInTree,
            Action::ShowLayerInfo { .. } => ActionKind::ShowLayerInfo,
            Action::StartRouting { .. } => ActionKind::StartRouting,
        }
    }
}

/// Per-backend configuration: which action names each interaction kind
/// binds, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfiguredEvents(pub BTreeMap<Interaction, Vec<ActionKind>>);

impl ConfiguredEvents {
    /// Build from raw configured name lists. Unknown action names are
    /// dropped silently (inert, not errors).
    pub fn from_raw(raw: &BTreeMap<Interaction, Vec<String>>) -> Self {
        let mut map = BTreeMap::new();
        for (interaction, names) in raw {
            let kinds: Vec<ActionKind> = names
                .iter()
                .filter_map(|name| ActionKind::from_tag(name))
                .collect();
            map.insert(*interaction, kinds);
        }
        Self(map)
    }

    pub fn kinds_for(&self, interaction: Interaction) -> &[ActionKind] {
        self.0.get(&interaction).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Bound events on a concrete result: interaction kind → ordered typed
/// actions.
pub type EventMap = BTreeMap<Interaction, Vec<Action>>;

/// The uniform result unit every backend normalizes into.
///
/// Optional display fields are plain strings defaulting to empty —
/// consumers never see an absent value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Category label shown as the result group heading.
    pub category: String,
    /// Stable id within the owning backend.
    pub id: String,
    /// Instance id of the backend that produced the hit.
    pub backend_id: String,
    /// Arrival position in the aggregate, stamped by the orchestrator.
    pub index: usize,
    /// Display name.
    pub name: String,
    pub tool_tip: String,
    pub icon: String,
    pub image_path: String,
    pub additional_info: String,
    #[serde(default)]
    pub events: EventMap,
}
