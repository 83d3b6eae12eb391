//! Backend adapters and the type-tag registry.
//!
//! Each module provides one adapter implementing
//! [`crate::backend::SearchBackend`]. The registry maps configuration
//! type tags to factories: built-ins are registered at startup, add-ons
//! can register afterwards, and unknown tags warn instead of crashing.

pub mod bkg;
pub mod catalog;
pub mod elastic;
pub mod gazetteer;
pub mod nominatim;
pub mod photon;
pub mod special_wfs;
pub mod topic_tree;
pub mod visible_vector;

use crate::backend::SearchBackend;
use crate::collaborators::PortalContext;
use crate::config::FederationConfig;
use crate::error::Result;
use crate::normalize::assign_instance_ids;
use crate::orchestrator::SearchInput;
use crate::types::{ActionKind, ConfiguredEvents, Interaction};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a backend factory may need besides its own options.
#[derive(Clone)]
pub struct BackendEnv {
    pub client: reqwest::Client,
    pub portal: PortalContext,
    /// Current search input, shared with the orchestrator.
    pub input: Arc<SearchInput>,
    /// Icon per primary interaction action, from the portal config.
    pub hit_icons: BTreeMap<String, String>,
}

/// Builds one backend instance from its definition options.
pub type BackendFactory =
    Box<dyn Fn(String, serde_json::Value, &BackendEnv) -> Result<Arc<dyn SearchBackend>> + Send + Sync>;

/// Type-tag → factory table for backend construction.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Registry with the nine built-in adapters.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("bkg", Box::new(bkg::from_options));
        registry.register("catalog", Box::new(catalog::from_options));
        registry.register("elastic", Box::new(elastic::from_options));
        registry.register("gazetteer", Box::new(gazetteer::from_options));
        registry.register("nominatim", Box::new(nominatim::from_options));
        registry.register("photon", Box::new(photon::from_options));
        registry.register("specialWfs", Box::new(special_wfs::from_options));
        registry.register("topicTree", Box::new(topic_tree::from_options));
        registry.register("visibleVector", Box::new(visible_vector::from_options));
        registry
    }

    /// Register a factory for a type tag, replacing any previous one.
    pub fn register(&mut self, tag: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(tag.into(), factory);
    }

    pub fn known_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build every configured backend instance.
    ///
    /// Unknown type tags are warned about and skipped. A definition
    /// whose options fail to deserialize or validate disables that one
    /// backend: the user is alerted, siblings are still built.
    pub fn build(&self, config: &FederationConfig, env: &BackendEnv) -> Vec<Arc<dyn SearchBackend>> {
        let ids = assign_instance_ids(&config.backends);
        let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();
        for (definition, id) in config.backends.iter().zip(ids) {
            let Some(factory) = self.factories.get(definition.kind.as_str()) else {
                tracing::warn!(backend_type = %definition.kind, "unknown search backend type, skipping");
                continue;
            };
            match factory(id, definition.options_value(), env) {
                Ok(backend) => backends.push(backend),
                Err(err) => {
                    tracing::warn!(backend_type = %definition.kind, error = %err, "backend disabled by configuration error");
                    let heading = env
                        .portal
                        .localizer
                        .translate("common:search.invalidBackendConfiguration");
                    env.portal.alerts.error(&format!("{heading}: {err}"));
                }
            }
        }
        backends
    }
}

/// Build the default event bindings of an adapter.
pub(crate) fn events_of(pairs: &[(Interaction, &[ActionKind])]) -> ConfiguredEvents {
    let mut map = BTreeMap::new();
    for (interaction, kinds) in pairs {
        map.insert(*interaction, kinds.to_vec());
    }
    ConfiguredEvents(map)
}

/// Configured event names override the adapter default when present.
pub(crate) fn override_or(
    raw: Option<&BTreeMap<Interaction, Vec<String>>>,
    default: ConfiguredEvents,
) -> ConfiguredEvents {
    match raw {
        Some(raw) => ConfiguredEvents::from_raw(raw),
        None => default,
    }
}

/// Result icon: explicit option, else the configured icon for the first
/// on-click action, else none.
pub(crate) fn resolve_icon(
    explicit: Option<String>,
    events: &ConfiguredEvents,
    hit_icons: &BTreeMap<String, String>,
) -> String {
    if let Some(icon) = explicit {
        return icon;
    }
    events
        .kinds_for(Interaction::OnClick)
        .first()
        .and_then(|kind| hit_icons.get(kind.name()))
        .cloned()
        .unwrap_or_default()
}
