//! # portal-search
//!
//! Federated search for a map-centric geoportal.
//!
//! One user query is fanned out concurrently to a configurable set of
//! heterogeneous search backends — remote geocoders, a full-text index,
//! a WFS gazetteer, an OGC-filter WFS, a metadata catalog, the portal's
//! own topic tree and the vector features currently rendered on the
//! map. Radically different response shapes are normalized into one
//! uniform [`SearchResult`]; user interaction with any result runs
//! typed actions from a closed catalog without the dispatcher knowing
//! which backend produced the hit.
//!
//! ## Design
//!
//! - Backends implement [`SearchBackend`] around a shared
//!   [`backend::BackendCore`]: a per-instance state machine with at
//!   most one in-flight request, superseded requests cancelled through
//!   their own cancellation handle
//! - The [`SearchOrchestrator`] replaces (never merges) the aggregate
//!   on each query and appends each backend's hits in arrival order
//! - A failed or cancelled backend never takes its siblings down;
//!   user-visible failures go exclusively through the alert sink
//! - The portal itself stays behind the trait seams of
//!   [`collaborators`] — the engine owns no map, UI, or configuration
//!   state

pub mod actions;
pub mod backend;
pub mod backends;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod geometry;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod types;
pub mod wfs;

#[cfg(test)]
pub(crate) mod test_support;

pub use actions::{ActionDispatcher, DispatcherContext};
pub use backend::{BackendState, PagingMode, SearchBackend};
pub use backends::{BackendEnv, BackendRegistry};
pub use config::FederationConfig;
pub use error::{Result, SearchError};
pub use orchestrator::{SearchInput, SearchOrchestrator};
pub use types::{Action, ActionKind, Interaction, SearchResult};

use collaborators::PortalContext;
use std::sync::Arc;

/// The assembled search federation: orchestrator plus dispatcher,
/// built from one configuration document and the portal collaborators.
pub struct SearchFederation {
    orchestrator: SearchOrchestrator,
    dispatcher: ActionDispatcher,
}

impl SearchFederation {
    /// Build backends from the configuration through the built-in
    /// registry and wire up the orchestrator and dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] when the configuration document
    /// itself is invalid or the HTTP client cannot be constructed.
    /// Invalid individual backend definitions only disable that backend
    /// (the user is alerted through the sink).
    pub fn from_config(
        config: &FederationConfig,
        portal: PortalContext,
        dispatcher_context: DispatcherContext,
    ) -> Result<Self> {
        config.validate()?;
        let input = SearchInput::new();
        let env = BackendEnv {
            client: http::build_client(config.timeout_seconds)?,
            portal,
            input: input.clone(),
            hit_icons: config.hit_icons.clone(),
        };
        let backends = BackendRegistry::with_builtins().build(config, &env);
        Ok(Self {
            orchestrator: SearchOrchestrator::new(backends, config.min_characters, input),
            dispatcher: ActionDispatcher::new(dispatcher_context, config.zoom_level),
        })
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Run one query across the federation. See
    /// [`SearchOrchestrator::run_search`].
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.orchestrator.run_search(query).await
    }

    /// Execute the actions a result binds for an interaction.
    pub fn interact(&self, result: &SearchResult, interaction: Interaction) {
        self.dispatcher.dispatch(result, interaction);
    }
}

/// Convenience constructor when every collaborator comes from one
/// bundle of portal services.
#[allow(clippy::too_many_arguments)]
pub fn build_federation(
    config: &FederationConfig,
    map: Arc<dyn collaborators::MapView>,
    layers: Arc<dyn collaborators::LayerCatalog>,
    transform: Arc<dyn collaborators::CoordinateTransform>,
    styles: Arc<dyn collaborators::StyleCatalog>,
    alerts: Arc<dyn collaborators::AlertSink>,
    menu: Arc<dyn collaborators::MenuControl>,
    feature_info: Arc<dyn collaborators::FeatureInfoSink>,
    localizer: Arc<dyn collaborators::Localizer>,
) -> Result<SearchFederation> {
    let portal = PortalContext {
        map: map.clone(),
        layers: layers.clone(),
        transform,
        alerts: alerts.clone(),
        localizer: localizer.clone(),
    };
    let dispatcher_context = DispatcherContext {
        map,
        layers,
        styles,
        alerts,
        menu,
        feature_info,
        localizer,
    };
    SearchFederation::from_config(config, portal, dispatcher_context)
}
