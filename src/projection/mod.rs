//! The projection catch-up runtime (`SPEC_FULL.md` §4.G): a registry of
//! named projections, each driven by its own poll-or-wake task, persisting
//! its checkpoint atomically with its handler's side effects.

pub mod checkpoint;
mod runtime;

use std::collections::HashMap;

pub use runtime::{ProjectionHandler, ProjectionHealth};

use crate::config::ProjectionConfig;
use crate::store::EventStore;
use std::sync::Arc;

/// Owns every registered projection for one [`EventStore`]. Registration must
/// happen before [`ProjectionRegistry::start`]; names must be unique.
#[derive(Default)]
pub struct ProjectionRegistry {
    handles: HashMap<String, runtime::ProjectionHandle>,
}

impl ProjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a projection. Panics if `config.name` is already registered -
    /// this is a startup-time wiring error, not a runtime condition.
    pub fn register(&mut self, config: ProjectionConfig, handler: Arc<dyn ProjectionHandler>) {
        let name = config.name.clone();
        let handle = runtime::ProjectionHandle::new(config, handler);
        if self.handles.insert(name.clone(), handle).is_some() {
            panic!("projection `{name}` is already registered");
        }
    }

    /// Spawns every registered projection's catch-up task against `store`.
    pub fn start(&mut self, store: EventStore) {
        for handle in self.handles.values_mut() {
            handle.start(store.clone());
        }
    }

    /// Signals every projection to stop and waits for each to finish its
    /// current batch.
    pub async fn stop(&mut self) {
        for handle in self.handles.values_mut() {
            handle.stop().await;
        }
    }

    /// Health snapshot for one projection, or `None` if no projection is
    /// registered under that name.
    pub fn health(&self, name: &str) -> Option<ProjectionHealth> {
        self.handles.get(name).map(|handle| handle.health())
    }

    /// Health snapshots for every registered projection.
    pub fn health_all(&self) -> Vec<ProjectionHealth> {
        self.handles.values().map(|handle| handle.health()).collect()
    }
}
