//! Loading and saving of the planner's own files: enabled-object lists,
//! saved graphs and solver settings.

use foreman_core::catalog::Catalog;
use foreman_core::serialize::GraphState;
use foreman_core::settings::{EnabledObjects, SolverSettings};
use std::path::Path;
use tracing::{debug, warn};

use crate::format::{DataLoadError, deserialize_file, write_file};

// ===========================================================================
// Enabled objects
// ===========================================================================

/// Read an enabled-object list (`EnabledRecipes`, `EnabledAssemblers`, ...).
///
/// Names the catalog does not know are dropped with a warning.
pub fn load_enabled_objects(path: &Path, catalog: &Catalog) -> Result<EnabledObjects, DataLoadError> {
    let mut enabled: EnabledObjects = deserialize_file(path)?;
    let before = enabled.clone();
    enabled.retain_known(catalog);
    if enabled != before {
        warn!(file = %path.display(), "enabled-object list names unknown entities");
    }
    Ok(enabled)
}

pub fn save_enabled_objects(path: &Path, enabled: &EnabledObjects) -> Result<(), DataLoadError> {
    write_file(path, enabled)
}

// ===========================================================================
// Graph state
// ===========================================================================

pub fn load_graph_state(path: &Path) -> Result<GraphState, DataLoadError> {
    let state: GraphState = deserialize_file(path)?;
    debug!(
        file = %path.display(),
        nodes = state.nodes.len(),
        links = state.links.len(),
        "graph state read"
    );
    Ok(state)
}

pub fn save_graph_state(path: &Path, state: &GraphState) -> Result<(), DataLoadError> {
    write_file(path, state)
}

// ===========================================================================
// Solver settings
// ===========================================================================

/// Read solver settings. Missing fields take their defaults and
/// out-of-range tuning values are replaced.
pub fn load_settings(path: &Path) -> Result<SolverSettings, DataLoadError> {
    let settings: SolverSettings = deserialize_file(path)?;
    Ok(settings.sanitized())
}

pub fn save_settings(path: &Path, settings: &SolverSettings) -> Result<(), DataLoadError> {
    write_file(path, settings)
}

// ===========================================================================
// Tests
// ===========================================================================
