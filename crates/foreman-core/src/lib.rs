//! Foreman Core -- a production-graph rate solver for factory planning.
//!
//! This crate models a factory as a directed graph of recipe, supplier,
//! consumer and passthrough nodes joined by item-typed links, and computes
//! steady-state rates for every link and node against an immutable catalog
//! of game data.
//!
//! # Solve Pipeline
//!
//! Each call to [`solver::solve`] works one weakly connected component at a
//! time and iterates three passes until rates stop changing:
//!
//! 1. **Demand** -- requests flow from consumers back to producers. Pull
//!    consumers and locked nodes drive auto-count producers to scale up.
//! 2. **Supply** -- producers run at what their inputs and targets allow and
//!    split their output by priority weight.
//! 3. **Settle** -- passthrough nodes balance their inputs against what left.
//!
//! Recipe throughput is damped so cycles converge. Afterwards assembler
//! counts, energy draw and per-node issues are derived from the result.
//!
//! # Editing Pattern
//!
//! Graph mutations validate against the catalog and either fail with a
//! [`graph::GraphError`] (leaving the graph unchanged) or return the set of
//! stale nodes. The [`engine::Engine`] feeds those into its
//! [`propagator::ChangePropagator`] and re-solves, batching edits while paused:
//!
//! ```rust,ignore
//! engine.set_paused(true);
//! engine.set_enabled(a, false)?;
//! engine.set_enabled(b, false)?;
//! let report = engine.set_paused(false); // one solve for both edits
//! ```
//!
//! # Key Types
//!
//! - [`catalog::Catalog`] -- Immutable items, recipes, assemblers, modules,
//!   beacons and technologies, built once through [`catalog::CatalogBuilder`].
//! - [`graph::Graph`] -- Arena-stored nodes and links; cycles allowed.
//! - [`node::NodeKind`] -- The four node behaviours.
//! - [`settings::SolverSettings`] -- Rate unit, enabled objects, priority
//!   powers and convergence tuning, passed into every solve.
//! - [`serialize::GraphState`] -- Name-based graph state for saving and
//!   catalog swaps.
//! - [`summary::GraphSummary`] -- Per-item and per-recipe totals.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for catalog quantities.

pub mod allocate;
pub mod catalog;
pub mod effects;
pub mod engine;
pub mod fixed;
pub mod graph;
pub mod id;
pub mod node;
pub mod propagator;
pub mod serialize;
pub mod settings;
pub mod solver;
pub mod summary;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
