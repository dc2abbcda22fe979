//! The editing session: owns the graph and keeps its rates current.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A shared, immutable [`Catalog`] snapshot
//! - The [`Graph`] being edited
//! - The [`SolverSettings`] passed into every solve
//! - A [`ChangePropagator`] collecting stale nodes
//!
//! Every mutation forwards to the graph, records the returned stale set and
//! solves it right away unless the engine is paused. Resuming solves the
//! accumulated set once. Settings and catalog changes mark the whole graph.
//!
//! Rates passed into and read from the engine are in the current
//! [`RateUnit`]; the graph underneath stores per-second values.

use crate::catalog::{Catalog, EntityKind};
use crate::graph::{Graph, GraphError, StaleSet};
use crate::id::{ItemId, LinkId, NodeId};
use crate::node::{NodeKind, RecipeNode};
use crate::propagator::ChangePropagator;
use crate::serialize::{GraphState, ImportReport, StateError};
use crate::settings::{EnabledObjects, RateUnit, SolverSettings};
use crate::solver::{SolveReport, solve};
use crate::summary::GraphSummary;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    catalog: Arc<Catalog>,
    graph: Graph,
    settings: SolverSettings,
    propagator: ChangePropagator,
    last_report: Option<SolveReport>,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_settings(catalog, SolverSettings::default())
    }

    pub fn with_settings(catalog: Arc<Catalog>, settings: SolverSettings) -> Self {
        Self {
            catalog,
            graph: Graph::new(),
            settings,
            propagator: ChangePropagator::new(),
            last_report: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// A shared handle to the current catalog.
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Report of the most recent solve, if any ran.
    pub fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    /// Returns `true` when no edits are waiting to be solved.
    pub fn is_clean(&self) -> bool {
        self.propagator.is_clean()
    }

    // -----------------------------------------------------------------------
    // Solving
    // -----------------------------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.propagator.is_paused()
    }

    /// Pause or resume automatic solving. Resuming solves everything that
    /// went stale while paused and returns the report.
    pub fn set_paused(&mut self, paused: bool) -> Option<SolveReport> {
        if paused == self.is_paused() {
            return None;
        }
        self.propagator.set_paused(paused);
        if paused {
            tracing::debug!("solving paused");
            None
        } else {
            tracing::debug!("solving resumed");
            self.solve_pending()
        }
    }

    /// Solve the pending dirty set now, paused or not.
    pub fn resolve(&mut self) -> SolveReport {
        let scope = self.propagator.take();
        let report = solve(&mut self.graph, &self.catalog, &self.settings, &scope);
        for (node, error) in &report.errors {
            tracing::warn!(node = ?node, %error, "node references a missing catalog entity");
        }
        self.last_report = Some(report.clone());
        report
    }

    /// Solve the whole graph now.
    pub fn resolve_all(&mut self) -> SolveReport {
        self.propagator.mark_all();
        self.resolve()
    }

    fn solve_pending(&mut self) -> Option<SolveReport> {
        if self.propagator.is_paused() || self.propagator.is_clean() {
            return None;
        }
        Some(self.resolve())
    }

    fn changed(&mut self, stale: StaleSet) {
        self.propagator.mark(stale);
        self.solve_pending();
    }

    fn changed_all(&mut self) {
        self.propagator.mark_all();
        self.solve_pending();
    }

    // -----------------------------------------------------------------------
    // Graph mutations
    // -----------------------------------------------------------------------

    pub fn add_node(&mut self, kind: NodeKind) -> Result<NodeId, GraphError> {
        let (id, stale) = self.graph.add_node(&self.catalog, kind)?;
        self.changed(stale);
        Ok(id)
    }

    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        let stale = self.graph.remove_node(node)?;
        self.propagator.forget(node);
        self.changed(stale);
        Ok(())
    }

    pub fn connect(
        &mut self,
        producer: NodeId,
        consumer: NodeId,
        item: ItemId,
    ) -> Result<LinkId, GraphError> {
        let (link, stale) = self.graph.connect(&self.catalog, producer, consumer, item)?;
        self.changed(stale);
        Ok(link)
    }

    pub fn disconnect(&mut self, link: LinkId) -> Result<(), GraphError> {
        let stale = self.graph.disconnect(link)?;
        self.changed(stale);
        Ok(())
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) -> Result<(), GraphError> {
        let stale = self.graph.set_enabled(node, enabled)?;
        self.changed(stale);
        Ok(())
    }

    /// Set or clear a node's manual rate, given in the current rate unit.
    pub fn set_rate_lock(&mut self, node: NodeId, rate: Option<f64>) -> Result<(), GraphError> {
        let unit = self.settings.rate_unit;
        let stale = self
            .graph
            .set_rate_lock(node, rate.map(|r| unit.to_per_second(r)))?;
        self.changed(stale);
        Ok(())
    }

    /// A node's manual rate in the current rate unit.
    pub fn rate_lock(&self, node: NodeId) -> Option<f64> {
        let unit = self.settings.rate_unit;
        self.graph
            .node(node)?
            .rate_lock
            .map(|r| unit.from_per_second(r))
    }

    pub fn set_low_priority(&mut self, node: NodeId, low_priority: bool) -> Result<(), GraphError> {
        let stale = self.graph.set_low_priority(node, low_priority)?;
        self.changed(stale);
        Ok(())
    }

    pub fn set_weight(&mut self, node: NodeId, weight: f64) -> Result<(), GraphError> {
        let stale = self.graph.set_weight(node, weight)?;
        self.changed(stale);
        Ok(())
    }

    pub fn set_pull(&mut self, node: NodeId, pull: bool) -> Result<(), GraphError> {
        let stale = self.graph.set_pull(node, pull)?;
        self.changed(stale);
        Ok(())
    }

    /// Edit a recipe node's assembler, modules, beacons, count or rounding.
    pub fn configure_recipe<F>(&mut self, node: NodeId, edit: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut RecipeNode),
    {
        let stale = self.graph.configure_recipe(&self.catalog, node, edit)?;
        self.changed(stale);
        Ok(())
    }

    /// Remove every node and link.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.propagator.take();
        self.last_report = None;
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn update_settings(&mut self, settings: SolverSettings) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        self.changed_all();
    }

    pub fn set_rate_unit(&mut self, unit: RateUnit) -> Result<(), GraphError> {
        if !unit.is_valid() {
            return Err(GraphError::InvalidRate(unit.seconds()));
        }
        if unit != self.settings.rate_unit {
            self.settings.rate_unit = unit;
            self.changed_all();
        }
        Ok(())
    }

    pub fn set_enabled_objects(&mut self, enabled: EnabledObjects) {
        if enabled != self.settings.enabled {
            self.settings.enabled = enabled;
            self.changed_all();
        }
    }

    /// Enable or disable one catalog entity by name.
    pub fn set_object_enabled(
        &mut self,
        kind: EntityKind,
        name: &str,
        enabled: bool,
    ) -> Result<(), GraphError> {
        self.catalog
            .lookup(kind, name)
            .map_err(|_| GraphError::UnknownEntity {
                kind,
                name: name.to_string(),
            })?;
        let mut objects = self.settings.enabled.clone();
        objects.set(&self.catalog, kind, name, enabled);
        self.set_enabled_objects(objects);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence and catalog swaps
    // -----------------------------------------------------------------------

    pub fn export(&self) -> GraphState {
        self.graph.export(&self.catalog)
    }

    /// Append the records of `state` to the graph.
    pub fn import(&mut self, state: &GraphState) -> Result<ImportReport, StateError> {
        let report = self.graph.import(&self.catalog, state)?;
        self.changed(report.stale.clone());
        Ok(report)
    }

    /// Replace the graph with the contents of `state`.
    pub fn load_state(&mut self, state: &GraphState) -> Result<ImportReport, StateError> {
        let mut graph = Graph::new();
        let report = graph.import(&self.catalog, state)?;
        self.graph = graph;
        self.propagator.take();
        self.changed_all();
        Ok(report)
    }

    /// Swap in a new catalog and rebind the graph to it by name.
    ///
    /// Nodes and links that do not resolve against the new catalog are
    /// dropped and listed in the report. Enabled-object names the new
    /// catalog lacks are discarded.
    pub fn replace_catalog(&mut self, catalog: Arc<Catalog>) -> Result<ImportReport, StateError> {
        let state = self.graph.export(&self.catalog);
        let mut graph = Graph::new();
        let report = graph.import(&catalog, &state)?;
        tracing::info!(
            nodes = graph.node_count(),
            dropped_nodes = report.rejected_nodes.len(),
            dropped_links = report.rejected_links.len(),
            "catalog replaced"
        );

        self.catalog = catalog;
        self.graph = graph;
        self.settings.enabled.retain_known(&self.catalog);
        self.propagator.take();
        self.changed_all();
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn summary(&self) -> GraphSummary {
        GraphSummary::compute(&self.graph, &self.catalog)
    }

    pub fn link_rate(&self, link: LinkId) -> Option<f64> {
        self.graph.link_rate(link)
    }

    pub fn node_rate(&self, node: NodeId) -> Option<f64> {
        self.graph.node_rate(node)
    }

    pub fn assembler_count(&self, node: NodeId) -> Option<f64> {
        self.graph.assembler_count(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::*;
    use crate::node::NodeIssue;
    use crate::test_utils::*;

    fn engine() -> (Engine, Fixture) {
        let (catalog, f) = fixture_catalog();
        (Engine::new(Arc::new(catalog)), f)
    }

    /// Supplier -> one assembler-1 making gears -> pull consumer.
    fn gear_line(e: &mut Engine, f: &Fixture, supply: f64) -> (NodeId, NodeId, NodeId, LinkId) {
        let s = e.add_node(NodeKind::Supplier { item: f.iron_plate }).unwrap();
        e.set_rate_lock(s, Some(supply)).unwrap();
        let r = e
            .add_node(fixed_recipe(f.gear_recipe, f.assembler_1, 1))
            .unwrap();
        let c = e
            .add_node(NodeKind::Consumer {
                item: f.gear,
                pull: true,
            })
            .unwrap();
        e.connect(s, r, f.iron_plate).unwrap();
        let out = e.connect(r, c, f.gear).unwrap();
        (s, r, c, out)
    }

    // -----------------------------------------------------------------------
    // Automatic solving
    // -----------------------------------------------------------------------

    #[test]
    fn mutations_solve_immediately() {
        let (mut e, f) = engine();
        let (_, _, c, out) = gear_line(&mut e, &f, 10.0);
        assert!(e.is_clean());
        assert!(approx(e.link_rate(out).unwrap(), 1.0));
        assert!(approx(e.node_rate(c).unwrap(), 1.0));
        assert!(e.last_report().unwrap().converged);
    }

    #[test]
    fn paused_edits_are_solved_once_on_resume() {
        let (mut e, f) = engine();
        let (s, _, _, out) = gear_line(&mut e, &f, 10.0);

        assert_eq!(e.set_paused(true), None);
        e.set_rate_lock(s, Some(1.0)).unwrap();
        e.set_weight(s, 2.0).unwrap();
        assert!(!e.is_clean());
        assert!(approx(e.link_rate(out).unwrap(), 1.0), "no solve while paused");

        let report = e.set_paused(false).unwrap();
        assert!(report.converged);
        assert!(e.is_clean());
        assert!(approx(e.link_rate(out).unwrap(), 0.5));
    }

    #[test]
    fn resume_without_edits_does_nothing() {
        let (mut e, _) = engine();
        e.set_paused(true);
        assert_eq!(e.set_paused(false), None);
    }

    #[test]
    fn rejected_mutation_leaves_graph_unchanged() {
        let (mut e, f) = engine();
        let (s, r, _, _) = gear_line(&mut e, &f, 10.0);
        let before = e.export();
        assert!(matches!(
            e.connect(s, r, f.iron_plate),
            Err(GraphError::DuplicateLink { .. })
        ));
        assert!(matches!(
            e.connect(r, s, f.gear),
            Err(GraphError::NoInputSlot { .. })
        ));
        assert_eq!(e.export(), before);
    }

    #[test]
    fn remove_node_resolves_neighbours() {
        let (mut e, f) = engine();
        let (s, r, c, _) = gear_line(&mut e, &f, 10.0);
        e.remove_node(r).unwrap();
        assert_eq!(e.node_rate(s), Some(0.0));
        assert_eq!(e.node_rate(c), Some(0.0));
        assert!(e.graph().node(r).is_none());
    }

    #[test]
    fn disable_and_reenable_restores_rates() {
        let (mut e, f) = engine();
        let (_, r, _, out) = gear_line(&mut e, &f, 10.0);
        let before = e.link_rate(out).unwrap();
        e.set_enabled(r, false).unwrap();
        assert_eq!(e.link_rate(out), Some(0.0));
        e.set_enabled(r, true).unwrap();
        assert!(approx(e.link_rate(out).unwrap(), before));
    }

    #[test]
    fn resolve_is_idempotent() {
        let (mut e, f) = engine();
        let (_, _, _, out) = gear_line(&mut e, &f, 1.0);
        let first = e.link_rate(out).unwrap();
        let report = e.resolve_all();
        assert!(report.converged);
        assert!((e.link_rate(out).unwrap() - first).abs() <= 1e-9);
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    #[test]
    fn rate_unit_change_rescales_everything() {
        let (mut e, f) = engine();
        let (s, _, _, out) = gear_line(&mut e, &f, 10.0);
        e.set_rate_unit(RateUnit::PerMinute).unwrap();
        assert!(approx(e.link_rate(out).unwrap(), 60.0));
        assert!(approx(e.rate_lock(s).unwrap(), 600.0));

        // New locks are read in the new unit.
        e.set_rate_lock(s, Some(60.0)).unwrap();
        assert!(approx(e.link_rate(out).unwrap(), 30.0));
    }

    #[test]
    fn invalid_rate_unit_is_rejected() {
        let (mut e, _) = engine();
        assert!(e.set_rate_unit(RateUnit::Custom { seconds: 0.0 }).is_err());
        assert_eq!(e.settings().rate_unit, RateUnit::PerSecond);
    }

    #[test]
    fn disabling_an_assembler_flags_nodes_using_it() {
        let (mut e, f) = engine();
        let (_, r, _, _) = gear_line(&mut e, &f, 10.0);
        e.set_object_enabled(EntityKind::Assembler, "assembler-1", false)
            .unwrap();
        let issues = &e.graph().node(r).unwrap().result.issues;
        assert!(issues.contains(&NodeIssue::DisabledAssembler));

        assert!(matches!(
            e.set_object_enabled(EntityKind::Assembler, "assembler-9", false),
            Err(GraphError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn settings_update_marks_all_dirty() {
        let (mut e, f) = engine();
        let r = e.add_node(NodeKind::recipe(f.gear_recipe)).unwrap();
        let s = e.add_node(NodeKind::Supplier { item: f.iron_plate }).unwrap();
        let c = e
            .add_node(NodeKind::Consumer {
                item: f.gear,
                pull: true,
            })
            .unwrap();
        e.set_rate_lock(c, Some(1.0)).unwrap();
        e.connect(s, r, f.iron_plate).unwrap();
        e.connect(r, c, f.gear).unwrap();
        assert!(approx(e.assembler_count(r).unwrap(), 0.5));

        let settings = SolverSettings {
            round_assembler_count: true,
            ..e.settings().clone()
        };
        e.update_settings(settings);
        assert_eq!(e.assembler_count(r), Some(1.0));
    }

    // -----------------------------------------------------------------------
    // Persistence and catalog swaps
    // -----------------------------------------------------------------------

    #[test]
    fn load_state_replaces_graph() {
        let (mut e, f) = engine();
        gear_line(&mut e, &f, 10.0);
        let state = e.export();

        let (mut other, _) = engine();
        let report = other.load_state(&state).unwrap();
        assert!(report.is_complete());
        assert_eq!(other.graph().node_count(), 3);
        let gear = report.nodes[2].unwrap();
        assert!(approx(other.node_rate(gear).unwrap(), 1.0));
    }

    #[test]
    fn clear_empties_the_session() {
        let (mut e, f) = engine();
        gear_line(&mut e, &f, 10.0);
        e.clear();
        assert_eq!(e.graph().node_count(), 0);
        assert!(e.last_report().is_none());
        assert!(e.is_clean());
    }

    fn renumbered_catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        let gear = b.register_item(ItemDef {
            name: "gear".to_string(),
            kind: ItemKind::Solid,
            temperature: None,
        });
        let plate = b.register_item(ItemDef {
            name: "iron-plate".to_string(),
            kind: ItemKind::Solid,
            temperature: None,
        });
        b.register_recipe(RecipeDef {
            name: "gear".to_string(),
            category: "crafting".to_string(),
            time: fixed(0.5),
            ingredients: vec![Ingredient {
                item: plate,
                quantity: fixed(2.0),
                temperature: None,
            }],
            products: vec![Product {
                item: gear,
                quantity: fixed(1.0),
                temperature: None,
            }],
        });
        b.register_assembler(AssemblerDef {
            name: "assembler-1".to_string(),
            categories: vec!["crafting".to_string()],
            speed: fixed(1.0),
            productivity: fixed(0.0),
            module_slots: 0,
            is_miner: false,
            energy_usage: None,
        });
        b.build().unwrap()
    }

    #[test]
    fn replace_catalog_rebinds_by_name() {
        let (mut e, f) = engine();
        let (_, _, c, _) = gear_line(&mut e, &f, 10.0);
        let extra = e.add_node(NodeKind::recipe(f.cable_recipe)).unwrap();
        assert!(e.graph().contains_node(extra));
        assert!(approx(e.node_rate(c).unwrap(), 1.0));

        let report = e.replace_catalog(Arc::new(renumbered_catalog())).unwrap();
        assert_eq!(report.rejected_nodes.len(), 1, "cable recipe is gone");
        assert_eq!(e.graph().node_count(), 3);

        // The gear recipe is twice as fast in the new catalog.
        let consumer = report.nodes[2].unwrap();
        assert!(approx(e.node_rate(consumer).unwrap(), 2.0));
    }

    #[test]
    fn summary_reflects_engine_state() {
        let (mut e, f) = engine();
        gear_line(&mut e, &f, 10.0);
        let summary = e.summary();
        assert!(approx(summary.item_totals(f.gear).consumed, 1.0));
    }
}
