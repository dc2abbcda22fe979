//! Graph-wide totals of the last solve.

use crate::catalog::Catalog;
use crate::graph::Graph;
use crate::id::{AssemblerId, ItemId, RecipeId};
use crate::node::NodeKind;
use std::collections::BTreeMap;

/// Flow of one item across the whole graph, in the current rate unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ItemTotals {
    /// Delivered by supplier nodes.
    pub supplied: f64,
    /// Taken by consumer nodes.
    pub consumed: f64,
    /// Made by recipe nodes.
    pub produced: f64,
    /// Used up by recipe nodes.
    pub ingredient: f64,
}

impl ItemTotals {
    /// Sources minus sinks. Positive values are surplus that no link carries.
    pub fn net(&self) -> f64 {
        self.supplied + self.produced - self.consumed - self.ingredient
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeTotals {
    /// Crafts per unit time summed over every node of the recipe.
    pub crafts: f64,
    pub nodes: usize,
    /// Assembler count per assembler type.
    pub assemblers: BTreeMap<AssemblerId, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSummary {
    pub items: BTreeMap<ItemId, ItemTotals>,
    pub recipes: BTreeMap<RecipeId, RecipeTotals>,
    /// Watts over every node that reports an energy draw.
    pub energy: f64,
    /// Nodes carrying at least one non-warning issue.
    pub nodes_with_errors: usize,
}

impl GraphSummary {
    /// Collect totals from the results the last solve left on each node.
    /// Disabled nodes contribute nothing.
    pub fn compute(graph: &Graph, catalog: &Catalog) -> Self {
        let mut summary = GraphSummary::default();
        for (_, node) in graph.nodes() {
            if node.result.issues.iter().any(|i| !i.is_warning()) {
                summary.nodes_with_errors += 1;
            }
            if !node.enabled {
                continue;
            }
            let result = &node.result;
            match &node.kind {
                NodeKind::Recipe(r) => {
                    for slot in &result.inputs {
                        summary.item(slot.item).ingredient += slot.rate;
                    }
                    for slot in &result.outputs {
                        summary.item(slot.item).produced += slot.rate;
                    }
                    if catalog.recipe(r.recipe).is_none() {
                        continue;
                    }
                    let totals = summary.recipes.entry(r.recipe).or_default();
                    totals.crafts += result.rate;
                    totals.nodes += 1;
                    if let (Some(a), Some(count)) = (result.assembler, result.assembler_count) {
                        *totals.assemblers.entry(a).or_default() += count;
                    }
                }
                NodeKind::Supplier { item } => summary.item(*item).supplied += result.rate,
                NodeKind::Consumer { item, .. } => summary.item(*item).consumed += result.rate,
                NodeKind::Passthrough { .. } => {}
            }
            summary.energy += result.energy.unwrap_or(0.0);
        }
        summary
    }

    fn item(&mut self, item: ItemId) -> &mut ItemTotals {
        self.items.entry(item).or_default()
    }

    pub fn item_totals(&self, item: ItemId) -> ItemTotals {
        self.items.get(&item).copied().unwrap_or_default()
    }

    /// Items with more supply than use, largest surplus first.
    pub fn surplus(&self) -> Vec<(ItemId, f64)> {
        let mut out: Vec<(ItemId, f64)> = self
            .items
            .iter()
            .map(|(&item, t)| (item, t.net()))
            .filter(|&(_, net)| net > 1e-9)
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SolverSettings;
    use crate::solver::{SolveScope, solve};
    use crate::test_utils::*;

    #[test]
    fn totals_follow_solved_rates() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 10.0);
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 1));
        let c = add_consumer(&mut g, &catalog, f.gear, true, None);
        link(&mut g, &catalog, s, r, f.iron_plate);
        link(&mut g, &catalog, r, c, f.gear);
        solve(&mut g, &catalog, &SolverSettings::default(), &SolveScope::All);

        let summary = GraphSummary::compute(&g, &catalog);
        let plate = summary.item_totals(f.iron_plate);
        assert!(approx(plate.supplied, 2.0));
        assert!(approx(plate.ingredient, 2.0));
        assert!(approx(plate.net(), 0.0));

        let gear = summary.item_totals(f.gear);
        assert!(approx(gear.produced, 1.0));
        assert!(approx(gear.consumed, 1.0));

        let recipe = &summary.recipes[&f.gear_recipe];
        assert_eq!(recipe.nodes, 1);
        assert!(approx(recipe.crafts, 1.0));
        assert_eq!(recipe.assemblers.get(&f.assembler_1), Some(&1.0));
        assert!(approx(summary.energy, 75_000.0));
        assert_eq!(summary.nodes_with_errors, 0);
        assert!(summary.surplus().is_empty());
    }

    #[test]
    fn byproduct_shows_as_surplus() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.crude, 2.0);
        let r = add(&mut g, &catalog, NodeKind::recipe(f.refine_recipe));
        let c = add_consumer(&mut g, &catalog, f.fuel, false, None);
        link(&mut g, &catalog, s, r, f.crude);
        link(&mut g, &catalog, r, c, f.fuel);
        solve(&mut g, &catalog, &SolverSettings::default(), &SolveScope::All);

        let summary = GraphSummary::compute(&g, &catalog);
        let surplus = summary.surplus();
        assert_eq!(surplus.len(), 1);
        assert_eq!(surplus[0].0, f.residue);
        assert!(approx(surplus[0].1, 1.0));
    }

    #[test]
    fn empty_graph_has_empty_summary() {
        let (catalog, _) = fixture_catalog();
        let summary = GraphSummary::compute(&Graph::new(), &catalog);
        assert_eq!(summary, GraphSummary::default());
    }
}
