//! Global solver configuration.
//!
//! Everything that changes per-node coefficients for the whole graph lives
//! here and is passed explicitly into each solve. Any change to these values
//! marks every node dirty.

use crate::catalog::{Catalog, EntityKind, EntityRef};
use crate::id::RecipeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Rate unit
// ---------------------------------------------------------------------------

/// Time base used for every computed rate exposed by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RateUnit {
    #[default]
    PerSecond,
    PerMinute,
    PerHour,
    Custom { seconds: f64 },
}

impl RateUnit {
    /// Length of the unit's time base in seconds.
    pub fn seconds(&self) -> f64 {
        match *self {
            RateUnit::PerSecond => 1.0,
            RateUnit::PerMinute => 60.0,
            RateUnit::PerHour => 3600.0,
            RateUnit::Custom { seconds } => seconds,
        }
    }

    /// Convert a per-second rate into this unit.
    pub fn from_per_second(&self, rate: f64) -> f64 {
        rate * self.seconds()
    }

    /// Convert a rate expressed in this unit back to per-second.
    pub fn to_per_second(&self, rate: f64) -> f64 {
        rate / self.seconds()
    }

    pub fn is_valid(&self) -> bool {
        let s = self.seconds();
        s.is_finite() && s > 0.0
    }

    /// Short label such as `/s` or `/min`.
    pub fn label(&self) -> String {
        match *self {
            RateUnit::PerSecond => "/s".to_string(),
            RateUnit::PerMinute => "/min".to_string(),
            RateUnit::PerHour => "/h".to_string(),
            RateUnit::Custom { seconds } => format!("/{seconds}s"),
        }
    }
}

// ---------------------------------------------------------------------------
// Assembler selection and rounding
// ---------------------------------------------------------------------------

/// How an "auto" recipe node picks its assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblerSelection {
    #[default]
    Fastest,
    Slowest,
    MostModules,
    LeastModules,
}

/// How assembler counts are derived from fractional throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rounding {
    /// Round up to a buildable count.
    Up,
    /// Report the fractional count.
    #[default]
    Exact,
}

// ---------------------------------------------------------------------------
// Enabled objects
// ---------------------------------------------------------------------------

/// Per-category sets of enabled catalog names.
///
/// A category set to `None` is unrestricted: every entity of that kind is
/// enabled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnabledObjects {
    #[serde(rename = "EnabledRecipes", default)]
    pub recipes: Option<BTreeSet<String>>,
    #[serde(rename = "EnabledAssemblers", default)]
    pub assemblers: Option<BTreeSet<String>>,
    #[serde(rename = "EnabledModules", default)]
    pub modules: Option<BTreeSet<String>>,
    #[serde(rename = "EnabledBeacons", default)]
    pub beacons: Option<BTreeSet<String>>,
    #[serde(rename = "EnabledTechnologies", default)]
    pub technologies: Option<BTreeSet<String>>,
}

impl EnabledObjects {
    /// Everything enabled, without listing names.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Every entity of the catalog listed explicitly.
    pub fn all_of(catalog: &Catalog) -> Self {
        Self {
            recipes: Some(catalog.recipes().map(|(_, d)| d.name.clone()).collect()),
            assemblers: Some(catalog.assemblers().map(|(_, d)| d.name.clone()).collect()),
            modules: Some(catalog.modules().map(|(_, d)| d.name.clone()).collect()),
            beacons: Some(catalog.beacons().map(|(_, d)| d.name.clone()).collect()),
            technologies: Some(catalog.technologies().map(|(_, d)| d.name.clone()).collect()),
        }
    }

    fn category(&self, kind: EntityKind) -> Option<&Option<BTreeSet<String>>> {
        match kind {
            EntityKind::Recipe => Some(&self.recipes),
            EntityKind::Assembler => Some(&self.assemblers),
            EntityKind::Module => Some(&self.modules),
            EntityKind::Beacon => Some(&self.beacons),
            EntityKind::Technology => Some(&self.technologies),
            EntityKind::Item => None,
        }
    }

    fn category_mut(&mut self, kind: EntityKind) -> Option<&mut Option<BTreeSet<String>>> {
        match kind {
            EntityKind::Recipe => Some(&mut self.recipes),
            EntityKind::Assembler => Some(&mut self.assemblers),
            EntityKind::Module => Some(&mut self.modules),
            EntityKind::Beacon => Some(&mut self.beacons),
            EntityKind::Technology => Some(&mut self.technologies),
            EntityKind::Item => None,
        }
    }

    /// Whether the named entity is enabled. Items are always enabled.
    pub fn is_enabled(&self, kind: EntityKind, name: &str) -> bool {
        match self.category(kind) {
            Some(Some(set)) => set.contains(name),
            _ => true,
        }
    }

    /// Whether a resolved catalog entity is enabled.
    pub fn is_entity_enabled(&self, catalog: &Catalog, entity: EntityRef) -> bool {
        let kind = match entity {
            EntityRef::Item(_) => return true,
            EntityRef::Recipe(_) => EntityKind::Recipe,
            EntityRef::Assembler(_) => EntityKind::Assembler,
            EntityRef::Module(_) => EntityKind::Module,
            EntityRef::Beacon(_) => EntityKind::Beacon,
            EntityRef::Technology(_) => EntityKind::Technology,
        };
        catalog
            .name_of(entity)
            .is_some_and(|name| self.is_enabled(kind, name))
    }

    /// Enable or disable one entity. An unrestricted category is first
    /// expanded to the full list from the catalog.
    pub fn set(&mut self, catalog: &Catalog, kind: EntityKind, name: &str, enabled: bool) {
        let Some(slot) = self.category_mut(kind) else {
            return;
        };
        let set = slot.get_or_insert_with(|| all_names(catalog, kind));
        if enabled {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    /// A recipe is available when it is enabled and, if any technology
    /// unlocks it, at least one of those technologies is enabled.
    pub fn recipe_available(&self, catalog: &Catalog, recipe: RecipeId) -> bool {
        if !self.is_entity_enabled(catalog, EntityRef::Recipe(recipe)) {
            return false;
        }
        let unlockers = catalog.unlocked_by(recipe);
        unlockers.is_empty()
            || unlockers
                .iter()
                .any(|&t| self.is_entity_enabled(catalog, EntityRef::Technology(t)))
    }

    /// Drop names the catalog does not know about.
    pub fn retain_known(&mut self, catalog: &Catalog) {
        for kind in [
            EntityKind::Recipe,
            EntityKind::Assembler,
            EntityKind::Module,
            EntityKind::Beacon,
            EntityKind::Technology,
        ] {
            if let Some(Some(set)) = self.category_mut(kind) {
                set.retain(|name| catalog.lookup(kind, name).is_ok());
            }
        }
    }
}

fn all_names(catalog: &Catalog, kind: EntityKind) -> BTreeSet<String> {
    match kind {
        EntityKind::Recipe => catalog.recipes().map(|(_, d)| d.name.clone()).collect(),
        EntityKind::Assembler => catalog.assemblers().map(|(_, d)| d.name.clone()).collect(),
        EntityKind::Module => catalog.modules().map(|(_, d)| d.name.clone()).collect(),
        EntityKind::Beacon => catalog.beacons().map(|(_, d)| d.name.clone()).collect(),
        EntityKind::Technology => catalog.technologies().map(|(_, d)| d.name.clone()).collect(),
        EntityKind::Item => BTreeSet::new(),
    }
}

// ---------------------------------------------------------------------------
// SolverSettings
// ---------------------------------------------------------------------------

/// Configuration object handed to every solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub rate_unit: RateUnit,
    pub enabled: EnabledObjects,
    /// Divisor applied to the allocation weight of low-priority nodes.
    pub low_priority_power: f64,
    /// Let passive, uncapped consumers compete with driven demand.
    pub pull_output_nodes: bool,
    /// Weight multiplier for consumers that take everything they are offered.
    pub pull_output_nodes_power: f64,
    /// Default rounding for nodes without their own policy: `Up` when set.
    pub round_assembler_count: bool,
    pub extra_productivity_for_non_miners: bool,
    pub default_assembler: AssemblerSelection,
    /// Fraction of each recipe throughput correction applied per iteration.
    pub damping: f64,
    /// Relative change below which the solve is considered converged.
    pub epsilon: f64,
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rate_unit: RateUnit::PerSecond,
            enabled: EnabledObjects::unrestricted(),
            low_priority_power: 2.0,
            pull_output_nodes: false,
            pull_output_nodes_power: 1.0,
            round_assembler_count: false,
            extra_productivity_for_non_miners: false,
            default_assembler: AssemblerSelection::Fastest,
            damping: 0.8,
            epsilon: 1e-9,
            max_iterations: 1000,
        }
    }
}

impl SolverSettings {
    pub fn default_rounding(&self) -> Rounding {
        if self.round_assembler_count {
            Rounding::Up
        } else {
            Rounding::Exact
        }
    }

    /// Replace out-of-range tuning values with their defaults.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut s = self.clone();
        if !(s.damping > 0.0 && s.damping <= 1.0) {
            s.damping = defaults.damping;
        }
        if !(s.epsilon > 0.0 && s.epsilon.is_finite()) {
            s.epsilon = defaults.epsilon;
        }
        if !(s.low_priority_power >= 1.0 && s.low_priority_power.is_finite()) {
            s.low_priority_power = defaults.low_priority_power;
        }
        if !(s.pull_output_nodes_power > 0.0 && s.pull_output_nodes_power.is_finite()) {
            s.pull_output_nodes_power = defaults.pull_output_nodes_power;
        }
        if !s.rate_unit.is_valid() {
            s.rate_unit = defaults.rate_unit;
        }
        if s.max_iterations == 0 {
            s.max_iterations = 1;
        }
        s
    }
}
