//! Node and link types of the production graph.
//!
//! A node is a tagged variant ([`NodeKind`]) plus configuration common to all
//! kinds. Rate results are written by the solver only; structural fields are
//! changed through [`Graph`](crate::graph::Graph) methods.

use crate::catalog::{Catalog, TemperatureRange};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::settings::Rounding;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node configuration
// ---------------------------------------------------------------------------

/// Which assembler a recipe node runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblerChoice {
    /// Pick according to the global selection style.
    #[default]
    Auto,
    Fixed(AssemblerId),
}

/// How many assemblers a recipe node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblerCount {
    /// Scale to demand.
    #[default]
    Auto,
    /// Run exactly this many assemblers at full speed.
    Fixed(u32),
}

/// Beacons affecting a recipe node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub beacon: BeaconId,
    pub modules: Vec<ModuleId>,
    /// Number of beacons in range; fractional averages are allowed.
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeNode {
    pub recipe: RecipeId,
    pub assembler: AssemblerChoice,
    pub modules: Vec<ModuleId>,
    pub beacon: Option<BeaconConfig>,
    pub count: AssemblerCount,
    /// Overrides the global rounding policy when set.
    pub rounding: Option<Rounding>,
    /// Extra productivity (mining research and the like).
    pub extra_productivity: f64,
}

impl RecipeNode {
    pub fn new(recipe: RecipeId) -> Self {
        Self {
            recipe,
            assembler: AssemblerChoice::Auto,
            modules: Vec::new(),
            beacon: None,
            count: AssemblerCount::Auto,
            rounding: None,
            extra_productivity: 0.0,
        }
    }
}

/// The closed set of node behaviours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Recipe(RecipeNode),
    /// Raw supply of one item.
    Supplier { item: ItemId },
    /// Terminal demand for one item. A `pull` consumer drives upstream
    /// production; a passive one takes what arrives.
    Consumer { item: ItemId, pull: bool },
    /// Forwards one item unchanged.
    Passthrough { item: ItemId },
}

impl NodeKind {
    pub fn recipe(recipe: RecipeId) -> Self {
        NodeKind::Recipe(RecipeNode::new(recipe))
    }

    pub fn is_pull_consumer(&self) -> bool {
        matches!(self, NodeKind::Consumer { pull: true, .. })
    }

    /// Input slots, one per distinct item.
    pub fn input_slots(&self, catalog: &Catalog) -> Vec<InputSlot> {
        match self {
            NodeKind::Recipe(r) => {
                let Some(def) = catalog.recipe(r.recipe) else {
                    return Vec::new();
                };
                let mut slots: Vec<InputSlot> = Vec::new();
                for ing in &def.ingredients {
                    if !slots.iter().any(|s| s.item == ing.item) {
                        slots.push(InputSlot {
                            item: ing.item,
                            temperature: ing.temperature,
                        });
                    }
                }
                slots
            }
            NodeKind::Supplier { .. } => Vec::new(),
            NodeKind::Consumer { item, .. } | NodeKind::Passthrough { item } => vec![InputSlot {
                item: *item,
                temperature: None,
            }],
        }
    }

    /// Output slots, one per distinct item.
    pub fn output_slots(&self, catalog: &Catalog) -> Vec<OutputSlot> {
        match self {
            NodeKind::Recipe(r) => {
                let Some(def) = catalog.recipe(r.recipe) else {
                    return Vec::new();
                };
                let mut slots: Vec<OutputSlot> = Vec::new();
                for p in &def.products {
                    if !slots.iter().any(|s| s.item == p.item) {
                        slots.push(OutputSlot {
                            item: p.item,
                            temperature: p.temperature,
                        });
                    }
                }
                slots
            }
            NodeKind::Supplier { item } => vec![OutputSlot {
                item: *item,
                temperature: catalog.item(*item).and_then(|d| d.temperature),
            }],
            NodeKind::Consumer { .. } => Vec::new(),
            NodeKind::Passthrough { item } => vec![OutputSlot {
                item: *item,
                temperature: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSlot {
    pub item: ItemId,
    pub temperature: Option<TemperatureRange>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSlot {
    pub item: ItemId,
    pub temperature: Option<Fixed64>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Recoverable per-node conditions surfaced to the caller after a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeIssue {
    /// A recipe ingredient has no incoming link.
    DisconnectedInput(ItemId),
    /// The node could not reach its target rate.
    InsufficientInput,
    /// Part of a cycle that stays at zero with no outside supply.
    UnsuppliedLoop,
    /// Nothing bounds an auto node's rate.
    Unbounded,
    /// A referenced catalog entity does not exist.
    MissingEntity,
    /// No enabled assembler can run the recipe.
    NoAssembler,
    DisabledRecipe,
    DisabledAssembler,
    DisabledModule,
    DisabledBeacon,
    /// More modules than the selected assembler has slots; extras ignored.
    ModulesExceedSlots,
}

impl NodeIssue {
    /// Warnings do not change rates, they only annotate the node.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            NodeIssue::DisabledRecipe
                | NodeIssue::DisabledAssembler
                | NodeIssue::DisabledModule
                | NodeIssue::DisabledBeacon
                | NodeIssue::ModulesExceedSlots
                | NodeIssue::NoAssembler
        )
    }
}

/// Rate of one item through one slot, in the current rate unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotRate {
    pub item: ItemId,
    pub rate: f64,
}

/// Last computed state of a node. All rates are in the current rate unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// Crafts per unit time for recipe nodes, items per unit time otherwise.
    pub rate: f64,
    pub inputs: Vec<SlotRate>,
    pub outputs: Vec<SlotRate>,
    /// Assembler count after rounding (recipe nodes only).
    pub assembler_count: Option<f64>,
    /// Assembler actually used by an auto node.
    pub assembler: Option<AssemblerId>,
    /// Energy draw in watts, when the assembler declares one.
    pub energy: Option<f64>,
    pub issues: Vec<NodeIssue>,
}

impl NodeResult {
    pub fn has_issue(&self, issue: &NodeIssue) -> bool {
        self.issues.contains(issue)
    }

    pub fn input_rate(&self, item: ItemId) -> f64 {
        self.inputs
            .iter()
            .filter(|s| s.item == item)
            .map(|s| s.rate)
            .sum()
    }

    pub fn output_rate(&self, item: ItemId) -> f64 {
        self.outputs
            .iter()
            .filter(|s| s.item == item)
            .map(|s| s.rate)
            .sum()
    }
}

/// Per-second solver state kept between solves for warm starting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct NodeFlow {
    pub throughput: f64,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub enabled: bool,
    /// Manual rate per second: crafts for recipe nodes, items otherwise.
    pub rate_lock: Option<f64>,
    pub low_priority: bool,
    /// Relative share when competing for a limited output.
    pub weight: f64,
    pub result: NodeResult,
    pub(crate) flow: NodeFlow,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            enabled: true,
            rate_lock: None,
            low_priority: false,
            weight: 1.0,
            result: NodeResult::default(),
            flow: NodeFlow::default(),
        }
    }

    pub fn as_recipe(&self) -> Option<&RecipeNode> {
        match &self.kind {
            NodeKind::Recipe(r) => Some(r),
            _ => None,
        }
    }

    /// Item of a single-item node.
    pub fn item(&self) -> Option<ItemId> {
        match self.kind {
            NodeKind::Recipe(_) => None,
            NodeKind::Supplier { item }
            | NodeKind::Consumer { item, .. }
            | NodeKind::Passthrough { item } => Some(item),
        }
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// Per-second solver state of a link, kept for warm starts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct LinkFlow {
    /// Delivered rate.
    pub rate: f64,
    /// Amount the producer allocated to this link.
    pub offer: f64,
    /// Demand that scales upstream production.
    pub driven: f64,
    /// Opportunistic demand, possibly infinite.
    pub passive: f64,
}

impl LinkFlow {
    pub fn requested(&self) -> f64 {
        self.driven + self.passive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub producer: NodeId,
    pub consumer: NodeId,
    pub item: ItemId,
    /// Delivered rate in the current rate unit.
    pub rate: f64,
    /// The consumer's driven request was not met in full.
    pub starved: bool,
    pub(crate) flow: LinkFlow,
}

impl Link {
    pub(crate) fn new(producer: NodeId, consumer: NodeId, item: ItemId) -> Self {
        Self {
            producer,
            consumer,
            item,
            rate: 0.0,
            starved: false,
            flow: LinkFlow::default(),
        }
    }
}
