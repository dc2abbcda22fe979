//! Name-based graph state for saving, loading and catalog swaps.
//!
//! A [`GraphState`] references catalog entities by name and nodes by their
//! index in the record list, so it survives a catalog reload that renumbers
//! every id. Solver results are never part of it.

use crate::catalog::{Catalog, EntityKind};
use crate::graph::{Graph, GraphError, StaleSet};
use crate::id::*;
use crate::node::*;
use crate::settings::Rounding;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current graph state version. Increment when breaking the record layout.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The state as a whole cannot be read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("graph state from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
}

/// Why a single node or link record was skipped during import.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("link references node record {0}, which was not imported")]
    MissingNode(usize),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconRecord {
    pub beacon: String,
    #[serde(default)]
    pub modules: Vec<String>,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindRecord {
    Recipe {
        recipe: String,
        /// `None` picks automatically.
        #[serde(default)]
        assembler: Option<String>,
        #[serde(default)]
        modules: Vec<String>,
        #[serde(default)]
        beacon: Option<BeaconRecord>,
        /// `None` scales to demand.
        #[serde(default)]
        count: Option<u32>,
        #[serde(default)]
        rounding: Option<Rounding>,
        #[serde(default)]
        extra_productivity: f64,
    },
    Supplier {
        item: String,
    },
    Consumer {
        item: String,
        #[serde(default)]
        pull: bool,
    },
    Passthrough {
        item: String,
    },
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub kind: NodeKindRecord,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Manual rate per second.
    #[serde(default)]
    pub rate_lock: Option<f64>,
    #[serde(default)]
    pub low_priority: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Canvas position. Carried for the caller, ignored by the graph.
    #[serde(default)]
    pub position: Option<(f64, f64)>,
}

impl NodeRecord {
    pub fn new(kind: NodeKindRecord) -> Self {
        Self {
            kind,
            enabled: true,
            rate_lock: None,
            low_priority: false,
            weight: 1.0,
            position: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Index into [`GraphState::nodes`].
    pub producer: usize,
    pub consumer: usize,
    pub item: String,
}

/// What [`Graph::import`] did with each record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// New id of each node record, `None` where it was rejected.
    pub nodes: Vec<Option<NodeId>>,
    pub rejected_nodes: Vec<(usize, RecordError)>,
    pub rejected_links: Vec<(usize, RecordError)>,
    /// Every node added by the import.
    pub stale: StaleSet,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.rejected_nodes.is_empty() && self.rejected_links.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

impl Graph {
    /// Export the structural state. Nodes whose references the catalog
    /// cannot name are skipped together with their links.
    pub fn export(&self, catalog: &Catalog) -> GraphState {
        let mut state = GraphState::default();
        let mut index: HashMap<NodeId, usize> = HashMap::new();

        for (id, node) in self.nodes() {
            let Some(kind) = export_kind(catalog, &node.kind) else {
                tracing::warn!(node = ?id, "skipping node with unknown catalog references");
                continue;
            };
            index.insert(id, state.nodes.len());
            state.nodes.push(NodeRecord {
                kind,
                enabled: node.enabled,
                rate_lock: node.rate_lock,
                low_priority: node.low_priority,
                weight: node.weight,
                position: None,
            });
        }

        for (_, link) in self.links() {
            let (Some(&producer), Some(&consumer), Some(item)) = (
                index.get(&link.producer),
                index.get(&link.consumer),
                catalog.item(link.item),
            ) else {
                continue;
            };
            state.links.push(LinkRecord {
                producer,
                consumer,
                item: item.name.clone(),
            });
        }
        state
    }
}

fn export_kind(catalog: &Catalog, kind: &NodeKind) -> Option<NodeKindRecord> {
    let item_name = |id: ItemId| catalog.item(id).map(|d| d.name.clone());
    let module_names = |ids: &[ModuleId]| -> Option<Vec<String>> {
        ids.iter()
            .map(|&m| catalog.module(m).map(|d| d.name.clone()))
            .collect()
    };

    Some(match kind {
        NodeKind::Recipe(r) => NodeKindRecord::Recipe {
            recipe: catalog.recipe(r.recipe)?.name.clone(),
            assembler: match r.assembler {
                AssemblerChoice::Auto => None,
                AssemblerChoice::Fixed(a) => Some(catalog.assembler(a)?.name.clone()),
            },
            modules: module_names(&r.modules)?,
            beacon: match &r.beacon {
                None => None,
                Some(b) => Some(BeaconRecord {
                    beacon: catalog.beacon(b.beacon)?.name.clone(),
                    modules: module_names(&b.modules)?,
                    count: b.count,
                }),
            },
            count: match r.count {
                AssemblerCount::Auto => None,
                AssemblerCount::Fixed(n) => Some(n),
            },
            rounding: r.rounding,
            extra_productivity: r.extra_productivity,
        },
        NodeKind::Supplier { item } => NodeKindRecord::Supplier {
            item: item_name(*item)?,
        },
        NodeKind::Consumer { item, pull } => NodeKindRecord::Consumer {
            item: item_name(*item)?,
            pull: *pull,
        },
        NodeKind::Passthrough { item } => NodeKindRecord::Passthrough {
            item: item_name(*item)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn missing(kind: EntityKind, name: &str) -> GraphError {
    GraphError::UnknownEntity {
        kind,
        name: name.to_string(),
    }
}

fn resolve_item(catalog: &Catalog, name: &str) -> Result<ItemId, GraphError> {
    catalog.item_id(name).ok_or_else(|| missing(EntityKind::Item, name))
}

fn resolve_modules(catalog: &Catalog, names: &[String]) -> Result<Vec<ModuleId>, GraphError> {
    names
        .iter()
        .map(|n| {
            catalog
                .module_id(n)
                .ok_or_else(|| missing(EntityKind::Module, n))
        })
        .collect()
}

/// Turn a name-based kind into one bound to `catalog`.
pub fn resolve_kind(catalog: &Catalog, record: &NodeKindRecord) -> Result<NodeKind, GraphError> {
    Ok(match record {
        NodeKindRecord::Recipe {
            recipe,
            assembler,
            modules,
            beacon,
            count,
            rounding,
            extra_productivity,
        } => {
            let id = catalog
                .recipe_id(recipe)
                .ok_or_else(|| missing(EntityKind::Recipe, recipe))?;
            let assembler = match assembler {
                None => AssemblerChoice::Auto,
                Some(name) => AssemblerChoice::Fixed(
                    catalog
                        .assembler_id(name)
                        .ok_or_else(|| missing(EntityKind::Assembler, name))?,
                ),
            };
            let beacon = match beacon {
                None => None,
                Some(b) => Some(BeaconConfig {
                    beacon: catalog
                        .beacon_id(&b.beacon)
                        .ok_or_else(|| missing(EntityKind::Beacon, &b.beacon))?,
                    modules: resolve_modules(catalog, &b.modules)?,
                    count: b.count,
                }),
            };
            NodeKind::Recipe(RecipeNode {
                recipe: id,
                assembler,
                modules: resolve_modules(catalog, modules)?,
                beacon,
                count: count.map_or(AssemblerCount::Auto, AssemblerCount::Fixed),
                rounding: *rounding,
                extra_productivity: *extra_productivity,
            })
        }
        NodeKindRecord::Supplier { item } => NodeKind::Supplier {
            item: resolve_item(catalog, item)?,
        },
        NodeKindRecord::Consumer { item, pull } => NodeKind::Consumer {
            item: resolve_item(catalog, item)?,
            pull: *pull,
        },
        NodeKindRecord::Passthrough { item } => NodeKind::Passthrough {
            item: resolve_item(catalog, item)?,
        },
    })
}

impl Graph {
    /// Append the nodes and links of `state` to this graph.
    ///
    /// Records that fail to resolve or validate are skipped and listed in
    /// the report; everything else is imported. Links touching a skipped
    /// node are skipped too.
    pub fn import(
        &mut self,
        catalog: &Catalog,
        state: &GraphState,
    ) -> Result<ImportReport, StateError> {
        if state.version > FORMAT_VERSION {
            return Err(StateError::FutureVersion(state.version));
        }

        let mut report = ImportReport::default();
        for (i, record) in state.nodes.iter().enumerate() {
            match self.import_node(catalog, record) {
                Ok(id) => {
                    report.nodes.push(Some(id));
                    report.stale.insert(id);
                }
                Err(e) => {
                    tracing::warn!(record = i, error = %e, "skipping node record");
                    report.nodes.push(None);
                    report.rejected_nodes.push((i, e.into()));
                }
            }
        }

        for (i, record) in state.links.iter().enumerate() {
            if let Err(e) = self.import_link(catalog, record, &report.nodes) {
                tracing::warn!(record = i, error = %e, "skipping link record");
                report.rejected_links.push((i, e));
            }
        }
        Ok(report)
    }

    fn import_node(&mut self, catalog: &Catalog, record: &NodeRecord) -> Result<NodeId, GraphError> {
        if let Some(r) = record.rate_lock
            && !(r.is_finite() && r >= 0.0)
        {
            return Err(GraphError::InvalidRate(r));
        }
        if !(record.weight.is_finite() && record.weight > 0.0) {
            return Err(GraphError::InvalidWeight(record.weight));
        }
        let kind = resolve_kind(catalog, &record.kind)?;
        let (id, _) = self.add_node(catalog, kind)?;
        if let Some(node) = self.node_mut(id) {
            node.enabled = record.enabled;
            node.rate_lock = record.rate_lock;
            node.low_priority = record.low_priority;
            node.weight = record.weight;
        }
        Ok(id)
    }

    fn import_link(
        &mut self,
        catalog: &Catalog,
        record: &LinkRecord,
        nodes: &[Option<NodeId>],
    ) -> Result<LinkId, RecordError> {
        let node_at = |i: usize| {
            nodes
                .get(i)
                .copied()
                .flatten()
                .ok_or(RecordError::MissingNode(i))
        };
        let producer = node_at(record.producer)?;
        let consumer = node_at(record.consumer)?;
        let item = resolve_item(catalog, &record.item)?;
        let (link, _) = self.connect(catalog, producer, consumer, item)?;
        Ok(link)
    }
}

/// Ids of every node in `report` that was imported.
pub fn imported_nodes(report: &ImportReport) -> BTreeSet<NodeId> {
    report.nodes.iter().flatten().copied().collect()
}
