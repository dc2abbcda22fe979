use crate::catalog::{Catalog, EntityKind};
use crate::id::*;
use crate::node::*;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{BTreeSet, VecDeque};

/// Nodes whose computed rates are out of date after a mutation.
pub type StaleSet = BTreeSet<NodeId>;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural errors. A mutation that returns one leaves the graph unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("link not found: {0:?}")]
    LinkNotFound(LinkId),
    #[error("node {node:?} has no output slot for item {item:?}")]
    NoOutputSlot { node: NodeId, item: ItemId },
    #[error("node {node:?} has no input slot for item {item:?}")]
    NoInputSlot { node: NodeId, item: ItemId },
    #[error("a link {producer:?} -> {consumer:?} for item {item:?} already exists")]
    DuplicateLink {
        producer: NodeId,
        consumer: NodeId,
        item: ItemId,
    },
    #[error("fluid {item:?} arrives at a temperature the consumer does not accept")]
    TemperatureMismatch { item: ItemId },
    #[error("{requested} modules requested but only {slots} slots available")]
    TooManyModules { slots: u32, requested: usize },
    #[error("module {module:?} cannot be used with this recipe")]
    ModuleNotAllowed { module: ModuleId },
    #[error("assembler {assembler:?} cannot craft this recipe")]
    AssemblerCannotCraft { assembler: AssemblerId },
    #[error("unknown {kind} '{name}'")]
    UnknownEntity { kind: EntityKind, name: String },
    #[error("invalid rate {0}")]
    InvalidRate(f64),
    #[error("invalid weight {0}")]
    InvalidWeight(f64),
    #[error("operation does not apply to node {0:?}")]
    WrongNodeKind(NodeId),
}

pub(crate) fn unknown(kind: EntityKind, index: u32) -> GraphError {
    GraphError::UnknownEntity {
        kind,
        name: format!("#{index}"),
    }
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Links entering and leaving a node.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    inputs: Vec<LinkId>,
    outputs: Vec<LinkId>,
}

/// The production graph: arena-stored nodes and item-typed links.
///
/// Cycles are allowed. Every structural mutation validates its input
/// against the catalog and returns the [`StaleSet`] of nodes whose rates
/// need solving.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    links: SlotMap<LinkId, Link>,
    adjacency: SecondaryMap<NodeId, NodeAdjacency>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Add a node. Catalog references in `kind` are validated first.
    pub fn add_node(
        &mut self,
        catalog: &Catalog,
        kind: NodeKind,
    ) -> Result<(NodeId, StaleSet), GraphError> {
        validate_kind(catalog, &kind)?;
        let id = self.nodes.insert(Node::new(kind));
        self.adjacency.insert(id, NodeAdjacency::default());
        Ok((id, BTreeSet::from([id])))
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, node: NodeId) -> Result<StaleSet, GraphError> {
        let mut stale = self.stale_from(node)?;
        for link in self.inputs(node).to_vec() {
            if let Some(l) = self.links.get(link) {
                stale.insert(l.producer);
            }
        }
        let touching: Vec<LinkId> = self
            .inputs(node)
            .iter()
            .chain(self.outputs(node))
            .copied()
            .collect();
        for link in touching {
            self.remove_link(link);
        }
        self.nodes.remove(node);
        self.adjacency.remove(node);
        stale.remove(&node);
        stale.retain(|n| self.nodes.contains_key(*n));
        Ok(stale)
    }

    /// Remove every node and link.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.adjacency.clear();
    }

    /// Enable or disable a node. A disabled node carries no flow.
    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) -> Result<StaleSet, GraphError> {
        let stale = self.stale_from(node)?;
        self.node_entry(node)?.enabled = enabled;
        Ok(stale)
    }

    /// Set or clear the manual per-second rate of a node.
    pub fn set_rate_lock(
        &mut self,
        node: NodeId,
        rate: Option<f64>,
    ) -> Result<StaleSet, GraphError> {
        if let Some(r) = rate
            && !(r.is_finite() && r >= 0.0)
        {
            return Err(GraphError::InvalidRate(r));
        }
        let stale = self.stale_from(node)?;
        self.node_entry(node)?.rate_lock = rate;
        Ok(stale)
    }

    pub fn set_low_priority(
        &mut self,
        node: NodeId,
        low_priority: bool,
    ) -> Result<StaleSet, GraphError> {
        let stale = self.upstream_stale(node)?;
        self.node_entry(node)?.low_priority = low_priority;
        Ok(stale)
    }

    pub fn set_weight(&mut self, node: NodeId, weight: f64) -> Result<StaleSet, GraphError> {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(GraphError::InvalidWeight(weight));
        }
        let stale = self.upstream_stale(node)?;
        self.node_entry(node)?.weight = weight;
        Ok(stale)
    }

    /// Switch a consumer between pull and passive.
    pub fn set_pull(&mut self, node: NodeId, pull: bool) -> Result<StaleSet, GraphError> {
        let stale = self.upstream_stale(node)?;
        match &mut self.node_entry(node)?.kind {
            NodeKind::Consumer { pull: p, .. } => *p = pull,
            _ => return Err(GraphError::WrongNodeKind(node)),
        }
        Ok(stale)
    }

    /// Edit a recipe node's configuration.
    ///
    /// The edit is applied to a copy and validated against the catalog and
    /// the node's existing links before it is committed.
    pub fn configure_recipe<F>(
        &mut self,
        catalog: &Catalog,
        node: NodeId,
        edit: F,
    ) -> Result<StaleSet, GraphError>
    where
        F: FnOnce(&mut RecipeNode),
    {
        let current = self.node(node).ok_or(GraphError::NodeNotFound(node))?;
        let NodeKind::Recipe(recipe) = &current.kind else {
            return Err(GraphError::WrongNodeKind(node));
        };
        let mut edited = recipe.clone();
        edit(&mut edited);
        let kind = NodeKind::Recipe(edited);
        validate_kind(catalog, &kind)?;
        self.check_links_fit(catalog, node, &kind)?;

        let mut stale = self.stale_from(node)?;
        stale.extend(self.upstream(node));
        self.node_entry(node)?.kind = kind;
        Ok(stale)
    }

    fn check_links_fit(
        &self,
        catalog: &Catalog,
        node: NodeId,
        kind: &NodeKind,
    ) -> Result<(), GraphError> {
        let inputs = kind.input_slots(catalog);
        let outputs = kind.output_slots(catalog);
        for l in self.inputs(node).iter().filter_map(|&l| self.links.get(l)) {
            if !inputs.iter().any(|s| s.item == l.item) {
                return Err(GraphError::NoInputSlot { node, item: l.item });
            }
        }
        for l in self.outputs(node).iter().filter_map(|&l| self.links.get(l)) {
            if !outputs.iter().any(|s| s.item == l.item) {
                return Err(GraphError::NoOutputSlot { node, item: l.item });
            }
        }
        Ok(())
    }

    fn node_entry(&mut self, node: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(node).ok_or(GraphError::NodeNotFound(node))
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Connect `producer`'s output slot for `item` to `consumer`'s input slot.
    pub fn connect(
        &mut self,
        catalog: &Catalog,
        producer: NodeId,
        consumer: NodeId,
        item: ItemId,
    ) -> Result<(LinkId, StaleSet), GraphError> {
        let p = self.node(producer).ok_or(GraphError::NodeNotFound(producer))?;
        let c = self.node(consumer).ok_or(GraphError::NodeNotFound(consumer))?;

        let out_slot = p
            .kind
            .output_slots(catalog)
            .into_iter()
            .find(|s| s.item == item)
            .ok_or(GraphError::NoOutputSlot {
                node: producer,
                item,
            })?;
        let in_slot = c
            .kind
            .input_slots(catalog)
            .into_iter()
            .find(|s| s.item == item)
            .ok_or(GraphError::NoInputSlot {
                node: consumer,
                item,
            })?;
        if let (Some(t), Some(range)) = (out_slot.temperature, in_slot.temperature)
            && !range.contains(t)
        {
            return Err(GraphError::TemperatureMismatch { item });
        }
        if self.find_link(producer, consumer, item).is_some() {
            return Err(GraphError::DuplicateLink {
                producer,
                consumer,
                item,
            });
        }

        let link = self.links.insert(Link::new(producer, consumer, item));
        if let Some(adj) = self.adjacency.get_mut(producer) {
            adj.outputs.push(link);
        }
        if let Some(adj) = self.adjacency.get_mut(consumer) {
            adj.inputs.push(link);
        }

        let mut stale = self.stale_from(consumer)?;
        stale.insert(producer);
        Ok((link, stale))
    }

    /// Remove a link.
    pub fn disconnect(&mut self, link: LinkId) -> Result<StaleSet, GraphError> {
        let l = self.links.get(link).ok_or(GraphError::LinkNotFound(link))?;
        let producer = l.producer;
        let mut stale = self.stale_from(l.consumer)?;
        stale.insert(producer);
        self.remove_link(link);
        Ok(stale)
    }

    fn remove_link(&mut self, link: LinkId) {
        if let Some(l) = self.links.remove(link) {
            if let Some(adj) = self.adjacency.get_mut(l.producer) {
                adj.outputs.retain(|&x| x != link);
            }
            if let Some(adj) = self.adjacency.get_mut(l.consumer) {
                adj.inputs.retain(|&x| x != link);
            }
        }
    }

    /// The link carrying `item` from `producer` to `consumer`, if any.
    pub fn find_link(&self, producer: NodeId, consumer: NodeId, item: ItemId) -> Option<LinkId> {
        self.outputs(producer).iter().copied().find(|&l| {
            self.links
                .get(l)
                .is_some_and(|x| x.consumer == consumer && x.item == item)
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn link(&self, link: LinkId) -> Option<&Link> {
        self.links.get(link)
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node)
    }

    pub(crate) fn link_mut(&mut self, link: LinkId) -> Option<&mut Link> {
        self.links.get_mut(link)
    }

    /// Current rate of a link, in the current rate unit.
    pub fn link_rate(&self, link: LinkId) -> Option<f64> {
        self.links.get(link).map(|l| l.rate)
    }

    /// Current throughput of a node, in the current rate unit.
    pub fn node_rate(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(node).map(|n| n.result.rate)
    }

    /// Resolved assembler count of a recipe node.
    pub fn assembler_count(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(node).and_then(|n| n.result.assembler_count)
    }

    /// Links entering a node.
    pub fn inputs(&self, node: NodeId) -> &[LinkId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Links leaving a node.
    pub fn outputs(&self, node: NodeId) -> &[LinkId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.outputs.as_slice())
            .unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.keys().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn contains_link(&self, link: LinkId) -> bool {
        self.links.contains_key(link)
    }

    // -----------------------------------------------------------------------
    // Reachability
    // -----------------------------------------------------------------------

    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs(node)
            .iter()
            .filter_map(|&l| self.links.get(l).map(|x| x.consumer))
    }

    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs(node)
            .iter()
            .filter_map(|&l| self.links.get(l).map(|x| x.producer))
    }

    fn reach(&self, start: NodeId, forward: bool) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(n) = queue.pop_front() {
            let next: Vec<NodeId> = if forward {
                self.successors(n).collect()
            } else {
                self.predecessors(n).collect()
            };
            for m in next {
                if seen.insert(m) {
                    queue.push_back(m);
                }
            }
        }
        seen
    }

    /// The node and everything reachable along links from it.
    pub fn downstream(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.reach(node, true)
    }

    /// The node and everything that reaches it along links.
    pub fn upstream(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.reach(node, false)
    }

    /// Every node connected to any of `seeds` ignoring link direction.
    pub fn connected_component(&self, seeds: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        let mut seen: BTreeSet<NodeId> = seeds
            .iter()
            .copied()
            .filter(|n| self.nodes.contains_key(*n))
            .collect();
        let mut queue: VecDeque<NodeId> = seen.iter().copied().collect();
        while let Some(n) = queue.pop_front() {
            let neighbours: Vec<NodeId> = self.successors(n).chain(self.predecessors(n)).collect();
            for m in neighbours {
                if seen.insert(m) {
                    queue.push_back(m);
                }
            }
        }
        seen
    }

    /// Split `nodes` into weakly connected components, ordered by their
    /// smallest node id.
    pub fn components(&self, nodes: &BTreeSet<NodeId>) -> Vec<BTreeSet<NodeId>> {
        let mut remaining = nodes.clone();
        let mut out = Vec::new();
        while let Some(&first) = remaining.iter().next() {
            let comp = self.connected_component(&BTreeSet::from([first]));
            remaining.retain(|n| !comp.contains(n));
            out.push(comp);
        }
        out
    }

    /// Nodes made stale by a change at `node`: itself, everything downstream,
    /// and everything upstream when it is a pull consumer.
    fn stale_from(&self, node: NodeId) -> Result<StaleSet, GraphError> {
        let n = self.nodes.get(node).ok_or(GraphError::NodeNotFound(node))?;
        let mut stale = self.downstream(node);
        if n.kind.is_pull_consumer() {
            stale.extend(self.upstream(node));
        }
        Ok(stale)
    }

    /// Changes to how a node competes for supply affect its producers too.
    fn upstream_stale(&self, node: NodeId) -> Result<StaleSet, GraphError> {
        let mut stale = self.stale_from(node)?;
        stale.extend(self.predecessors(node));
        Ok(stale)
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Order `subset` so that producers come before consumers wherever the
    /// links allow it.
    ///
    /// Kahn's algorithm restricted to the subset. When only cycle members
    /// remain, the one with the fewest unresolved inputs (then lowest id) is
    /// released, so nodes downstream of a cycle still follow it.
    pub fn feedback_order(&self, subset: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let mut in_degree: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        for &n in subset {
            if self.nodes.contains_key(n) {
                let deg = self.predecessors(n).filter(|p| subset.contains(p)).count();
                in_degree.insert(n, deg);
            }
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(n, _)| n)
            .collect();
        let mut placed: BTreeSet<NodeId> = BTreeSet::new();
        let mut order = Vec::with_capacity(in_degree.len());

        while order.len() < in_degree.len() {
            let next = match ready.pop_first() {
                Some(n) => n,
                None => {
                    let forced = in_degree
                        .iter()
                        .filter(|(n, _)| !placed.contains(n))
                        .min_by_key(|&(n, &d)| (d, n))
                        .map(|(n, _)| n);
                    match forced {
                        Some(n) => n,
                        None => break,
                    }
                }
            };
            if !placed.insert(next) {
                continue;
            }
            order.push(next);
            let succ: Vec<NodeId> = self.successors(next).collect();
            for m in succ {
                if placed.contains(&m) {
                    continue;
                }
                if let Some(d) = in_degree.get_mut(m) {
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        ready.insert(m);
                    }
                }
            }
        }
        order
    }

    /// Strongly connected components (Tarjan) of the subgraph induced by
    /// `subset`, each sorted by node id.
    pub fn strongly_connected_components(&self, subset: &BTreeSet<NodeId>) -> Vec<Vec<NodeId>> {
        let mut index: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        let mut low: SecondaryMap<NodeId, usize> = SecondaryMap::new();
        let mut on_stack: SecondaryMap<NodeId, bool> = SecondaryMap::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut next_index = 0usize;
        let mut out = Vec::new();

        let successors = |n: NodeId| -> Vec<NodeId> {
            self.successors(n).filter(|m| subset.contains(m)).collect()
        };

        for &root in subset {
            if index.contains_key(root) || !self.nodes.contains_key(root) {
                continue;
            }
            let mut call: Vec<(NodeId, Vec<NodeId>, usize)> = Vec::new();
            index.insert(root, next_index);
            low.insert(root, next_index);
            next_index += 1;
            stack.push(root);
            on_stack.insert(root, true);
            call.push((root, successors(root), 0));

            loop {
                let Some(frame) = call.last_mut() else {
                    break;
                };
                let v = frame.0;
                let next = if frame.2 < frame.1.len() {
                    frame.2 += 1;
                    Some(frame.1[frame.2 - 1])
                } else {
                    None
                };

                match next {
                    Some(w) if !index.contains_key(w) => {
                        index.insert(w, next_index);
                        low.insert(w, next_index);
                        next_index += 1;
                        stack.push(w);
                        on_stack.insert(w, true);
                        call.push((w, successors(w), 0));
                    }
                    Some(w) => {
                        if on_stack.get(w).copied().unwrap_or(false) && index[w] < low[v] {
                            low[v] = index[w];
                        }
                    }
                    None => {
                        call.pop();
                        if let Some(parent) = call.last() {
                            let p = parent.0;
                            if low[v] < low[p] {
                                low[p] = low[v];
                            }
                        }
                        if low[v] == index[v] {
                            let mut comp = Vec::new();
                            while let Some(w) = stack.pop() {
                                on_stack.insert(w, false);
                                comp.push(w);
                                if w == v {
                                    break;
                                }
                            }
                            comp.sort();
                            out.push(comp);
                        }
                    }
                }
            }
        }
        out
    }

    /// Whether any link leaves and re-enters the same node.
    pub fn has_self_link(&self, node: NodeId) -> bool {
        self.successors(node).any(|m| m == node)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_kind(catalog: &Catalog, kind: &NodeKind) -> Result<(), GraphError> {
    match kind {
        NodeKind::Recipe(r) => validate_recipe(catalog, r),
        NodeKind::Supplier { item }
        | NodeKind::Consumer { item, .. }
        | NodeKind::Passthrough { item } => match catalog.item(*item) {
            Some(_) => Ok(()),
            None => Err(unknown(EntityKind::Item, item.0)),
        },
    }
}

fn validate_recipe(catalog: &Catalog, r: &RecipeNode) -> Result<(), GraphError> {
    let recipe = catalog
        .recipe(r.recipe)
        .ok_or_else(|| unknown(EntityKind::Recipe, r.recipe.0))?;

    let mut slots = None;
    if let AssemblerChoice::Fixed(a) = r.assembler {
        let def = catalog
            .assembler(a)
            .ok_or_else(|| unknown(EntityKind::Assembler, a.0))?;
        if !def.can_craft(recipe) {
            return Err(GraphError::AssemblerCannotCraft { assembler: a });
        }
        slots = Some(def.module_slots);
    }

    for &m in &r.modules {
        let def = catalog
            .module(m)
            .ok_or_else(|| unknown(EntityKind::Module, m.0))?;
        if !def.allows(r.recipe) {
            return Err(GraphError::ModuleNotAllowed { module: m });
        }
    }
    if let Some(slots) = slots
        && r.modules.len() > slots as usize
    {
        return Err(GraphError::TooManyModules {
            slots,
            requested: r.modules.len(),
        });
    }

    if let Some(b) = &r.beacon {
        let def = catalog
            .beacon(b.beacon)
            .ok_or_else(|| unknown(EntityKind::Beacon, b.beacon.0))?;
        if b.modules.len() > def.module_slots as usize {
            return Err(GraphError::TooManyModules {
                slots: def.module_slots,
                requested: b.modules.len(),
            });
        }
        for &m in &b.modules {
            let def = catalog
                .module(m)
                .ok_or_else(|| unknown(EntityKind::Module, m.0))?;
            if !def.allows(r.recipe) {
                return Err(GraphError::ModuleNotAllowed { module: m });
            }
        }
        if !(b.count.is_finite() && b.count >= 0.0) {
            return Err(GraphError::InvalidRate(b.count));
        }
    }

    if !r.extra_productivity.is_finite() {
        return Err(GraphError::InvalidRate(r.extra_productivity));
    }
    Ok(())
}
