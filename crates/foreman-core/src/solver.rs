//! Iterative fixed-point rate solver.
//!
//! Each iteration runs three passes over one weakly connected component:
//!
//! 1. **Demand** (reverse order) -- every node turns the requests on its
//!    output links into requests on its input links. Requests carry a
//!    *driven* part, which scales auto-count producers, and a *passive*
//!    part, which only takes what is available.
//! 2. **Supply** (forward order) -- every node computes its throughput from
//!    what its producers offered, draws exactly what it consumes, and
//!    divides its output among its links with [`allocate`].
//! 3. **Settle** (reverse order) -- passthrough nodes re-balance their input
//!    draws against what their consumers actually took.
//!
//! Recipe throughput moves toward its target by a damping factor so that
//! cycles converge instead of oscillating. Iteration stops when no link rate,
//! offer or throughput changes by more than the relative epsilon, or at the
//! iteration cap. Links that close a cycle read the previous iteration's
//! values, so nothing recurses.

use crate::allocate::{Claim, allocate};
use crate::catalog::{Catalog, EntityKind};
use crate::effects::{RecipeCoefficients, recipe_coefficients};
use crate::graph::{Graph, GraphError, unknown};
use crate::id::*;
use crate::node::*;
use crate::settings::{Rounding, SolverSettings};
use std::collections::{BTreeSet, HashMap};

/// Relative slack used when deciding whether a node fell short of a target.
const FLAG_TOLERANCE: f64 = 1e-6;
/// Absolute floor below which a rate counts as zero.
const ZERO_RATE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Which part of the graph to solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveScope {
    All,
    /// The given nodes and every node weakly connected to them.
    Nodes(BTreeSet<NodeId>),
}

/// Outcome of one call to [`solve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveReport {
    /// Largest iteration count over the solved components.
    pub iterations: u32,
    /// Whether every component reached the convergence threshold.
    pub converged: bool,
    /// Largest relative change seen in the final iteration.
    pub residual: f64,
    pub solved_nodes: usize,
    pub components: usize,
    /// Nodes that reference entities missing from the catalog.
    pub errors: Vec<(NodeId, GraphError)>,
}

/// Recompute rates for the nodes in `scope` and everything connected to them.
///
/// Nodes outside the affected components keep their previous results.
/// Deterministic for a given graph, catalog, settings and scope.
pub fn solve(
    graph: &mut Graph,
    catalog: &Catalog,
    settings: &SolverSettings,
    scope: &SolveScope,
) -> SolveReport {
    let settings = settings.sanitized();
    let seeds = match scope {
        SolveScope::All => graph.node_ids(),
        SolveScope::Nodes(nodes) => nodes.clone(),
    };
    let region = graph.connected_component(&seeds);
    let components = graph.components(&region);

    let mut report = SolveReport {
        converged: true,
        solved_nodes: region.len(),
        components: components.len(),
        ..Default::default()
    };
    if region.is_empty() {
        return report;
    }
    tracing::debug!(
        nodes = region.len(),
        components = components.len(),
        "solving production graph"
    );

    let sccs = graph.strongly_connected_components(&region);
    let scc_of: HashMap<NodeId, usize> = sccs
        .iter()
        .enumerate()
        .flat_map(|(i, scc)| scc.iter().map(move |&n| (n, i)))
        .collect();
    for component in &components {
        let mut problem = Problem::build(
            graph,
            catalog,
            &settings,
            component,
            &scc_of,
            &mut report.errors,
        );
        let (iterations, converged, residual) = problem.run(&settings);
        problem.flag_unsupplied_loops(graph, &sccs);
        problem.write_back(graph, &settings);

        report.iterations = report.iterations.max(iterations);
        report.converged &= converged;
        report.residual = report.residual.max(residual);
    }

    if report.converged {
        tracing::debug!(iterations = report.iterations, "solve converged");
    } else {
        tracing::warn!(
            iterations = report.iterations,
            residual = report.residual,
            "solve stopped at the iteration cap without converging"
        );
    }
    report
}

// ---------------------------------------------------------------------------
// Working representation
// ---------------------------------------------------------------------------

/// Links of one node attached to the same item, with the per-unit quantity.
#[derive(Debug)]
struct Port {
    item: ItemId,
    coef: f64,
    links: Vec<usize>,
}

#[derive(Debug)]
enum Behavior {
    /// Disabled or unresolvable: carries nothing.
    Inert,
    Supplier {
        lock: Option<f64>,
    },
    Consumer {
        pull: bool,
        lock: Option<f64>,
    },
    Passthrough {
        lock: Option<f64>,
    },
    Recipe {
        coeffs: RecipeCoefficients,
        /// Crafts per second the configured assemblers can reach.
        cap: f64,
        /// Manual crafts per second, clamped to `cap`.
        lock: Option<f64>,
        fixed_count: Option<u32>,
        rounding: Rounding,
    },
}

#[derive(Debug)]
struct WorkNode {
    id: NodeId,
    behavior: Behavior,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    in_links: Vec<usize>,
    out_links: Vec<usize>,
    weight: f64,
    issues: Vec<NodeIssue>,
    throughput: f64,
    target_driven: f64,
    target_total: f64,
    unbounded: bool,
}

#[derive(Debug)]
struct WorkLink {
    id: LinkId,
    producer: usize,
    consumer: usize,
    item: ItemId,
    driven: f64,
    passive: f64,
    greedy: bool,
    weight: f64,
    offer: f64,
    rate: f64,
    /// Producer and consumer sit on the same cycle.
    looped: bool,
}

impl WorkLink {
    fn requested(&self) -> f64 {
        self.driven + self.passive
    }

    /// What the consumer counts on receiving. A loop link asked only
    /// passively is expected to deliver what it last offered.
    fn expected(&self) -> f64 {
        if self.looped && self.driven == 0.0 {
            self.offer.min(self.requested())
        } else {
            self.requested()
        }
    }

    fn claim(&self) -> Claim {
        Claim {
            driven: self.driven,
            passive: self.passive,
            greedy: self.greedy,
            weight: self.weight,
        }
    }
}

struct Problem {
    nodes: Vec<WorkNode>,
    links: Vec<WorkLink>,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl Problem {
    fn build(
        graph: &Graph,
        catalog: &Catalog,
        settings: &SolverSettings,
        component: &BTreeSet<NodeId>,
        scc_of: &HashMap<NodeId, usize>,
        errors: &mut Vec<(NodeId, GraphError)>,
    ) -> Self {
        let order = graph.feedback_order(component);
        let index: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut links = Vec::new();
        let mut in_links: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        let mut out_links: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        for (ci, &n) in order.iter().enumerate() {
            for &lid in graph.inputs(n) {
                let Some(link) = graph.link(lid) else {
                    continue;
                };
                let Some(&pi) = index.get(&link.producer) else {
                    continue;
                };
                let looped = matches!(
                    (scc_of.get(&link.producer), scc_of.get(&n)),
                    (Some(a), Some(b)) if a == b
                );
                let li = links.len();
                links.push(WorkLink {
                    id: lid,
                    producer: pi,
                    consumer: ci,
                    item: link.item,
                    driven: link.flow.driven,
                    passive: link.flow.passive,
                    greedy: false,
                    weight: 1.0,
                    offer: link.flow.offer,
                    rate: link.flow.rate,
                    looped,
                });
                in_links[ci].push(li);
                out_links[pi].push(li);
            }
        }

        let mut nodes = Vec::with_capacity(order.len());
        for (i, &id) in order.iter().enumerate() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let ins = std::mem::take(&mut in_links[i]);
            let outs = std::mem::take(&mut out_links[i]);
            let mut work = plan_node(catalog, settings, id, node, &links, ins, outs);
            if work.issues.contains(&NodeIssue::MissingEntity) {
                let (kind, index) = missing_reference(catalog, &node.kind);
                errors.push((id, unknown(kind, index)));
            }
            if matches!(work.behavior, Behavior::Inert) {
                work.throughput = 0.0;
            }
            nodes.push(work);
        }
        Problem { nodes, links }
    }
}

fn plan_node(
    catalog: &Catalog,
    settings: &SolverSettings,
    id: NodeId,
    node: &Node,
    links: &[WorkLink],
    in_links: Vec<usize>,
    out_links: Vec<usize>,
) -> WorkNode {
    let mut weight = node.weight;
    if node.low_priority {
        weight /= settings.low_priority_power;
    }
    let mut work = WorkNode {
        id,
        behavior: Behavior::Inert,
        inputs: Vec::new(),
        outputs: Vec::new(),
        in_links,
        out_links,
        weight,
        issues: Vec::new(),
        throughput: node.flow.throughput,
        target_driven: 0.0,
        target_total: 0.0,
        unbounded: false,
    };
    if !node.enabled {
        return work;
    }

    let port = |item: ItemId, coef: f64, candidates: &[usize]| Port {
        item,
        coef,
        links: candidates
            .iter()
            .copied()
            .filter(|&l| links[l].item == item)
            .collect(),
    };

    match &node.kind {
        NodeKind::Recipe(recipe) => match recipe_coefficients(catalog, settings, recipe) {
            Ok(coeffs) => {
                work.inputs = coeffs
                    .inputs
                    .iter()
                    .map(|&(item, q)| port(item, q, &work.in_links))
                    .collect();
                work.outputs = coeffs
                    .outputs
                    .iter()
                    .map(|&(item, q)| port(item, q, &work.out_links))
                    .collect();
                for p in &work.inputs {
                    if p.links.is_empty() {
                        work.issues.push(NodeIssue::DisconnectedInput(p.item));
                    }
                }
                work.issues.extend(coeffs.warnings.iter().cloned());

                let (cap, fixed_count) = match recipe.count {
                    AssemblerCount::Fixed(n) => (n as f64 * coeffs.crafts_per_assembler, Some(n)),
                    AssemblerCount::Auto => (f64::INFINITY, None),
                };
                let lock = node.rate_lock.map(|r| r.min(cap));
                work.behavior = Behavior::Recipe {
                    coeffs,
                    cap,
                    lock,
                    fixed_count,
                    rounding: recipe.rounding.unwrap_or(settings.default_rounding()),
                };
            }
            Err(issue) => work.issues.push(issue),
        },
        NodeKind::Supplier { item } => {
            if catalog.item(*item).is_none() {
                work.issues.push(NodeIssue::MissingEntity);
                return work;
            }
            work.outputs = vec![port(*item, 1.0, &work.out_links)];
            work.behavior = Behavior::Supplier {
                lock: node.rate_lock,
            };
        }
        NodeKind::Consumer { item, pull } => {
            if catalog.item(*item).is_none() {
                work.issues.push(NodeIssue::MissingEntity);
                return work;
            }
            work.inputs = vec![port(*item, 1.0, &work.in_links)];
            if *pull && node.rate_lock.is_some() && work.inputs[0].links.is_empty() {
                work.issues.push(NodeIssue::DisconnectedInput(*item));
            }
            work.behavior = Behavior::Consumer {
                pull: *pull,
                lock: node.rate_lock,
            };
        }
        NodeKind::Passthrough { item } => {
            if catalog.item(*item).is_none() {
                work.issues.push(NodeIssue::MissingEntity);
                return work;
            }
            work.inputs = vec![port(*item, 1.0, &work.in_links)];
            work.outputs = vec![port(*item, 1.0, &work.out_links)];
            work.behavior = Behavior::Passthrough {
                lock: node.rate_lock,
            };
        }
    }
    work
}

/// First reference in `kind` that the catalog cannot resolve.
fn missing_reference(catalog: &Catalog, kind: &NodeKind) -> (EntityKind, u32) {
    match kind {
        NodeKind::Recipe(r) => {
            if catalog.recipe(r.recipe).is_none() {
                return (EntityKind::Recipe, r.recipe.0);
            }
            if let AssemblerChoice::Fixed(a) = r.assembler
                && catalog.assembler(a).is_none()
            {
                return (EntityKind::Assembler, a.0);
            }
            if let Some(b) = &r.beacon
                && catalog.beacon(b.beacon).is_none()
            {
                return (EntityKind::Beacon, b.beacon.0);
            }
            let modules = r
                .modules
                .iter()
                .chain(r.beacon.iter().flat_map(|b| b.modules.iter()));
            for m in modules {
                if catalog.module(*m).is_none() {
                    return (EntityKind::Module, m.0);
                }
            }
            (EntityKind::Recipe, r.recipe.0)
        }
        NodeKind::Supplier { item }
        | NodeKind::Consumer { item, .. }
        | NodeKind::Passthrough { item } => (EntityKind::Item, item.0),
    }
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

impl Problem {
    /// Iterate to a fixed point. Returns (iterations, converged, residual).
    fn run(&mut self, settings: &SolverSettings) -> (u32, bool, f64) {
        let mut residual = 0.0;
        for iteration in 0..settings.max_iterations {
            let before = self.snapshot();

            for i in (0..self.nodes.len()).rev() {
                request(&mut self.nodes[i], &mut self.links, settings);
            }
            for i in 0..self.nodes.len() {
                supply(&mut self.nodes[i], &mut self.links, settings);
            }
            for i in (0..self.nodes.len()).rev() {
                settle(&mut self.nodes[i], &mut self.links);
            }

            residual = self.change_since(&before);
            if iteration >= 1 && residual <= settings.epsilon {
                return (iteration + 1, true, residual);
            }
        }
        (settings.max_iterations, false, residual)
    }

    fn snapshot(&self) -> Vec<f64> {
        self.links
            .iter()
            .flat_map(|l| [l.rate, l.offer])
            .chain(self.nodes.iter().map(|n| n.throughput))
            .collect()
    }

    fn change_since(&self, before: &[f64]) -> f64 {
        self.snapshot()
            .iter()
            .zip(before)
            .map(|(&new, &old)| {
                if new == old {
                    0.0
                } else {
                    (new - old).abs() / new.abs().max(old.abs()).max(1.0)
                }
            })
            .fold(0.0, f64::max)
    }
}

/// Demand pass for one node: set driven/passive requests on its input links.
fn request(node: &mut WorkNode, links: &mut [WorkLink], settings: &SolverSettings) {
    let weight = node.weight;
    match &node.behavior {
        Behavior::Inert => {
            for &l in &node.in_links {
                links[l].driven = 0.0;
                links[l].passive = 0.0;
            }
        }
        Behavior::Supplier { .. } => {}
        Behavior::Consumer { pull, lock } => {
            let (driven, passive, greedy) = match (*pull, *lock) {
                (true, Some(d)) => (d, 0.0, false),
                (true, None) => (0.0, f64::INFINITY, true),
                (false, Some(cap)) => (0.0, cap, false),
                (false, None) => (0.0, f64::INFINITY, settings.pull_output_nodes),
            };
            let weight = if greedy {
                weight * settings.pull_output_nodes_power
            } else {
                weight
            };
            node.target_driven = driven;
            node.target_total = driven + passive;
            for port in &node.inputs {
                split(links, &port.links, driven, passive, greedy, weight);
            }
        }
        Behavior::Passthrough { lock } => {
            let (driven, passive, greedy) = match *lock {
                Some(l) => (l, 0.0, false),
                None => {
                    let outs = node.outputs.iter().flat_map(|p| p.links.iter());
                    let mut driven = 0.0;
                    let mut passive = 0.0;
                    let mut greedy = false;
                    for &l in outs {
                        driven += links[l].driven;
                        passive += links[l].passive;
                        greedy |= links[l].greedy;
                    }
                    (driven, passive, greedy)
                }
            };
            node.target_driven = driven;
            node.target_total = driven + passive;
            for port in &node.inputs {
                split(links, &port.links, driven, passive, greedy, weight);
            }
        }
        Behavior::Recipe {
            cap,
            lock,
            fixed_count,
            ..
        } => {
            let (driven, total) = match *lock {
                Some(l) => (l, l),
                None => {
                    let (driven, total) = downstream_crafts(node, links);
                    let linked = node.outputs.iter().any(|p| !p.links.is_empty());
                    match fixed_count {
                        // Installed machines run flat out unless a pulled
                        // output holds them back.
                        Some(_) if !linked => (*cap, *cap),
                        Some(_) if driven <= 0.0 => (total.min(*cap), total.min(*cap)),
                        _ => (driven.min(*cap), total.max(driven).min(*cap)),
                    }
                }
            };
            node.target_driven = driven;
            node.target_total = total;

            // Inputs that came up short last time bound how much of the
            // others is worth asking for.
            let mut limit = f64::INFINITY;
            let mut short = vec![false; node.inputs.len()];
            let mut ratio = vec![f64::INFINITY; node.inputs.len()];
            for (k, port) in node.inputs.iter().enumerate() {
                let offered: f64 = port.links.iter().map(|&l| links[l].offer).sum();
                let issued: f64 = port.links.iter().map(|&l| links[l].expected()).sum();
                ratio[k] = offered / port.coef;
                if offered < issued * (1.0 - 1e-9) {
                    short[k] = true;
                    limit = limit.min(ratio[k]);
                }
            }

            for (k, port) in node.inputs.iter().enumerate() {
                let mut d = driven * port.coef;
                let mut t = total * port.coef;
                let binding = short[k] && ratio[k] <= limit * (1.0 + 1e-9) + ZERO_RATE;
                if limit.is_finite() && !binding {
                    let cap = limit * port.coef;
                    d = d.min(cap);
                    t = t.min(cap);
                }
                let passive = if t.is_infinite() {
                    f64::INFINITY
                } else {
                    (t - d).max(0.0)
                };
                split(links, &port.links, d, passive, false, weight);
            }
        }
    }
}

/// Crafts per second asked for by the recipe's outputs, as (driven, total).
///
/// Once any output is pulled, outputs nobody pulls are byproducts and their
/// passive requests no longer raise the total. Passive requests coming back
/// around a cycle only count when nothing outside the cycle wants output.
fn downstream_crafts(node: &WorkNode, links: &[WorkLink]) -> (f64, f64) {
    let outside_wants = node
        .outputs
        .iter()
        .flat_map(|p| p.links.iter())
        .any(|&l| !links[l].looped && links[l].requested() > 0.0);
    let asked = |l: usize| {
        if outside_wants && links[l].looped {
            links[l].driven
        } else {
            links[l].requested()
        }
    };

    let mut per_port = Vec::with_capacity(node.outputs.len());
    for port in node.outputs.iter().filter(|p| p.coef > 0.0) {
        let d: f64 = port.links.iter().map(|&l| links[l].driven).sum();
        let t: f64 = port.links.iter().map(|&l| asked(l)).sum();
        per_port.push((d / port.coef, t / port.coef));
    }
    let driven = per_port.iter().map(|&(d, _)| d).fold(0.0, f64::max);
    let total = per_port
        .iter()
        .filter(|&&(d, _)| driven <= 0.0 || d > 0.0)
        .map(|&(_, t)| t)
        .fold(0.0, f64::max);
    (driven, total)
}

/// Spread a port's request over the links feeding it.
///
/// When some feeding links close a cycle and others come from outside, the
/// cycle is asked first: outside links are driven only for what the cycle
/// did not offer last time, and the cycle links are asked passively for the
/// whole request so the loop can grow into it.
fn split(
    links: &mut [WorkLink],
    port: &[usize],
    driven: f64,
    passive: f64,
    greedy: bool,
    weight: f64,
) {
    let (looped, outside): (Vec<usize>, Vec<usize>) =
        port.iter().partition(|&&l| links[l].looped);
    if looped.is_empty() || outside.is_empty() {
        spread(links, port, driven, passive, greedy, weight);
        return;
    }
    let recycled = offered(links, &looped).min(driven);
    spread(links, &outside, driven - recycled, passive, greedy, weight);
    spread(links, &looped, 0.0, driven + passive, greedy, weight);
}

/// Spread a request over links in proportion to their offers.
///
/// When the links offered enough last time, the request follows their
/// offers. Otherwise each link is asked for what it offered and the deficit
/// goes to the links that were not exhausted.
fn spread(
    links: &mut [WorkLink],
    port: &[usize],
    driven: f64,
    passive: f64,
    greedy: bool,
    weight: f64,
) {
    if port.is_empty() {
        return;
    }
    let offered: f64 = port.iter().map(|&l| links[l].offer).sum();
    let mut shares = vec![0.0; port.len()];
    if driven > 0.0 {
        if offered >= driven {
            for (s, &l) in shares.iter_mut().zip(port) {
                *s = driven * links[l].offer / offered;
            }
        } else {
            let mut open: Vec<usize> = port
                .iter()
                .enumerate()
                .filter(|&(_, &l)| links[l].offer >= links[l].requested() * (1.0 - 1e-9))
                .map(|(pos, _)| pos)
                .collect();
            if open.is_empty() {
                open = (0..port.len()).collect();
            }
            for (s, &l) in shares.iter_mut().zip(port) {
                *s = links[l].offer;
            }
            let each = (driven - offered) / open.len() as f64;
            for pos in open {
                shares[pos] += each;
            }
        }
    }

    let count = port.len() as f64;
    for (pos, &l) in port.iter().enumerate() {
        let p = if passive.is_infinite() {
            f64::INFINITY
        } else if passive <= 0.0 {
            0.0
        } else if driven > 0.0 {
            passive * shares[pos] / driven
        } else if offered > 0.0 {
            passive * links[l].offer / offered
        } else {
            passive / count
        };
        let link = &mut links[l];
        link.driven = shares[pos];
        link.passive = p;
        link.greedy = greedy;
        link.weight = weight;
    }
}

/// Supply pass for one node: compute throughput, draws and output offers.
fn supply(node: &mut WorkNode, links: &mut [WorkLink], settings: &SolverSettings) {
    match &node.behavior {
        Behavior::Inert => {
            for &l in &node.in_links {
                links[l].rate = 0.0;
            }
            for &l in &node.out_links {
                links[l].offer = 0.0;
            }
            node.throughput = 0.0;
        }
        Behavior::Supplier { lock } => {
            for port in &node.outputs {
                let amount = match lock {
                    Some(r) => *r,
                    None => port.links.iter().map(|&l| links[l].driven).sum(),
                };
                offer(links, &port.links, amount);
            }
        }
        Behavior::Consumer { lock, .. } => {
            let mut taken = 0.0;
            for port in &node.inputs {
                let available = offered(links, &port.links);
                let take = lock.map_or(available, |d| available.min(d));
                draw(links, &port.links, take);
                taken += take;
            }
            node.throughput = taken;
        }
        Behavior::Passthrough { lock } => {
            let available: f64 = node.inputs.iter().map(|p| offered(links, &p.links)).sum();
            let pass = lock.map_or(available, |l| available.min(l));
            for port in &node.outputs {
                offer(links, &port.links, pass);
            }
            for port in &node.inputs {
                draw(links, &port.links, pass);
            }
            node.throughput = pass;
        }
        Behavior::Recipe { .. } => {
            let mut input_limit = f64::INFINITY;
            for port in &node.inputs {
                let available = if port.links.is_empty() {
                    0.0
                } else {
                    offered(links, &port.links)
                };
                input_limit = input_limit.min(available / port.coef);
            }

            let mut target = node.target_total.min(input_limit);
            node.unbounded = target.is_infinite();
            if node.unbounded {
                target = 0.0;
            }
            let previous = node.throughput;
            let mut crafts = previous + settings.damping * (target - previous);
            crafts = crafts.min(input_limit).max(0.0);
            if !crafts.is_finite() {
                crafts = 0.0;
            }
            node.throughput = crafts;

            for port in &node.inputs {
                draw(links, &port.links, crafts * port.coef);
            }
            for port in &node.outputs {
                offer(links, &port.links, crafts * port.coef);
            }
        }
    }
}

/// Settle pass: passthrough inputs draw exactly what left through outputs.
fn settle(node: &mut WorkNode, links: &mut [WorkLink]) {
    if !matches!(node.behavior, Behavior::Passthrough { .. }) {
        return;
    }
    let out: f64 = node
        .outputs
        .iter()
        .flat_map(|p| p.links.iter())
        .map(|&l| links[l].rate)
        .sum();
    for port in &node.inputs {
        draw(links, &port.links, out);
    }
    node.throughput = out;
}

fn offered(links: &[WorkLink], port: &[usize]) -> f64 {
    port.iter().map(|&l| links[l].offer).sum()
}

/// Divide `amount` of output among the port's links by their claims.
fn offer(links: &mut [WorkLink], port: &[usize], amount: f64) {
    let claims: Vec<Claim> = port.iter().map(|&l| links[l].claim()).collect();
    for (&l, share) in port.iter().zip(allocate(amount, &claims)) {
        links[l].offer = share;
    }
}

/// Take `amount` from the port's links. Links closing a cycle are drained
/// first; the rest comes from the others in proportion to what each offered.
fn draw(links: &mut [WorkLink], port: &[usize], amount: f64) {
    let (looped, outside): (Vec<usize>, Vec<usize>) =
        port.iter().partition(|&&l| links[l].looped);
    if looped.is_empty() || outside.is_empty() {
        draw_evenly(links, port, amount);
        return;
    }
    let recycled = amount.min(offered(links, &looped));
    draw_evenly(links, &looped, recycled);
    draw_evenly(links, &outside, amount - recycled);
}

fn draw_evenly(links: &mut [WorkLink], port: &[usize], amount: f64) {
    let available = offered(links, port);
    for &l in port {
        links[l].rate = if available > 0.0 {
            (amount * links[l].offer / available).min(links[l].offer)
        } else {
            0.0
        };
    }
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

impl Problem {
    /// Mark cycles that stayed at zero despite demand and had nothing
    /// flowing in from outside.
    fn flag_unsupplied_loops(&mut self, graph: &Graph, sccs: &[Vec<NodeId>]) {
        let index: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        for scc in sccs {
            let Some(members) = scc
                .iter()
                .map(|n| index.get(n).copied())
                .collect::<Option<BTreeSet<usize>>>()
            else {
                continue;
            };
            let cyclic = members.len() > 1 || scc.iter().any(|&n| graph.has_self_link(n));
            if !cyclic {
                continue;
            }
            let live = members
                .iter()
                .any(|&i| !matches!(self.nodes[i].behavior, Behavior::Inert));
            let demanded = members
                .iter()
                .any(|&i| self.nodes[i].target_total > ZERO_RATE);
            let flowing = self
                .links
                .iter()
                .filter(|l| members.contains(&l.consumer))
                .any(|l| l.rate > ZERO_RATE);
            if live && demanded && !flowing {
                tracing::warn!(nodes = members.len(), "cycle has no supply and stays at zero");
                for &i in &members {
                    self.nodes[i].issues.push(NodeIssue::UnsuppliedLoop);
                }
            }
        }
    }

    fn write_back(&self, graph: &mut Graph, settings: &SolverSettings) {
        let unit = settings.rate_unit.seconds();

        for link in &self.links {
            let starved = link.driven > link.rate * (1.0 + FLAG_TOLERANCE) + ZERO_RATE;
            if let Some(target) = graph.link_mut(link.id) {
                target.flow = LinkFlow {
                    rate: link.rate,
                    offer: link.offer,
                    driven: link.driven,
                    passive: link.passive,
                };
                target.rate = link.rate * unit;
                target.starved = starved;
            }
        }

        for node in &self.nodes {
            let result = self.node_result(node, unit);
            if let Some(target) = graph.node_mut(node.id) {
                target.flow = NodeFlow {
                    throughput: node.throughput,
                };
                target.result = result;
            }
        }
    }

    fn port_rate(&self, port: &Port) -> f64 {
        port.links.iter().map(|&l| self.links[l].rate).sum()
    }

    fn node_result(&self, node: &WorkNode, unit: f64) -> NodeResult {
        let mut issues = node.issues.clone();
        let slot = |item: ItemId, rate: f64| SlotRate {
            item,
            rate: rate * unit,
        };
        let short_of = |achieved: f64, target: f64| {
            target > ZERO_RATE && achieved < target * (1.0 - FLAG_TOLERANCE) - ZERO_RATE
        };

        let mut result = NodeResult::default();
        match &node.behavior {
            Behavior::Inert => {
                result.inputs = node.inputs.iter().map(|p| slot(p.item, 0.0)).collect();
                result.outputs = node.outputs.iter().map(|p| slot(p.item, 0.0)).collect();
            }
            Behavior::Supplier { .. } => {
                let total: f64 = node.outputs.iter().map(|p| self.port_rate(p)).sum();
                result.rate = total * unit;
                result.outputs = node
                    .outputs
                    .iter()
                    .map(|p| slot(p.item, self.port_rate(p)))
                    .collect();
            }
            Behavior::Consumer { .. } => {
                result.rate = node.throughput * unit;
                result.inputs = node
                    .inputs
                    .iter()
                    .map(|p| slot(p.item, self.port_rate(p)))
                    .collect();
                if short_of(node.throughput, node.target_driven) {
                    issues.push(NodeIssue::InsufficientInput);
                }
            }
            Behavior::Passthrough { lock } => {
                result.rate = node.throughput * unit;
                result.inputs = node
                    .inputs
                    .iter()
                    .map(|p| slot(p.item, self.port_rate(p)))
                    .collect();
                result.outputs = node
                    .outputs
                    .iter()
                    .map(|p| slot(p.item, self.port_rate(p)))
                    .collect();
                if let Some(l) = lock
                    && short_of(node.throughput, *l)
                {
                    issues.push(NodeIssue::InsufficientInput);
                }
            }
            Behavior::Recipe {
                coeffs,
                fixed_count,
                rounding,
                ..
            } => {
                let crafts = node.throughput;
                result.rate = crafts * unit;
                result.inputs = node
                    .inputs
                    .iter()
                    .map(|p| slot(p.item, crafts * p.coef))
                    .collect();
                result.outputs = node
                    .outputs
                    .iter()
                    .map(|p| slot(p.item, crafts * p.coef))
                    .collect();
                result.assembler = coeffs.assembler;

                let count = match fixed_count {
                    Some(n) => *n as f64,
                    None if coeffs.crafts_per_assembler > 0.0 => {
                        round_count(crafts / coeffs.crafts_per_assembler, *rounding)
                    }
                    None => 0.0,
                };
                result.assembler_count = Some(count);
                result.energy = coeffs.energy_per_assembler.map(|e| e * count);

                if node.unbounded {
                    issues.push(NodeIssue::Unbounded);
                }
                if short_of(crafts, node.target_driven) {
                    issues.push(NodeIssue::InsufficientInput);
                }
            }
        }
        issues.dedup();
        result.issues = issues;
        result
    }
}

/// Apply a rounding policy to a fractional assembler count.
pub fn round_count(count: f64, rounding: Rounding) -> f64 {
    match rounding {
        Rounding::Exact => count,
        Rounding::Up => {
            let nearest = count.round();
            if (count - nearest).abs() <= FLAG_TOLERANCE * nearest.max(1.0) {
                nearest
            } else {
                count.ceil()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RateUnit;
    use crate::test_utils::*;

    fn solve_all(graph: &mut Graph, catalog: &Catalog) -> SolveReport {
        solve(graph, catalog, &SolverSettings::default(), &SolveScope::All)
    }

    fn rate(graph: &Graph, link: LinkId) -> f64 {
        graph.link_rate(link).unwrap()
    }

    fn issues(graph: &Graph, node: NodeId) -> &[NodeIssue] {
        &graph.node(node).unwrap().result.issues
    }

    // -----------------------------------------------------------------------
    // Chains
    // -----------------------------------------------------------------------

    #[test]
    fn fixed_assembler_draws_only_what_it_needs() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 10.0);
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 1));
        let c = add_consumer(&mut g, &catalog, f.gear, true, None);
        let plate = link(&mut g, &catalog, s, r, f.iron_plate);
        let gear = link(&mut g, &catalog, r, c, f.gear);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(rate(&g, plate), 2.0));
        assert!(approx(rate(&g, gear), 1.0));
        assert!(approx(g.node_rate(c).unwrap(), 1.0));
        assert!(approx(g.node_rate(s).unwrap(), 2.0));
        assert!(issues(&g, r).is_empty());
        assert!(issues(&g, s).is_empty());
        assert_eq!(g.assembler_count(r), Some(1.0));
    }

    #[test]
    fn fixed_assembler_backs_off_to_pulled_demand() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 10.0);
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 1));
        let c = add_consumer(&mut g, &catalog, f.gear, true, Some(0.5));
        let plate = link(&mut g, &catalog, s, r, f.iron_plate);
        let gear = link(&mut g, &catalog, r, c, f.gear);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(rate(&g, plate), 1.0));
        assert!(approx(rate(&g, gear), 0.5));
        assert!(approx(g.node_rate(r).unwrap(), 0.5));
        let result = &g.node(r).unwrap().result;
        assert!(approx(result.outputs[0].rate, 0.5));
        assert!(approx(result.inputs[0].rate, 1.0));
        // The configured count is reported even while part of it idles.
        assert_eq!(g.assembler_count(r), Some(1.0));
        assert!(issues(&g, r).is_empty());
        assert!(issues(&g, c).is_empty());
    }

    #[test]
    fn fixed_assembler_pulls_from_auto_supplier_at_capacity() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add(&mut g, &catalog, NodeKind::Supplier { item: f.iron_plate });
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 2));
        let c = add_consumer(&mut g, &catalog, f.gear, false, None);
        let plate = link(&mut g, &catalog, s, r, f.iron_plate);
        link(&mut g, &catalog, r, c, f.gear);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(rate(&g, plate), 4.0));
        assert!(approx(g.node_rate(c).unwrap(), 2.0));
    }

    #[test]
    fn fixed_assembler_without_consumers_runs_at_capacity() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 10.0);
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 1));
        let plate = link(&mut g, &catalog, s, r, f.iron_plate);

        solve_all(&mut g, &catalog);
        assert!(approx(rate(&g, plate), 2.0));
        assert!(approx(g.node_rate(r).unwrap(), 1.0));
    }

    #[test]
    fn short_supply_throttles_and_flags() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 1.0);
        let r = add(&mut g, &catalog, fixed_recipe(f.gear_recipe, f.assembler_1, 1));
        let c = add_consumer(&mut g, &catalog, f.gear, true, None);
        let plate = link(&mut g, &catalog, s, r, f.iron_plate);
        let gear = link(&mut g, &catalog, r, c, f.gear);

        solve_all(&mut g, &catalog);
        assert!(approx(rate(&g, gear), 0.5));
        assert!(approx(rate(&g, plate), 1.0));
        assert!(issues(&g, r).contains(&NodeIssue::InsufficientInput));
        assert!(g.link(plate).unwrap().starved);
    }

    #[test]
    fn pull_demand_scales_auto_chain() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let ore = add(&mut g, &catalog, NodeKind::Supplier { item: f.iron_ore });
        let smelt = add(&mut g, &catalog, NodeKind::recipe(f.plate_recipe));
        let gears = add(&mut g, &catalog, NodeKind::recipe(f.gear_recipe));
        let c = add_consumer(&mut g, &catalog, f.gear, true, Some(1.0));
        let l1 = link(&mut g, &catalog, ore, smelt, f.iron_ore);
        link(&mut g, &catalog, smelt, gears, f.iron_plate);
        link(&mut g, &catalog, gears, c, f.gear);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(rate(&g, l1), 2.0));
        assert!(approx(g.node_rate(c).unwrap(), 1.0));
        // 2 plates/s x 3.2 s in stone furnaces of speed 1
        assert!(approx(g.assembler_count(smelt).unwrap(), 6.4));
        // 1 gear/s in assembler-3 (speed 2)
        assert!(approx(g.assembler_count(gears).unwrap(), 0.5));
        assert!(issues(&g, c).is_empty());
    }

    #[test]
    fn rounding_up_counts() {
        assert_eq!(round_count(0.5, Rounding::Up), 1.0);
        assert_eq!(round_count(2.0000000001, Rounding::Up), 2.0);
        assert_eq!(round_count(2.01, Rounding::Up), 3.0);
        assert_eq!(round_count(2.01, Rounding::Exact), 2.01);
    }

    #[test]
    fn global_rounding_applies_to_auto_nodes() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add(&mut g, &catalog, NodeKind::Supplier { item: f.iron_plate });
        let r = add(&mut g, &catalog, NodeKind::recipe(f.gear_recipe));
        let c = add_consumer(&mut g, &catalog, f.gear, true, Some(1.0));
        link(&mut g, &catalog, s, r, f.iron_plate);
        link(&mut g, &catalog, r, c, f.gear);

        let settings = SolverSettings {
            round_assembler_count: true,
            ..Default::default()
        };
        solve(&mut g, &catalog, &settings, &SolveScope::All);
        assert_eq!(g.assembler_count(r), Some(1.0));
        assert!(approx(g.node(r).unwrap().result.energy.unwrap(), 375_000.0));
    }

    // -----------------------------------------------------------------------
    // Errors and edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn disconnected_input_caps_at_zero() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let plates = add_supplier(&mut g, &catalog, f.iron_plate, 5.0);
        let r = add(&mut g, &catalog, NodeKind::recipe(f.circuit_recipe));
        let c = add_consumer(&mut g, &catalog, f.circuit, true, Some(1.0));
        let l = link(&mut g, &catalog, plates, r, f.iron_plate);
        link(&mut g, &catalog, r, c, f.circuit);

        let report = solve_all(&mut g, &catalog);
        assert!(report.errors.is_empty());
        assert_eq!(g.node_rate(r), Some(0.0));
        assert_eq!(rate(&g, l), 0.0);
        assert!(issues(&g, r).contains(&NodeIssue::DisconnectedInput(f.copper_cable)));
        assert!(issues(&g, c).contains(&NodeIssue::InsufficientInput));
    }

    #[test]
    fn zero_supplier_is_not_an_error() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 0.0);
        let c = add_consumer(&mut g, &catalog, f.iron_plate, false, None);
        let l = link(&mut g, &catalog, s, c, f.iron_plate);
        solve_all(&mut g, &catalog);
        assert_eq!(rate(&g, l), 0.0);
        assert!(issues(&g, s).is_empty());
        assert!(issues(&g, c).is_empty());
    }

    #[test]
    fn auto_recipe_without_inputs_or_demand_is_unbounded() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let mine = add(&mut g, &catalog, NodeKind::recipe(f.ore_recipe));
        let sink = add_consumer(&mut g, &catalog, f.iron_ore, false, None);
        link(&mut g, &catalog, mine, sink, f.iron_ore);
        solve_all(&mut g, &catalog);
        assert!(issues(&g, mine).contains(&NodeIssue::Unbounded));
        assert_eq!(g.node_rate(mine), Some(0.0));
    }

    #[test]
    fn disabled_node_carries_nothing() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.iron_plate, 4.0);
        let p = add(&mut g, &catalog, NodeKind::Passthrough { item: f.iron_plate });
        let c = add_consumer(&mut g, &catalog, f.iron_plate, false, None);
        let a = link(&mut g, &catalog, s, p, f.iron_plate);
        let b = link(&mut g, &catalog, p, c, f.iron_plate);
        g.set_enabled(p, false).unwrap();
        solve_all(&mut g, &catalog);
        assert_eq!(rate(&g, a), 0.0);
        assert_eq!(rate(&g, b), 0.0);
        assert_eq!(g.node_rate(p), Some(0.0));
    }

    #[test]
    fn unsupplied_loop_is_flagged() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let refine = add(&mut g, &catalog, NodeKind::recipe(f.refine_recipe));
        let reform = add(&mut g, &catalog, NodeKind::recipe(f.reform_recipe));
        let out = add_consumer(&mut g, &catalog, f.fuel, false, None);
        link(&mut g, &catalog, refine, reform, f.residue);
        link(&mut g, &catalog, reform, refine, f.crude);
        link(&mut g, &catalog, refine, out, f.fuel);

        solve_all(&mut g, &catalog);
        assert!(issues(&g, refine).contains(&NodeIssue::UnsuppliedLoop));
        assert!(issues(&g, reform).contains(&NodeIssue::UnsuppliedLoop));
        assert!(!issues(&g, out).contains(&NodeIssue::UnsuppliedLoop));
        assert_eq!(g.node_rate(refine), Some(0.0));
    }

    #[test]
    fn fed_loop_converges_to_nonzero_point() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.crude, 1.0);
        let refine = add(&mut g, &catalog, NodeKind::recipe(f.refine_recipe));
        let reform = add(&mut g, &catalog, NodeKind::recipe(f.reform_recipe));
        let out = add_consumer(&mut g, &catalog, f.fuel, false, None);
        let feed = link(&mut g, &catalog, s, refine, f.crude);
        link(&mut g, &catalog, refine, reform, f.residue);
        let back = link(&mut g, &catalog, reform, refine, f.crude);
        link(&mut g, &catalog, refine, out, f.fuel);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(report.iterations < 1000);
        assert!(approx(g.node_rate(refine).unwrap(), 1.0));
        assert!(approx(rate(&g, feed), 1.0));
        assert!(approx(rate(&g, back), 1.0));
        assert!(approx(g.node_rate(out).unwrap(), 1.0));
        assert!(!issues(&g, refine).contains(&NodeIssue::UnsuppliedLoop));
    }

    /// Auto crude supplier feeding a refine/reform loop whose fuel goes to a
    /// consumer. Returns (feed link, recycle link, refine, reform, consumer).
    fn fuel_loop(
        g: &mut Graph,
        catalog: &Catalog,
        f: &Fixture,
        reform_first: bool,
        pull: bool,
        demand: Option<f64>,
    ) -> (LinkId, LinkId, NodeId, NodeId, NodeId) {
        let s = add(g, catalog, NodeKind::Supplier { item: f.crude });
        let (refine, reform) = if reform_first {
            let reform = add(g, catalog, NodeKind::recipe(f.reform_recipe));
            (add(g, catalog, NodeKind::recipe(f.refine_recipe)), reform)
        } else {
            let refine = add(g, catalog, NodeKind::recipe(f.refine_recipe));
            (refine, add(g, catalog, NodeKind::recipe(f.reform_recipe)))
        };
        let out = add_consumer(g, catalog, f.fuel, pull, demand);
        let feed = link(g, catalog, s, refine, f.crude);
        link(g, catalog, refine, reform, f.residue);
        let back = link(g, catalog, reform, refine, f.crude);
        link(g, catalog, refine, out, f.fuel);
        (feed, back, refine, reform, out)
    }

    #[test]
    fn pulled_loop_recycles_before_drawing_feed() {
        for reform_first in [false, true] {
            let (catalog, f) = fixture_catalog();
            let mut g = Graph::new();
            let (feed, back, refine, reform, out) =
                fuel_loop(&mut g, &catalog, &f, reform_first, true, Some(1.0));

            let report = solve_all(&mut g, &catalog);
            assert!(report.converged, "reform_first={reform_first}");
            assert!(approx(rate(&g, feed), 1.0), "feed {}", rate(&g, feed));
            assert!(approx(rate(&g, back), 1.0), "recycled {}", rate(&g, back));
            assert!(approx(g.node_rate(refine).unwrap(), 1.0));
            assert!(approx(g.node_rate(reform).unwrap(), 1.0));
            assert!(approx(g.node_rate(out).unwrap(), 1.0));
            assert!(!g.link(feed).unwrap().starved);
            assert!(issues(&g, out).is_empty());
            assert!(issues(&g, refine).is_empty());
        }
    }

    #[test]
    fn pulled_loop_follows_lower_demand_on_resolve() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let (feed, back, refine, _, out) = fuel_loop(&mut g, &catalog, &f, false, true, Some(2.0));
        solve_all(&mut g, &catalog);
        assert!(approx(rate(&g, feed), 2.0));

        set_rate(&mut g, out, Some(1.0));
        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(rate(&g, feed), 1.0), "feed {}", rate(&g, feed));
        assert!(approx(rate(&g, back), 1.0));
        assert!(approx(g.node_rate(refine).unwrap(), 1.0));
    }

    #[test]
    fn capped_loop_output_is_not_overproduced() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.crude, 10.0);
        let refine = add(&mut g, &catalog, NodeKind::recipe(f.refine_recipe));
        let reform = add(&mut g, &catalog, NodeKind::recipe(f.reform_recipe));
        let out = add_consumer(&mut g, &catalog, f.fuel, false, Some(0.5));
        let feed = link(&mut g, &catalog, s, refine, f.crude);
        link(&mut g, &catalog, refine, reform, f.residue);
        link(&mut g, &catalog, reform, refine, f.crude);
        let fuel = link(&mut g, &catalog, refine, out, f.fuel);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        assert!(approx(g.node_rate(refine).unwrap(), 0.5));
        assert!(approx(rate(&g, fuel), 0.5));
        assert!(approx(rate(&g, feed), 0.5));
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    #[test]
    fn shortage_is_split_by_weight() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.gear, 6.0);
        let c1 = add_consumer(&mut g, &catalog, f.gear, true, Some(10.0));
        let c2 = add_consumer(&mut g, &catalog, f.gear, true, Some(10.0));
        g.set_weight(c2, 2.0).unwrap();
        let l1 = link(&mut g, &catalog, s, c1, f.gear);
        let l2 = link(&mut g, &catalog, s, c2, f.gear);

        solve_all(&mut g, &catalog);
        assert!(approx(rate(&g, l1), 2.0));
        assert!(approx(rate(&g, l2), 4.0));
        assert!(issues(&g, c1).contains(&NodeIssue::InsufficientInput));
        assert!(g.link(l1).unwrap().starved);
    }

    #[test]
    fn low_priority_consumer_yields() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.gear, 3.0);
        let main = add_consumer(&mut g, &catalog, f.gear, true, Some(10.0));
        let side = add_consumer(&mut g, &catalog, f.gear, true, Some(10.0));
        g.set_low_priority(side, true).unwrap();
        let l1 = link(&mut g, &catalog, s, main, f.gear);
        let l2 = link(&mut g, &catalog, s, side, f.gear);

        solve_all(&mut g, &catalog);
        // weights 1 and 1/2
        assert!(approx(rate(&g, l1), 2.0));
        assert!(approx(rate(&g, l2), 1.0));
    }

    #[test]
    fn pull_consumer_served_before_passive() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.gear, 5.0);
        let passive = add_consumer(&mut g, &catalog, f.gear, false, None);
        let pull = add_consumer(&mut g, &catalog, f.gear, true, Some(4.0));
        let lp = link(&mut g, &catalog, s, passive, f.gear);
        let lq = link(&mut g, &catalog, s, pull, f.gear);
        solve_all(&mut g, &catalog);
        assert!(approx(rate(&g, lq), 4.0));
        assert!(approx(rate(&g, lp), 1.0));
    }

    #[test]
    fn pull_output_nodes_setting_makes_passive_consumers_compete() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.gear, 4.0);
        let passive = add_consumer(&mut g, &catalog, f.gear, false, None);
        let pull = add_consumer(&mut g, &catalog, f.gear, true, Some(4.0));
        let lp = link(&mut g, &catalog, s, passive, f.gear);
        let lq = link(&mut g, &catalog, s, pull, f.gear);

        let settings = SolverSettings {
            pull_output_nodes: true,
            ..Default::default()
        };
        solve(&mut g, &catalog, &settings, &SolveScope::All);
        assert!(approx(rate(&g, lq), 2.0));
        assert!(approx(rate(&g, lp), 2.0));
    }

    // -----------------------------------------------------------------------
    // Passthrough
    // -----------------------------------------------------------------------

    #[test]
    fn passthrough_merges_and_splits_conservatively() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s1 = add_supplier(&mut g, &catalog, f.iron_plate, 3.0);
        let s2 = add_supplier(&mut g, &catalog, f.iron_plate, 2.0);
        let p = add(&mut g, &catalog, NodeKind::Passthrough { item: f.iron_plate });
        let c1 = add_consumer(&mut g, &catalog, f.iron_plate, true, Some(1.5));
        let c2 = add_consumer(&mut g, &catalog, f.iron_plate, false, Some(1.0));
        let a = link(&mut g, &catalog, s1, p, f.iron_plate);
        let b = link(&mut g, &catalog, s2, p, f.iron_plate);
        let x = link(&mut g, &catalog, p, c1, f.iron_plate);
        let y = link(&mut g, &catalog, p, c2, f.iron_plate);

        let report = solve_all(&mut g, &catalog);
        assert!(report.converged);
        let ins = rate(&g, a) + rate(&g, b);
        let outs = rate(&g, x) + rate(&g, y);
        assert!(approx(ins, outs));
        assert!(approx(rate(&g, x), 1.5));
        assert!(approx(rate(&g, y), 1.0));
    }

    // -----------------------------------------------------------------------
    // Scope and units
    // -----------------------------------------------------------------------

    #[test]
    fn unrelated_components_are_left_alone() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s1 = add_supplier(&mut g, &catalog, f.gear, 1.0);
        let c1 = add_consumer(&mut g, &catalog, f.gear, false, None);
        let l1 = link(&mut g, &catalog, s1, c1, f.gear);
        let s2 = add_supplier(&mut g, &catalog, f.gear, 2.0);
        let c2 = add_consumer(&mut g, &catalog, f.gear, false, None);
        let l2 = link(&mut g, &catalog, s2, c2, f.gear);

        let report = solve(
            &mut g,
            &catalog,
            &SolverSettings::default(),
            &SolveScope::Nodes(BTreeSet::from([s2])),
        );
        assert_eq!(report.components, 1);
        assert_eq!(report.solved_nodes, 2);
        assert_eq!(rate(&g, l1), 0.0);
        assert!(approx(rate(&g, l2), 2.0));
    }

    #[test]
    fn rates_reported_in_current_unit() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let s = add_supplier(&mut g, &catalog, f.gear, 0.5);
        let c = add_consumer(&mut g, &catalog, f.gear, false, None);
        let l = link(&mut g, &catalog, s, c, f.gear);
        let settings = SolverSettings {
            rate_unit: RateUnit::PerMinute,
            ..Default::default()
        };
        solve(&mut g, &catalog, &settings, &SolveScope::All);
        assert!(approx(rate(&g, l), 30.0));
        assert!(approx(g.node_rate(c).unwrap(), 30.0));
    }

    #[test]
    fn missing_entity_reported() {
        let (catalog, f) = fixture_catalog();
        let mut g = Graph::new();
        let r = add(&mut g, &catalog, NodeKind::recipe(f.gear_recipe));

        // A catalog without the recipe the node references.
        let empty = crate::catalog::CatalogBuilder::new().build().unwrap();
        let report = solve(&mut g, &empty, &SolverSettings::default(), &SolveScope::All);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, r);
        assert!(issues(&g, r).contains(&NodeIssue::MissingEntity));
    }
}
