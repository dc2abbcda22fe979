//! Folding assembler, module and beacon effects into per-node coefficients.
//!
//! Bonuses are summed in `Fixed64` in a canonical order (node modules sorted
//! by id, then beacon modules) so the same configuration always yields the
//! same coefficients. The solver receives them as `f64` per craft.

use crate::catalog::{AssemblerDef, Catalog, EntityRef};
use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64, max_fixed};
use crate::id::*;
use crate::node::{AssemblerChoice, BeaconConfig, NodeIssue, RecipeNode};
use crate::settings::{AssemblerSelection, SolverSettings};

/// Lowest speed and consumption multiplier modules can push a machine to.
const MIN_MULTIPLIER: f64 = 0.2;

// ---------------------------------------------------------------------------
// Module effects
// ---------------------------------------------------------------------------

/// Summed module bonuses (0 means no change).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModuleEffects {
    pub speed: Fixed64,
    pub productivity: Fixed64,
    pub consumption: Fixed64,
}

impl ModuleEffects {
    /// Sum the effects of the node's modules and of any beacons around it.
    /// Unknown module ids are skipped.
    pub fn resolve(catalog: &Catalog, modules: &[ModuleId], beacon: Option<&BeaconConfig>) -> Self {
        let mut sorted: Vec<ModuleId> = modules.to_vec();
        sorted.sort();

        let mut effects = ModuleEffects::default();
        for def in sorted.iter().filter_map(|&m| catalog.module(m)) {
            effects.speed += def.speed;
            effects.productivity += def.productivity;
            effects.consumption += def.consumption;
        }

        if let Some(cfg) = beacon
            && let Some(bdef) = catalog.beacon(cfg.beacon)
        {
            let strength = bdef.distribution_effectivity * f64_to_fixed64(cfg.count.max(0.0));
            let mut beacon_modules = cfg.modules.clone();
            beacon_modules.sort();
            for def in beacon_modules.iter().filter_map(|&m| catalog.module(m)) {
                effects.speed += def.speed * strength;
                effects.productivity += def.productivity * strength;
                effects.consumption += def.consumption * strength;
            }
        }
        effects
    }

    /// Multiplier applied to crafting speed.
    pub fn speed_multiplier(&self) -> Fixed64 {
        max_fixed(Fixed64::ONE + self.speed, f64_to_fixed64(MIN_MULTIPLIER))
    }

    /// Multiplier applied to energy draw.
    pub fn consumption_multiplier(&self) -> Fixed64 {
        max_fixed(Fixed64::ONE + self.consumption, f64_to_fixed64(MIN_MULTIPLIER))
    }
}

// ---------------------------------------------------------------------------
// Assembler selection
// ---------------------------------------------------------------------------

/// Pick an assembler for an auto recipe node according to `style`.
///
/// Only enabled assemblers are considered unless none can run the recipe,
/// in which case disabled ones are used. Ties are broken by lowest id.
pub fn select_assembler(
    catalog: &Catalog,
    settings: &SolverSettings,
    recipe: RecipeId,
) -> Option<AssemblerId> {
    let candidates: Vec<AssemblerId> = catalog.assemblers_for(recipe).collect();
    let enabled: Vec<AssemblerId> = candidates
        .iter()
        .copied()
        .filter(|&a| {
            settings
                .enabled
                .is_entity_enabled(catalog, EntityRef::Assembler(a))
        })
        .collect();
    let pool = if enabled.is_empty() { candidates } else { enabled };

    let score = |a: &AssemblerDef| -> (Fixed64, Fixed64) {
        let slots = Fixed64::from_num(a.module_slots);
        match settings.default_assembler {
            AssemblerSelection::Fastest => (a.speed, slots),
            AssemblerSelection::Slowest => (-a.speed, -slots),
            AssemblerSelection::MostModules => (slots, a.speed),
            AssemblerSelection::LeastModules => (-slots, -a.speed),
        }
    };

    let mut best: Option<(AssemblerId, (Fixed64, Fixed64))> = None;
    for id in pool {
        let Some(def) = catalog.assembler(id) else {
            continue;
        };
        let s = score(def);
        match best {
            Some((_, bs)) if bs >= s => {}
            _ => best = Some((id, s)),
        }
    }
    best.map(|(id, _)| id)
}

// ---------------------------------------------------------------------------
// Recipe coefficients
// ---------------------------------------------------------------------------

/// Per-craft stoichiometry and machine rates of a configured recipe node.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeCoefficients {
    pub assembler: Option<AssemblerId>,
    /// Crafts per second of a single assembler.
    pub crafts_per_assembler: f64,
    /// Items consumed per craft, one entry per distinct item.
    pub inputs: Vec<(ItemId, f64)>,
    /// Items produced per craft including productivity, one entry per item.
    pub outputs: Vec<(ItemId, f64)>,
    /// Watts drawn by one assembler.
    pub energy_per_assembler: Option<f64>,
    pub warnings: Vec<NodeIssue>,
}

impl RecipeCoefficients {
    pub fn input(&self, item: ItemId) -> f64 {
        lookup(&self.inputs, item)
    }

    pub fn output(&self, item: ItemId) -> f64 {
        lookup(&self.outputs, item)
    }
}

fn lookup(list: &[(ItemId, f64)], item: ItemId) -> f64 {
    list.iter()
        .find(|(i, _)| *i == item)
        .map(|(_, q)| *q)
        .unwrap_or(0.0)
}

fn accumulate(list: &mut Vec<(ItemId, Fixed64)>, item: ItemId, quantity: Fixed64) {
    match list.iter_mut().find(|(i, _)| *i == item) {
        Some((_, q)) => *q += quantity,
        None => list.push((item, quantity)),
    }
}

/// Derive the coefficients of a recipe node.
///
/// Returns `Err(NodeIssue::MissingEntity)` when the node references
/// something the catalog does not contain. Disabled entities and similar
/// soft problems are reported through `warnings`.
pub fn recipe_coefficients(
    catalog: &Catalog,
    settings: &SolverSettings,
    node: &RecipeNode,
) -> Result<RecipeCoefficients, NodeIssue> {
    let recipe = catalog.recipe(node.recipe).ok_or(NodeIssue::MissingEntity)?;
    let enabled = &settings.enabled;
    let mut warnings = Vec::new();

    if !enabled.recipe_available(catalog, node.recipe) {
        warnings.push(NodeIssue::DisabledRecipe);
    }

    let assembler = match node.assembler {
        AssemblerChoice::Fixed(id) => {
            catalog.assembler(id).ok_or(NodeIssue::MissingEntity)?;
            Some(id)
        }
        AssemblerChoice::Auto => select_assembler(catalog, settings, node.recipe),
    };
    let assembler_def = assembler.and_then(|id| catalog.assembler(id));
    match (assembler, assembler_def) {
        (Some(id), Some(_)) => {
            if !enabled.is_entity_enabled(catalog, EntityRef::Assembler(id)) {
                warnings.push(NodeIssue::DisabledAssembler);
            }
        }
        _ => warnings.push(NodeIssue::NoAssembler),
    }

    for &m in &node.modules {
        catalog.module(m).ok_or(NodeIssue::MissingEntity)?;
    }
    let mut modules = node.modules.clone();
    if let Some(def) = assembler_def
        && modules.len() > def.module_slots as usize
    {
        modules.truncate(def.module_slots as usize);
        warnings.push(NodeIssue::ModulesExceedSlots);
    }
    if modules
        .iter()
        .any(|&m| !enabled.is_entity_enabled(catalog, EntityRef::Module(m)))
    {
        warnings.push(NodeIssue::DisabledModule);
    }

    if let Some(cfg) = &node.beacon {
        catalog.beacon(cfg.beacon).ok_or(NodeIssue::MissingEntity)?;
        for &m in &cfg.modules {
            catalog.module(m).ok_or(NodeIssue::MissingEntity)?;
        }
        if !enabled.is_entity_enabled(catalog, EntityRef::Beacon(cfg.beacon)) {
            warnings.push(NodeIssue::DisabledBeacon);
        }
    }

    let effects = ModuleEffects::resolve(catalog, &modules, node.beacon.as_ref());

    let machine_speed = assembler_def.map(|a| a.speed).unwrap_or(Fixed64::ONE);
    let crafts_per_assembler =
        fixed64_to_f64(machine_speed * effects.speed_multiplier()) / fixed64_to_f64(recipe.time);

    let mut productivity = effects.productivity;
    if let Some(a) = assembler_def {
        productivity += a.productivity;
        if a.is_miner || settings.extra_productivity_for_non_miners {
            productivity += f64_to_fixed64(node.extra_productivity);
        }
    }
    let productivity = max_fixed(productivity, Fixed64::ZERO);

    let mut inputs: Vec<(ItemId, Fixed64)> = Vec::new();
    for ing in &recipe.ingredients {
        accumulate(&mut inputs, ing.item, ing.quantity);
    }
    let mut outputs: Vec<(ItemId, Fixed64)> = Vec::new();
    for p in &recipe.products {
        accumulate(&mut outputs, p.item, p.quantity * (Fixed64::ONE + productivity));
    }

    let energy_per_assembler = assembler_def
        .and_then(|a| a.energy_usage)
        .map(|e| fixed64_to_f64(e) * fixed64_to_f64(effects.consumption_multiplier()));

    Ok(RecipeCoefficients {
        assembler,
        crafts_per_assembler,
        inputs: inputs
            .into_iter()
            .map(|(i, q)| (i, fixed64_to_f64(q)))
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(i, q)| (i, fixed64_to_f64(q)))
            .collect(),
        energy_per_assembler,
        warnings,
    })
}
