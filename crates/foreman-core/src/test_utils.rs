//! Shared fixtures for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::catalog::*;
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::graph::Graph;
use crate::id::*;
use crate::node::{AssemblerChoice, AssemblerCount, NodeKind, RecipeNode};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    f64_to_fixed64(v)
}

// ===========================================================================
// Fixture catalog
// ===========================================================================

/// Ids of everything registered by [`fixture_catalog`].
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub iron_ore: ItemId,
    pub iron_plate: ItemId,
    pub copper_plate: ItemId,
    pub copper_cable: ItemId,
    pub gear: ItemId,
    pub circuit: ItemId,
    pub water: ItemId,
    pub steam: ItemId,
    pub power: ItemId,
    pub crude: ItemId,
    pub residue: ItemId,
    pub fuel: ItemId,

    pub ore_recipe: RecipeId,
    pub plate_recipe: RecipeId,
    pub gear_recipe: RecipeId,
    pub cable_recipe: RecipeId,
    pub circuit_recipe: RecipeId,
    pub steam_recipe: RecipeId,
    pub engine_recipe: RecipeId,
    pub turbine_recipe: RecipeId,
    pub refine_recipe: RecipeId,
    pub reform_recipe: RecipeId,

    pub assembler_1: AssemblerId,
    pub assembler_2: AssemblerId,
    pub assembler_3: AssemblerId,
    pub furnace: AssemblerId,
    pub drill: AssemblerId,
    pub boiler: AssemblerId,
    pub generator: AssemblerId,
    pub refinery: AssemblerId,

    pub speed_module: ModuleId,
    pub productivity_module: ModuleId,
    pub efficiency_module: ModuleId,
    pub beacon: BeaconId,
    pub electronics: TechnologyId,
}

fn solid(b: &mut CatalogBuilder, name: &str) -> ItemId {
    b.register_item(ItemDef {
        name: name.to_string(),
        kind: ItemKind::Solid,
        temperature: None,
    })
}

fn fluid(b: &mut CatalogBuilder, name: &str, temperature: f64) -> ItemId {
    b.register_item(ItemDef {
        name: name.to_string(),
        kind: ItemKind::Fluid,
        temperature: Some(fixed(temperature)),
    })
}

fn ing(item: ItemId, quantity: f64) -> Ingredient {
    Ingredient {
        item,
        quantity: fixed(quantity),
        temperature: None,
    }
}

fn prod(item: ItemId, quantity: f64) -> Product {
    Product {
        item,
        quantity: fixed(quantity),
        temperature: None,
    }
}

fn recipe(
    b: &mut CatalogBuilder,
    name: &str,
    category: &str,
    time: f64,
    ingredients: Vec<Ingredient>,
    products: Vec<Product>,
) -> RecipeId {
    b.register_recipe(RecipeDef {
        name: name.to_string(),
        category: category.to_string(),
        time: fixed(time),
        ingredients,
        products,
    })
}

fn machine(
    b: &mut CatalogBuilder,
    name: &str,
    category: &str,
    speed: f64,
    slots: u32,
    energy: Option<f64>,
) -> AssemblerId {
    b.register_assembler(AssemblerDef {
        name: name.to_string(),
        categories: vec![category.to_string()],
        speed: fixed(speed),
        productivity: Fixed64::ZERO,
        module_slots: slots,
        is_miner: category == "mining",
        energy_usage: energy.map(fixed),
    })
}

/// A small catalog covering smelting, crafting, fluids, a byproduct loop,
/// modules, a beacon and one technology gate.
pub fn fixture_catalog() -> (Catalog, Fixture) {
    let mut b = CatalogBuilder::new();

    let iron_ore = solid(&mut b, "iron-ore");
    let iron_plate = solid(&mut b, "iron-plate");
    let copper_plate = solid(&mut b, "copper-plate");
    let copper_cable = solid(&mut b, "copper-cable");
    let gear = solid(&mut b, "gear");
    let circuit = solid(&mut b, "electronic-circuit");
    let water = fluid(&mut b, "water", 15.0);
    let steam = fluid(&mut b, "steam", 165.0);
    let power = solid(&mut b, "power");
    let crude = solid(&mut b, "crude");
    let residue = solid(&mut b, "residue");
    let fuel = solid(&mut b, "fuel");

    let ore_recipe = recipe(&mut b, "iron-ore", "mining", 1.0, vec![], vec![prod(iron_ore, 1.0)]);
    let plate_recipe = recipe(
        &mut b,
        "iron-plate",
        "smelting",
        3.2,
        vec![ing(iron_ore, 1.0)],
        vec![prod(iron_plate, 1.0)],
    );
    let gear_recipe = recipe(
        &mut b,
        "gear",
        "crafting",
        1.0,
        vec![ing(iron_plate, 2.0)],
        vec![prod(gear, 1.0)],
    );
    let cable_recipe = recipe(
        &mut b,
        "copper-cable",
        "crafting",
        0.5,
        vec![ing(copper_plate, 1.0)],
        vec![prod(copper_cable, 2.0)],
    );
    let circuit_recipe = recipe(
        &mut b,
        "electronic-circuit",
        "crafting",
        0.5,
        vec![ing(iron_plate, 1.0), ing(copper_cable, 3.0)],
        vec![prod(circuit, 1.0)],
    );
    let steam_recipe = recipe(
        &mut b,
        "steam",
        "boiling",
        1.0,
        vec![Ingredient {
            item: water,
            quantity: fixed(60.0),
            temperature: Some(TemperatureRange {
                min: fixed(15.0),
                max: fixed(15.0),
            }),
        }],
        vec![Product {
            item: steam,
            quantity: fixed(60.0),
            temperature: Some(fixed(165.0)),
        }],
    );
    let engine_recipe = recipe(
        &mut b,
        "steam-power",
        "generating",
        1.0,
        vec![Ingredient {
            item: steam,
            quantity: fixed(30.0),
            temperature: Some(TemperatureRange {
                min: fixed(15.0),
                max: fixed(200.0),
            }),
        }],
        vec![prod(power, 1.0)],
    );
    let turbine_recipe = recipe(
        &mut b,
        "turbine-power",
        "generating",
        1.0,
        vec![Ingredient {
            item: steam,
            quantity: fixed(60.0),
            temperature: Some(TemperatureRange {
                min: fixed(500.0),
                max: fixed(1000.0),
            }),
        }],
        vec![prod(power, 2.0)],
    );
    let refine_recipe = recipe(
        &mut b,
        "refine",
        "refining",
        1.0,
        vec![ing(crude, 2.0)],
        vec![prod(residue, 1.0), prod(fuel, 1.0)],
    );
    let reform_recipe = recipe(
        &mut b,
        "reform",
        "refining",
        1.0,
        vec![ing(residue, 1.0)],
        vec![prod(crude, 1.0)],
    );

    let assembler_1 = machine(&mut b, "assembler-1", "crafting", 1.0, 0, Some(75_000.0));
    let assembler_2 = machine(&mut b, "assembler-2", "crafting", 1.5, 2, Some(150_000.0));
    let assembler_3 = machine(&mut b, "assembler-3", "crafting", 2.0, 4, Some(375_000.0));
    let furnace = machine(&mut b, "stone-furnace", "smelting", 1.0, 0, None);
    let drill = machine(&mut b, "electric-mining-drill", "mining", 0.5, 3, Some(90_000.0));
    let boiler = machine(&mut b, "boiler", "boiling", 1.0, 0, None);
    let generator = machine(&mut b, "steam-engine", "generating", 1.0, 0, None);
    let refinery = machine(&mut b, "refinery", "refining", 1.0, 3, None);

    let speed_module = b.register_module(ModuleDef {
        name: "speed-module".to_string(),
        speed: fixed(0.2),
        productivity: Fixed64::ZERO,
        consumption: fixed(0.5),
        limitation: None,
    });
    let productivity_module = b.register_module(ModuleDef {
        name: "productivity-module".to_string(),
        speed: fixed(-0.05),
        productivity: fixed(0.1),
        consumption: fixed(0.4),
        limitation: Some(vec![
            ore_recipe,
            plate_recipe,
            gear_recipe,
            cable_recipe,
            circuit_recipe,
        ]),
    });
    let efficiency_module = b.register_module(ModuleDef {
        name: "efficiency-module".to_string(),
        speed: Fixed64::ZERO,
        productivity: Fixed64::ZERO,
        consumption: fixed(-0.3),
        limitation: None,
    });
    let beacon = b.register_beacon(BeaconDef {
        name: "beacon".to_string(),
        distribution_effectivity: fixed(0.5),
        module_slots: 2,
    });
    let electronics = b.register_technology(TechnologyDef {
        name: "electronics".to_string(),
        unlocks: vec![circuit_recipe],
    });

    let catalog = match b.build() {
        Ok(c) => c,
        Err(e) => panic!("fixture catalog is invalid: {e}"),
    };

    let fixture = Fixture {
        iron_ore,
        iron_plate,
        copper_plate,
        copper_cable,
        gear,
        circuit,
        water,
        steam,
        power,
        crude,
        residue,
        fuel,
        ore_recipe,
        plate_recipe,
        gear_recipe,
        cable_recipe,
        circuit_recipe,
        steam_recipe,
        engine_recipe,
        turbine_recipe,
        refine_recipe,
        reform_recipe,
        assembler_1,
        assembler_2,
        assembler_3,
        furnace,
        drill,
        boiler,
        generator,
        refinery,
        speed_module,
        productivity_module,
        efficiency_module,
        beacon,
        electronics,
    };
    (catalog, fixture)
}

// ===========================================================================
// Graph helpers
// ===========================================================================

/// A recipe node pinned to one assembler type and count.
pub fn fixed_recipe(recipe: RecipeId, assembler: AssemblerId, count: u32) -> NodeKind {
    NodeKind::Recipe(RecipeNode {
        assembler: AssemblerChoice::Fixed(assembler),
        count: AssemblerCount::Fixed(count),
        ..RecipeNode::new(recipe)
    })
}

/// Add a node, panicking on structural errors.
pub fn add(graph: &mut Graph, catalog: &Catalog, kind: NodeKind) -> NodeId {
    match graph.add_node(catalog, kind) {
        Ok((id, _)) => id,
        Err(e) => panic!("add_node failed: {e}"),
    }
}

/// Add a supplier with a fixed per-second rate.
pub fn add_supplier(graph: &mut Graph, catalog: &Catalog, item: ItemId, rate: f64) -> NodeId {
    let id = add(graph, catalog, NodeKind::Supplier { item });
    set_rate(graph, id, Some(rate));
    id
}

/// Add a consumer, optionally with a per-second demand.
pub fn add_consumer(
    graph: &mut Graph,
    catalog: &Catalog,
    item: ItemId,
    pull: bool,
    demand: Option<f64>,
) -> NodeId {
    let id = add(graph, catalog, NodeKind::Consumer { item, pull });
    set_rate(graph, id, demand);
    id
}

pub fn set_rate(graph: &mut Graph, node: NodeId, rate: Option<f64>) {
    if let Err(e) = graph.set_rate_lock(node, rate) {
        panic!("set_rate_lock failed: {e}");
    }
}

/// Connect two nodes, panicking on structural errors.
pub fn link(
    graph: &mut Graph,
    catalog: &Catalog,
    producer: NodeId,
    consumer: NodeId,
    item: ItemId,
) -> LinkId {
    match graph.connect(catalog, producer, consumer, item) {
        Ok((id, _)) => id,
        Err(e) => panic!("connect failed: {e}"),
    }
}

/// Approximate equality with a relative tolerance.
pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}
