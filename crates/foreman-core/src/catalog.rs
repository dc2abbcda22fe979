//! Immutable reference data: items, recipes, assemblers, modules, beacons
//! and technologies.
//!
//! A [`Catalog`] is produced by a [`CatalogBuilder`] and never changes
//! afterwards. Entities are addressed by dense numeric ids and can be looked
//! up by their stable string names.

use crate::fixed::Fixed64;
use crate::id::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building or querying a catalog.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: EntityKind, name: String },
    #[error("{owner} references unknown {kind} #{index}")]
    InvalidRef {
        owner: String,
        kind: EntityKind,
        index: u32,
    },
    #[error("{owner}: {detail}")]
    InvalidValue { owner: String, detail: String },
}

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// The categories of catalog entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Item,
    Recipe,
    Assembler,
    Module,
    Beacon,
    Technology,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Item => "item",
            EntityKind::Recipe => "recipe",
            EntityKind::Assembler => "assembler",
            EntityKind::Module => "module",
            EntityKind::Beacon => "beacon",
            EntityKind::Technology => "technology",
        };
        f.write_str(name)
    }
}

/// A resolved reference to any catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Item(ItemId),
    Recipe(RecipeId),
    Assembler(AssemblerId),
    Module(ModuleId),
    Beacon(BeaconId),
    Technology(TechnologyId),
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Whether an item is moved as discrete units or as a fluid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Solid,
    Fluid,
}

/// Inclusive temperature window accepted by a fluid ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: Fixed64,
    pub max: Fixed64,
}

impl TemperatureRange {
    pub fn contains(&self, t: Fixed64) -> bool {
        t >= self.min && t <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub kind: ItemKind,
    /// Default temperature of a fluid when it enters the graph from a supplier.
    pub temperature: Option<Fixed64>,
}

/// A recipe input.
#[derive(Debug, Clone)]
pub struct Ingredient {
    pub item: ItemId,
    pub quantity: Fixed64,
    pub temperature: Option<TemperatureRange>,
}

/// A recipe output.
#[derive(Debug, Clone)]
pub struct Product {
    pub item: ItemId,
    pub quantity: Fixed64,
    pub temperature: Option<Fixed64>,
}

#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub name: String,
    /// Crafting category; an assembler can run the recipe if it lists it.
    pub category: String,
    /// Seconds per craft at crafting speed 1.
    pub time: Fixed64,
    pub ingredients: Vec<Ingredient>,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone)]
pub struct AssemblerDef {
    pub name: String,
    pub categories: Vec<String>,
    pub speed: Fixed64,
    /// Built-in productivity bonus (e.g. 0.5 for +50%).
    pub productivity: Fixed64,
    pub module_slots: u32,
    pub is_miner: bool,
    /// Energy draw in watts at no consumption bonus.
    pub energy_usage: Option<Fixed64>,
}

impl AssemblerDef {
    pub fn can_craft(&self, recipe: &RecipeDef) -> bool {
        self.categories.iter().any(|c| *c == recipe.category)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub name: String,
    pub speed: Fixed64,
    pub productivity: Fixed64,
    pub consumption: Fixed64,
    /// Recipes this module may be used with. `None` means unrestricted.
    pub limitation: Option<Vec<RecipeId>>,
}

impl ModuleDef {
    pub fn allows(&self, recipe: RecipeId) -> bool {
        self.limitation
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&recipe))
    }
}

#[derive(Debug, Clone)]
pub struct BeaconDef {
    pub name: String,
    /// Fraction of each inserted module's effect transmitted to neighbours.
    pub distribution_effectivity: Fixed64,
    pub module_slots: u32,
}

#[derive(Debug, Clone)]
pub struct TechnologyDef {
    pub name: String,
    pub unlocks: Vec<RecipeId>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Catalog`].
///
/// Entities are registered in any order (ids are handed out densely per
/// kind) and cross references are checked once in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    recipes: Vec<RecipeDef>,
    assemblers: Vec<AssemblerDef>,
    modules: Vec<ModuleDef>,
    beacons: Vec<BeaconDef>,
    technologies: Vec<TechnologyDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(&mut self, def: ItemDef) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(def);
        id
    }

    pub fn register_recipe(&mut self, def: RecipeDef) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(def);
        id
    }

    pub fn register_assembler(&mut self, def: AssemblerDef) -> AssemblerId {
        let id = AssemblerId(self.assemblers.len() as u32);
        self.assemblers.push(def);
        id
    }

    pub fn register_module(&mut self, def: ModuleDef) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(def);
        id
    }

    pub fn register_beacon(&mut self, def: BeaconDef) -> BeaconId {
        let id = BeaconId(self.beacons.len() as u32);
        self.beacons.push(def);
        id
    }

    pub fn register_technology(&mut self, def: TechnologyDef) -> TechnologyId {
        let id = TechnologyId(self.technologies.len() as u32);
        self.technologies.push(def);
        id
    }

    /// Lookup a registered item by name.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.items
            .iter()
            .position(|d| d.name == name)
            .map(|i| ItemId(i as u32))
    }

    /// Lookup a registered recipe by name.
    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipes
            .iter()
            .position(|d| d.name == name)
            .map(|i| RecipeId(i as u32))
    }

    /// Validate every definition and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let item_names = index_names(EntityKind::Item, self.items.iter().map(|d| &d.name))?;
        let recipe_names = index_names(EntityKind::Recipe, self.recipes.iter().map(|d| &d.name))?;
        let assembler_names =
            index_names(EntityKind::Assembler, self.assemblers.iter().map(|d| &d.name))?;
        let module_names = index_names(EntityKind::Module, self.modules.iter().map(|d| &d.name))?;
        let beacon_names = index_names(EntityKind::Beacon, self.beacons.iter().map(|d| &d.name))?;
        let technology_names = index_names(
            EntityKind::Technology,
            self.technologies.iter().map(|d| &d.name),
        )?;

        let item_count = self.items.len() as u32;
        let recipe_count = self.recipes.len() as u32;

        for recipe in &self.recipes {
            if recipe.time <= Fixed64::ZERO {
                return Err(invalid(&recipe.name, "crafting time must be positive"));
            }
            if recipe.products.is_empty() {
                return Err(invalid(&recipe.name, "recipe has no products"));
            }
            let refs = recipe
                .ingredients
                .iter()
                .map(|i| (i.item, i.quantity))
                .chain(recipe.products.iter().map(|p| (p.item, p.quantity)));
            for (item, quantity) in refs {
                if item.0 >= item_count {
                    return Err(CatalogError::InvalidRef {
                        owner: recipe.name.clone(),
                        kind: EntityKind::Item,
                        index: item.0,
                    });
                }
                if quantity <= Fixed64::ZERO {
                    return Err(invalid(&recipe.name, "quantities must be positive"));
                }
            }
        }

        for assembler in &self.assemblers {
            if assembler.speed <= Fixed64::ZERO {
                return Err(invalid(&assembler.name, "speed must be positive"));
            }
        }

        for module in &self.modules {
            if let Some(bad) = module
                .limitation
                .iter()
                .flatten()
                .find(|r| r.0 >= recipe_count)
            {
                return Err(CatalogError::InvalidRef {
                    owner: module.name.clone(),
                    kind: EntityKind::Recipe,
                    index: bad.0,
                });
            }
        }

        let mut unlocked_by: HashMap<RecipeId, Vec<TechnologyId>> = HashMap::new();
        for (i, tech) in self.technologies.iter().enumerate() {
            for &recipe in &tech.unlocks {
                if recipe.0 >= recipe_count {
                    return Err(CatalogError::InvalidRef {
                        owner: tech.name.clone(),
                        kind: EntityKind::Recipe,
                        index: recipe.0,
                    });
                }
                unlocked_by
                    .entry(recipe)
                    .or_default()
                    .push(TechnologyId(i as u32));
            }
        }

        Ok(Catalog {
            items: self.items,
            recipes: self.recipes,
            assemblers: self.assemblers,
            modules: self.modules,
            beacons: self.beacons,
            technologies: self.technologies,
            item_names,
            recipe_names,
            assembler_names,
            module_names,
            beacon_names,
            technology_names,
            unlocked_by,
        })
    }
}

fn index_names<'a>(
    kind: EntityKind,
    names: impl Iterator<Item = &'a String>,
) -> Result<HashMap<String, u32>, CatalogError> {
    let mut map = HashMap::new();
    for (i, name) in names.enumerate() {
        if map.insert(name.clone(), i as u32).is_some() {
            return Err(CatalogError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(map)
}

fn invalid(owner: &str, detail: &str) -> CatalogError {
    CatalogError::InvalidValue {
        owner: owner.to_string(),
        detail: detail.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable catalog. Frozen after [`CatalogBuilder::build`]; share it with
/// `Arc<Catalog>`.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<ItemDef>,
    recipes: Vec<RecipeDef>,
    assemblers: Vec<AssemblerDef>,
    modules: Vec<ModuleDef>,
    beacons: Vec<BeaconDef>,
    technologies: Vec<TechnologyDef>,
    item_names: HashMap<String, u32>,
    recipe_names: HashMap<String, u32>,
    assembler_names: HashMap<String, u32>,
    module_names: HashMap<String, u32>,
    beacon_names: HashMap<String, u32>,
    technology_names: HashMap<String, u32>,
    unlocked_by: HashMap<RecipeId, Vec<TechnologyId>>,
}

impl Catalog {
    /// Resolve a name of the given kind.
    pub fn lookup(&self, kind: EntityKind, name: &str) -> Result<EntityRef, CatalogError> {
        let names = match kind {
            EntityKind::Item => &self.item_names,
            EntityKind::Recipe => &self.recipe_names,
            EntityKind::Assembler => &self.assembler_names,
            EntityKind::Module => &self.module_names,
            EntityKind::Beacon => &self.beacon_names,
            EntityKind::Technology => &self.technology_names,
        };
        let index = *names.get(name).ok_or_else(|| CatalogError::NotFound {
            kind,
            name: name.to_string(),
        })?;
        Ok(match kind {
            EntityKind::Item => EntityRef::Item(ItemId(index)),
            EntityKind::Recipe => EntityRef::Recipe(RecipeId(index)),
            EntityKind::Assembler => EntityRef::Assembler(AssemblerId(index)),
            EntityKind::Module => EntityRef::Module(ModuleId(index)),
            EntityKind::Beacon => EntityRef::Beacon(BeaconId(index)),
            EntityKind::Technology => EntityRef::Technology(TechnologyId(index)),
        })
    }

    /// Name of any entity, if the reference is valid for this catalog.
    pub fn name_of(&self, entity: EntityRef) -> Option<&str> {
        let name = match entity {
            EntityRef::Item(id) => &self.item(id)?.name,
            EntityRef::Recipe(id) => &self.recipe(id)?.name,
            EntityRef::Assembler(id) => &self.assembler(id)?.name,
            EntityRef::Module(id) => &self.module(id)?.name,
            EntityRef::Beacon(id) => &self.beacon(id)?.name,
            EntityRef::Technology(id) => &self.technology(id)?.name,
        };
        Some(name)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_names.get(name).map(|&i| ItemId(i))
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_names.get(name).map(|&i| RecipeId(i))
    }

    pub fn assembler_id(&self, name: &str) -> Option<AssemblerId> {
        self.assembler_names.get(name).map(|&i| AssemblerId(i))
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.module_names.get(name).map(|&i| ModuleId(i))
    }

    pub fn beacon_id(&self, name: &str) -> Option<BeaconId> {
        self.beacon_names.get(name).map(|&i| BeaconId(i))
    }

    pub fn technology_id(&self, name: &str) -> Option<TechnologyId> {
        self.technology_names.get(name).map(|&i| TechnologyId(i))
    }

    pub fn item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn assembler(&self, id: AssemblerId) -> Option<&AssemblerDef> {
        self.assemblers.get(id.0 as usize)
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleDef> {
        self.modules.get(id.0 as usize)
    }

    pub fn beacon(&self, id: BeaconId) -> Option<&BeaconDef> {
        self.beacons.get(id.0 as usize)
    }

    pub fn technology(&self, id: TechnologyId) -> Option<&TechnologyDef> {
        self.technologies.get(id.0 as usize)
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &ItemDef)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, d)| (ItemId(i as u32), d))
    }

    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &RecipeDef)> {
        self.recipes
            .iter()
            .enumerate()
            .map(|(i, d)| (RecipeId(i as u32), d))
    }

    pub fn assemblers(&self) -> impl Iterator<Item = (AssemblerId, &AssemblerDef)> {
        self.assemblers
            .iter()
            .enumerate()
            .map(|(i, d)| (AssemblerId(i as u32), d))
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &ModuleDef)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, d)| (ModuleId(i as u32), d))
    }

    pub fn beacons(&self) -> impl Iterator<Item = (BeaconId, &BeaconDef)> {
        self.beacons
            .iter()
            .enumerate()
            .map(|(i, d)| (BeaconId(i as u32), d))
    }

    pub fn technologies(&self) -> impl Iterator<Item = (TechnologyId, &TechnologyDef)> {
        self.technologies
            .iter()
            .enumerate()
            .map(|(i, d)| (TechnologyId(i as u32), d))
    }

    /// Assemblers whose crafting categories include the recipe's category.
    pub fn assemblers_for(&self, recipe: RecipeId) -> impl Iterator<Item = AssemblerId> + '_ {
        let def = self.recipe(recipe);
        self.assemblers().filter_map(move |(id, a)| match def {
            Some(r) if a.can_craft(r) => Some(id),
            _ => None,
        })
    }

    /// Technologies that unlock the recipe. Empty if the recipe is never gated.
    pub fn unlocked_by(&self, recipe: RecipeId) -> &[TechnologyId] {
        self.unlocked_by
            .get(&recipe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    fn item(name: &str) -> ItemDef {
        ItemDef {
            name: name.to_string(),
            kind: ItemKind::Solid,
            temperature: None,
        }
    }

    fn gear_recipe(plate: ItemId, gear: ItemId) -> RecipeDef {
        RecipeDef {
            name: "gear".to_string(),
            category: "crafting".to_string(),
            time: f64_to_fixed64(0.5),
            ingredients: vec![Ingredient {
                item: plate,
                quantity: f64_to_fixed64(2.0),
                temperature: None,
            }],
            products: vec![Product {
                item: gear,
                quantity: f64_to_fixed64(1.0),
                temperature: None,
            }],
        }
    }

    fn assembler(name: &str, speed: f64) -> AssemblerDef {
        AssemblerDef {
            name: name.to_string(),
            categories: vec!["crafting".to_string()],
            speed: f64_to_fixed64(speed),
            productivity: Fixed64::ZERO,
            module_slots: 2,
            is_miner: false,
            energy_usage: None,
        }
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    #[test]
    fn build_and_lookup_by_name() {
        let mut b = CatalogBuilder::new();
        let plate = b.register_item(item("iron-plate"));
        let gear = b.register_item(item("gear"));
        let recipe = b.register_recipe(gear_recipe(plate, gear));
        b.register_assembler(assembler("assembler-1", 0.5));
        let catalog = b.build().unwrap();

        assert_eq!(
            catalog.lookup(EntityKind::Recipe, "gear"),
            Ok(EntityRef::Recipe(recipe))
        );
        assert_eq!(
            catalog.lookup(EntityKind::Item, "gear"),
            Ok(EntityRef::Item(gear))
        );
        assert_eq!(catalog.name_of(EntityRef::Item(plate)), Some("iron-plate"));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let err = catalog.lookup(EntityKind::Module, "speed-module").unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotFound {
                kind: EntityKind::Module,
                name: "speed-module".to_string()
            }
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut b = CatalogBuilder::new();
        b.register_item(item("iron-plate"));
        b.register_item(item("iron-plate"));
        assert!(matches!(
            b.build(),
            Err(CatalogError::DuplicateName {
                kind: EntityKind::Item,
                ..
            })
        ));
    }

    #[test]
    fn recipe_with_unknown_item_rejected() {
        let mut b = CatalogBuilder::new();
        let plate = b.register_item(item("iron-plate"));
        b.register_recipe(gear_recipe(plate, ItemId(7)));
        assert!(matches!(
            b.build(),
            Err(CatalogError::InvalidRef {
                kind: EntityKind::Item,
                index: 7,
                ..
            })
        ));
    }

    #[test]
    fn zero_time_recipe_rejected() {
        let mut b = CatalogBuilder::new();
        let plate = b.register_item(item("iron-plate"));
        let gear = b.register_item(item("gear"));
        let mut recipe = gear_recipe(plate, gear);
        recipe.time = Fixed64::ZERO;
        b.register_recipe(recipe);
        assert!(matches!(b.build(), Err(CatalogError::InvalidValue { .. })));
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn assemblers_filtered_by_category() {
        let mut b = CatalogBuilder::new();
        let plate = b.register_item(item("iron-plate"));
        let gear = b.register_item(item("gear"));
        let recipe = b.register_recipe(gear_recipe(plate, gear));
        let a1 = b.register_assembler(assembler("assembler-1", 0.5));
        let mut furnace = assembler("furnace", 2.0);
        furnace.categories = vec!["smelting".to_string()];
        b.register_assembler(furnace);
        let catalog = b.build().unwrap();

        let found: Vec<_> = catalog.assemblers_for(recipe).collect();
        assert_eq!(found, vec![a1]);
    }

    #[test]
    fn technology_unlock_index() {
        let mut b = CatalogBuilder::new();
        let plate = b.register_item(item("iron-plate"));
        let gear = b.register_item(item("gear"));
        let recipe = b.register_recipe(gear_recipe(plate, gear));
        let tech = b.register_technology(TechnologyDef {
            name: "automation".to_string(),
            unlocks: vec![recipe],
        });
        let catalog = b.build().unwrap();
        assert_eq!(catalog.unlocked_by(recipe), &[tech]);
        assert!(catalog.unlocked_by(RecipeId(9)).is_empty());
    }

    #[test]
    fn module_limitation() {
        let module = ModuleDef {
            name: "productivity-module".to_string(),
            speed: f64_to_fixed64(-0.05),
            productivity: f64_to_fixed64(0.04),
            consumption: f64_to_fixed64(0.4),
            limitation: Some(vec![RecipeId(1)]),
        };
        assert!(module.allows(RecipeId(1)));
        assert!(!module.allows(RecipeId(0)));
    }

    #[test]
    fn temperature_range_is_inclusive() {
        let range = TemperatureRange {
            min: f64_to_fixed64(15.0),
            max: f64_to_fixed64(100.0),
        };
        assert!(range.contains(f64_to_fixed64(15.0)));
        assert!(range.contains(f64_to_fixed64(100.0)));
        assert!(!range.contains(f64_to_fixed64(165.0)));
    }
}
