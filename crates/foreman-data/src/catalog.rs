//! Catalog loading: reads a data directory and builds an immutable
//! [`Catalog`].
//!
//! Required files are `items`, `recipes` and `assemblers`; `modules`,
//! `beacons` and `technologies` are optional. Each may be RON, JSON or TOML.

use foreman_core::catalog::{
    AssemblerDef, BeaconDef, Catalog, CatalogBuilder, Ingredient, ItemDef, ModuleDef, Product,
    RecipeDef, TechnologyDef, TemperatureRange,
};
use foreman_core::fixed::{Fixed64, f64_to_fixed64};
use foreman_core::id::{ItemId, RecipeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::format::{DataLoadError, deserialize_list, find_data_file, require_data_file};
use crate::schema::*;

// ===========================================================================
// Public entry points
// ===========================================================================

/// Load the catalog stored in `dir`.
pub fn load_catalog(dir: &Path) -> Result<Catalog, DataLoadError> {
    load_catalog_cancellable(dir, &AtomicBool::new(false))
}

/// Load the catalog stored in `dir`, giving up with
/// [`DataLoadError::Cancelled`] once `cancel` is set. The flag is checked
/// before every file.
pub fn load_catalog_cancellable(dir: &Path, cancel: &AtomicBool) -> Result<Catalog, DataLoadError> {
    let mut loader = DirLoader {
        dir,
        cancel,
        builder: CatalogBuilder::new(),
        items: HashMap::new(),
        recipes: HashMap::new(),
    };
    loader.items()?;
    loader.recipes()?;
    loader.assemblers()?;
    loader.modules()?;
    loader.beacons()?;
    loader.technologies()?;
    loader.check_cancel()?;

    let catalog = loader.builder.build()?;
    info!(
        dir = %dir.display(),
        items = catalog.item_count(),
        recipes = catalog.recipe_count(),
        "catalog loaded"
    );
    Ok(catalog)
}

// ===========================================================================
// Directory loader
// ===========================================================================

struct DirLoader<'a> {
    dir: &'a Path,
    cancel: &'a AtomicBool,
    builder: CatalogBuilder,
    items: HashMap<String, ItemId>,
    recipes: HashMap<String, RecipeId>,
}

impl DirLoader<'_> {
    fn check_cancel(&self) -> Result<(), DataLoadError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(DataLoadError::Cancelled);
        }
        Ok(())
    }

    fn required(&self, base: &str) -> Result<PathBuf, DataLoadError> {
        self.check_cancel()?;
        require_data_file(self.dir, base)
    }

    fn optional(&self, base: &str) -> Result<Option<PathBuf>, DataLoadError> {
        self.check_cancel()?;
        let found = find_data_file(self.dir, base)?;
        if found.is_none() {
            debug!(file = base, "optional catalog file absent");
        }
        Ok(found)
    }

    fn items(&mut self) -> Result<(), DataLoadError> {
        let path = self.required("items")?;
        let records: Vec<ItemData> = deserialize_list(&path, "items")?;
        for rec in records {
            check_duplicate(&self.items, &rec.name, &path)?;
            let id = self.builder.register_item(ItemDef {
                name: rec.name.clone(),
                kind: rec.kind,
                temperature: rec.temperature.map(f64_to_fixed64),
            });
            self.items.insert(rec.name, id);
        }
        Ok(())
    }

    fn recipes(&mut self) -> Result<(), DataLoadError> {
        let path = self.required("recipes")?;
        let records: Vec<RecipeData> = deserialize_list(&path, "recipes")?;
        for rec in records {
            check_duplicate(&self.recipes, &rec.name, &path)?;
            let ingredients = rec
                .inputs
                .iter()
                .map(|input| self.ingredient(input, &path))
                .collect::<Result<Vec<_>, _>>()?;
            let products = rec
                .outputs
                .iter()
                .map(|output| self.product(output, &path))
                .collect::<Result<Vec<_>, _>>()?;
            let id = self.builder.register_recipe(RecipeDef {
                name: rec.name.clone(),
                category: rec.category,
                time: f64_to_fixed64(rec.time),
                ingredients,
                products,
            });
            self.recipes.insert(rec.name, id);
        }
        Ok(())
    }

    fn ingredient(&self, input: &RecipeInputData, path: &Path) -> Result<Ingredient, DataLoadError> {
        let item = *resolve_name(&self.items, input.item(), path, "item")?;
        Ok(match *input {
            RecipeInputData::Short(_, quantity) => Ingredient {
                item,
                quantity: f64_to_fixed64(quantity),
                temperature: None,
            },
            RecipeInputData::Full {
                quantity,
                min_temperature,
                max_temperature,
                ..
            } => Ingredient {
                item,
                quantity: f64_to_fixed64(quantity),
                temperature: (min_temperature.is_some() || max_temperature.is_some()).then(|| {
                    TemperatureRange {
                        min: min_temperature.map_or(Fixed64::MIN, f64_to_fixed64),
                        max: max_temperature.map_or(Fixed64::MAX, f64_to_fixed64),
                    }
                }),
            },
        })
    }

    fn product(&self, output: &RecipeOutputData, path: &Path) -> Result<Product, DataLoadError> {
        let item = *resolve_name(&self.items, output.item(), path, "item")?;
        let (quantity, temperature) = match *output {
            RecipeOutputData::Short(_, q) => (q, None),
            RecipeOutputData::Full {
                quantity,
                temperature,
                ..
            } => (quantity, temperature),
        };
        Ok(Product {
            item,
            quantity: f64_to_fixed64(quantity),
            temperature: temperature.map(f64_to_fixed64),
        })
    }

    fn assemblers(&mut self) -> Result<(), DataLoadError> {
        let path = self.required("assemblers")?;
        let records: Vec<AssemblerData> = deserialize_list(&path, "assemblers")?;
        let mut seen = HashMap::new();
        for rec in records {
            check_duplicate(&seen, &rec.name, &path)?;
            seen.insert(rec.name.clone(), ());
            self.builder.register_assembler(AssemblerDef {
                name: rec.name,
                categories: rec.categories,
                speed: f64_to_fixed64(rec.speed),
                productivity: f64_to_fixed64(rec.productivity),
                module_slots: rec.module_slots,
                is_miner: rec.miner,
                energy_usage: rec.energy_usage.map(f64_to_fixed64),
            });
        }
        Ok(())
    }

    fn modules(&mut self) -> Result<(), DataLoadError> {
        let Some(path) = self.optional("modules")? else {
            return Ok(());
        };
        let records: Vec<ModuleData> = deserialize_list(&path, "modules")?;
        let mut seen = HashMap::new();
        for rec in records {
            check_duplicate(&seen, &rec.name, &path)?;
            seen.insert(rec.name.clone(), ());
            let limitation = match &rec.limitation {
                Some(names) => Some(self.resolve_recipes(names, &path)?),
                None => None,
            };
            self.builder.register_module(ModuleDef {
                name: rec.name,
                speed: f64_to_fixed64(rec.speed),
                productivity: f64_to_fixed64(rec.productivity),
                consumption: f64_to_fixed64(rec.consumption),
                limitation,
            });
        }
        Ok(())
    }

    fn beacons(&mut self) -> Result<(), DataLoadError> {
        let Some(path) = self.optional("beacons")? else {
            return Ok(());
        };
        let records: Vec<BeaconData> = deserialize_list(&path, "beacons")?;
        for rec in records {
            self.builder.register_beacon(BeaconDef {
                name: rec.name,
                distribution_effectivity: f64_to_fixed64(rec.distribution_effectivity),
                module_slots: rec.module_slots,
            });
        }
        Ok(())
    }

    fn technologies(&mut self) -> Result<(), DataLoadError> {
        let Some(path) = self.optional("technologies")? else {
            return Ok(());
        };
        let records: Vec<TechnologyData> = deserialize_list(&path, "technologies")?;
        for rec in records {
            let unlocks = self.resolve_recipes(&rec.unlocks, &path)?;
            self.builder.register_technology(TechnologyDef {
                name: rec.name,
                unlocks,
            });
        }
        Ok(())
    }

    fn resolve_recipes(&self, names: &[String], path: &Path) -> Result<Vec<RecipeId>, DataLoadError> {
        names
            .iter()
            .map(|n| resolve_name(&self.recipes, n, path, "recipe").copied())
            .collect()
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
