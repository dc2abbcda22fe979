//! Serde records for catalog data files.
//!
//! Records name every cross reference by string; the loader resolves them
//! into catalog ids. Quantities are plain floats on disk and become
//! `Fixed64` in the catalog.

use foreman_core::catalog::ItemKind;
use serde::{Deserialize, Serialize};

// ===========================================================================
// Items
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub kind: ItemKind,
    /// Default temperature for fluids entering from a supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe input: `("iron-plate", 2.0)` or the full form with an
/// accepted temperature window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeInputData {
    Short(String, f64),
    Full {
        item: String,
        quantity: f64,
        #[serde(default)]
        min_temperature: Option<f64>,
        #[serde(default)]
        max_temperature: Option<f64>,
    },
}

impl RecipeInputData {
    pub fn item(&self) -> &str {
        match self {
            RecipeInputData::Short(item, _) | RecipeInputData::Full { item, .. } => item,
        }
    }
}

/// A recipe output: `("steam", 60.0)` or the full form with a temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipeOutputData {
    Short(String, f64),
    Full {
        item: String,
        quantity: f64,
        #[serde(default)]
        temperature: Option<f64>,
    },
}

impl RecipeOutputData {
    pub fn item(&self) -> &str {
        match self {
            RecipeOutputData::Short(item, _) | RecipeOutputData::Full { item, .. } => item,
        }
    }
}

fn default_category() -> String {
    "crafting".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Seconds per craft at speed 1.
    pub time: f64,
    #[serde(default)]
    pub inputs: Vec<RecipeInputData>,
    pub outputs: Vec<RecipeOutputData>,
}

// ===========================================================================
// Machines
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblerData {
    pub name: String,
    pub categories: Vec<String>,
    pub speed: f64,
    #[serde(default)]
    pub productivity: f64,
    #[serde(default)]
    pub module_slots: u32,
    #[serde(default)]
    pub miner: bool,
    /// Watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_usage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    pub name: String,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub productivity: f64,
    #[serde(default)]
    pub consumption: f64,
    /// Recipe names the module is restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitation: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconData {
    pub name: String,
    pub distribution_effectivity: f64,
    pub module_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyData {
    pub name: String,
    #[serde(default)]
    pub unlocks: Vec<String>,
}

// ===========================================================================
// Tests
// ===========================================================================
