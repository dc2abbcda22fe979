//! Temp-directory helpers and a small catalog written across all three
//! formats.

use std::fs;
use std::path::{Path, PathBuf};

/// Create a temporary directory with a unique name for test isolation.
pub fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "foreman_data_test_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

pub const SAMPLE_ITEMS_RON: &str = r#"[
    (name: "iron-ore"),
    (name: "iron-plate"),
    (name: "gear"),
    (name: "water", kind: fluid, temperature: Some(15.0)),
    (name: "steam", kind: fluid, temperature: Some(165.0)),
    (name: "power"),
]"#;

pub const SAMPLE_RECIPES_JSON: &str = r#"[
    {"name": "iron-plate", "category": "smelting", "time": 3.2,
     "inputs": [["iron-ore", 1]], "outputs": [["iron-plate", 1]]},
    {"name": "gear", "time": 0.5,
     "inputs": [["iron-plate", 2]], "outputs": [["gear", 1]]},
    {"name": "turbine", "category": "generating", "time": 1,
     "inputs": [{"item": "steam", "quantity": 60, "min_temperature": 150}],
     "outputs": [["power", 1]]}
]"#;

pub const SAMPLE_ASSEMBLERS_TOML: &str = r#"
[[assemblers]]
name = "assembler-1"
categories = ["crafting"]
speed = 0.5
energy_usage = 75000.0

[[assemblers]]
name = "assembler-2"
categories = ["crafting"]
speed = 0.75
module_slots = 2
energy_usage = 150000.0

[[assemblers]]
name = "furnace"
categories = ["smelting"]
speed = 2.0

[[assemblers]]
name = "steam-turbine"
categories = ["generating"]
speed = 1.0
"#;

pub const SAMPLE_MODULES_JSON: &str = r#"[
    {"name": "speed-1", "speed": 0.2, "consumption": 0.5},
    {"name": "productivity-1", "speed": -0.05, "productivity": 0.04,
     "consumption": 0.4, "limitation": ["gear", "iron-plate"]}
]"#;

pub const SAMPLE_BEACONS_RON: &str =
    r#"[(name: "beacon", distribution_effectivity: 0.5, module_slots: 2)]"#;

pub const SAMPLE_TECHNOLOGIES_TOML: &str = r#"
[[technologies]]
name = "automation"
unlocks = ["gear"]
"#;

/// Write the sample catalog into `dir`.
pub fn write_sample_catalog(dir: &Path) {
    fs::write(dir.join("items.ron"), SAMPLE_ITEMS_RON).unwrap();
    fs::write(dir.join("recipes.json"), SAMPLE_RECIPES_JSON).unwrap();
    fs::write(dir.join("assemblers.toml"), SAMPLE_ASSEMBLERS_TOML).unwrap();
    fs::write(dir.join("modules.json"), SAMPLE_MODULES_JSON).unwrap();
    fs::write(dir.join("beacons.ron"), SAMPLE_BEACONS_RON).unwrap();
    fs::write(dir.join("technologies.toml"), SAMPLE_TECHNOLOGIES_TOML).unwrap();
}
