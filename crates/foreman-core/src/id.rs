use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (recipe, supplier, consumer or passthrough) in the graph.
    pub struct NodeId;

    /// Identifies a link between an output slot and an input slot.
    pub struct LinkId;
}

/// Identifies an item in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a recipe in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies an assembler (crafting machine or miner) in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssemblerId(pub u32);

/// Identifies a module in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// Identifies a beacon in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeaconId(pub u32);

/// Identifies a technology in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechnologyId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn catalog_ids_order_by_index() {
        let mut ids = vec![RecipeId(3), RecipeId(0), RecipeId(2)];
        ids.sort();
        assert_eq!(ids, vec![RecipeId(0), RecipeId(2), RecipeId(3)]);
    }

    #[test]
    fn node_ids_are_stable_after_removal() {
        let mut map: SlotMap<NodeId, &str> = SlotMap::with_key();
        let a = map.insert("supplier");
        let b = map.insert("consumer");
        map.remove(a);
        let c = map.insert("recipe");
        assert_ne!(a, c, "a reused slot must get a new generation");
        assert_eq!(map[b], "consumer");
        assert!(!map.contains_key(a));
    }
}
