//! Lookup table of the game's perks.
//!
//! The catalog is produced outside this crate; the editor only reads it to
//! fill node titles and to validate perk bindings before export.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One perk as the game describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePerk {
    /// Display name
    pub name: String,
    /// Display description
    #[serde(default)]
    pub description: String,
}

/// Perk id to perk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerkCatalog {
    perks: HashMap<String, GamePerk>,
}

impl PerkCatalog {
    /// Creates a catalog from an id map.
    pub fn new(perks: HashMap<String, GamePerk>) -> Self {
        Self { perks }
    }

    /// Parses a catalog from `{ "<id>": { "name": ..., "description": ... } }` JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads and parses a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read perk catalog {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("failed to parse perk catalog {}", path.display()))
    }

    /// Looks up a perk.
    pub fn get(&self, id: &str) -> Option<&GamePerk> {
        self.perks.get(id)
    }

    /// True if the catalog knows `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.perks.contains_key(id)
    }

    /// Number of perks.
    pub fn len(&self) -> usize {
        self.perks.len()
    }

    /// True if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.perks.is_empty()
    }
}

impl FromIterator<(String, GamePerk)> for PerkCatalog {
    fn from_iter<I: IntoIterator<Item = (String, GamePerk)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
