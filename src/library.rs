//! Module Library - Immutable Fragment Catalog
//!
//! Loaded once, validated once, then shared by reference. The core only reads it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::ENGINE_VERSION;

pub type ModuleId = String;

/// The six module categories. Closed set: branching on category is always an
/// exhaustive match, so adding a category is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FacialPose,
    AnatomyPose,
    ApparelTextile,
    Product,
    Cinematography,
    GlobalRules,
}

impl Category {
    /// Canonical compile order for the five selectable categories. Global rules
    /// are not selectable and have their own fixed block.
    pub const SELECTABLE: [Category; 5] = [
        Category::FacialPose,
        Category::AnatomyPose,
        Category::ApparelTextile,
        Category::Product,
        Category::Cinematography,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            Category::FacialPose => "FACIAL POSE",
            Category::AnatomyPose => "ANATOMY & POSE",
            Category::ApparelTextile => "APPAREL & TEXTILE",
            Category::Product => "PRODUCT",
            Category::Cinematography => "CINEMATOGRAPHY",
            Category::GlobalRules => "GLOBAL RULES",
        }
    }
}

/// A reusable prompt fragment. Identity is `id`; two modules never share an id
/// within a loaded library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub category: Category,
    pub label: String,
    pub prompt_text: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// On-disk pack file: a versioned batch of module records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulePack {
    pub pack_version: String,
    pub engine_min_version: String,
    pub modules: Vec<Module>,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Duplicate module id: {0}")]
    DuplicateModuleId(String),

    #[error("Pack {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Invalid version string in pack {0}")]
    InvalidVersion(String),

    #[error("Failed to read pack file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pack file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Validated, immutable module library.
pub struct Library {
    by_id: HashMap<ModuleId, Module>,
    globals: Vec<Module>,
}

impl Library {
    /// Merge records into a library. Fails fatally on a repeated id.
    /// `globals` keeps the input order of the `global_rules` records.
    pub fn from_records(records: Vec<Module>) -> Result<Self, LibraryError> {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut globals = vec![];

        for module in records {
            if by_id.contains_key(&module.id) {
                return Err(LibraryError::DuplicateModuleId(module.id));
            }
            if module.category == Category::GlobalRules {
                globals.push(module.clone());
            }
            by_id.insert(module.id.clone(), module);
        }

        Ok(Self { by_id, globals })
    }

    /// Load every `*.json` pack file in a directory and merge them.
    pub fn load_from_dir(dir: &Path) -> Result<Self, LibraryError> {
        let mut records = vec![];
        if dir.exists() {
            let mut paths: Vec<_> = fs::read_dir(dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().map_or(false, |e| e == "json"))
                .collect();
            // Stable merge order regardless of directory iteration order
            paths.sort();

            for path in paths {
                let content = fs::read_to_string(&path)?;
                let pack: ModulePack = serde_json::from_str(&content)?;
                check_engine_version(&path.display().to_string(), &pack)?;
                records.extend(pack.modules);
            }
        }
        Self::from_records(records)
    }

    pub fn get(&self, id: &str) -> Option<&Module> {
        self.by_id.get(id)
    }

    /// Global-rule modules in library-load order.
    pub fn globals(&self) -> &[Module] {
        &self.globals
    }

    /// All modules, sorted by id for stable listing output.
    pub fn list(&self) -> Vec<&Module> {
        let mut modules: Vec<_> = self.by_id.values().collect();
        modules.sort_by(|a, b| a.id.cmp(&b.id));
        modules
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn check_engine_version(pack_name: &str, pack: &ModulePack) -> Result<(), LibraryError> {
    let engine = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| LibraryError::InvalidVersion(pack_name.to_string()))?;
    let min = semver::Version::parse(&pack.engine_min_version)
        .map_err(|_| LibraryError::InvalidVersion(pack_name.to_string()))?;

    if engine < min {
        return Err(LibraryError::EngineVersionMismatch(
            pack_name.to_string(),
            pack.engine_min_version.clone(),
            ENGINE_VERSION.to_string(),
        ));
    }

    Ok(())
}
