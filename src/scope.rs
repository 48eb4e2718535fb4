//! Scope & Reference Deriver
//!
//! Requirements and mutual-exclusion scope are inferred from literal marker
//! phrases inside a module's prompt text, not from a schema field. A wording
//! change in a module silently changes validation behavior; promoting these
//! markers to explicit metadata is tracked as a library-schema follow-up.

use serde::{Deserialize, Serialize};

use crate::library::{Category, Module};

const CHARACTER_MARKER: &str = "CHARACTER REFERENCE IMAGE";
const PRODUCT_MARKER: &str = "PRODUCT REFERENCE IMAGE";
const ENVIRONMENT_MARKER: &str = "ENVIRONMENT REFERENCE IMAGE";

/// The three external reference slots a module may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Character,
    Product,
    Environment,
}

impl RefKind {
    pub const ALL: [RefKind; 3] = [RefKind::Character, RefKind::Product, RefKind::Environment];

    pub fn label(&self) -> &'static str {
        match self {
            RefKind::Character => "character",
            RefKind::Product => "product",
            RefKind::Environment => "environment",
        }
    }
}

/// Which reference images a module's text demands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRequirements {
    pub character: bool,
    pub product: bool,
    pub environment: bool,
}

impl RefRequirements {
    pub fn requires(&self, kind: RefKind) -> bool {
        match kind {
            RefKind::Character => self.character,
            RefKind::Product => self.product,
            RefKind::Environment => self.environment,
        }
    }
}

/// Mutual-exclusion class of a module. `Mixed` is reserved for a future
/// multi-region derivation and is never produced by the current rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    FullBody,
    FaceOnly,
    HandsOnly,
    EnvironmentOnly,
    Mixed,
}

/// Derived view of a module. Recomputed on demand, never cached in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub requires: RefRequirements,
    pub scope: Scope,
}

/// Pure, total derivation of a module's metadata. First scope rule wins.
pub fn derive_meta(module: &Module) -> ModuleMeta {
    let requires = RefRequirements {
        character: module.prompt_text.contains(CHARACTER_MARKER),
        product: module.prompt_text.contains(PRODUCT_MARKER),
        environment: module.prompt_text.contains(ENVIRONMENT_MARKER),
    };

    let lowered = module.prompt_text.to_lowercase();

    let scope = if lowered.contains("hands only") {
        Scope::HandsOnly
    } else if requires.environment && !requires.character && !requires.product {
        Scope::EnvironmentOnly
    } else if module.category == Category::FacialPose {
        Scope::FaceOnly
    } else if lowered.contains("facial close-up") {
        Scope::FaceOnly
    } else {
        Scope::FullBody
    };

    ModuleMeta { requires, scope }
}
