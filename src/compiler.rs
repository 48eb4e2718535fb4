//! Prompt Compiler - Pure Assembly
//!
//! CRITICAL: compile_prompt re-checks reference requirements itself. Callers
//! bypassing the governor get hard errors, never silently broken output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::library::{Category, Library, Module, ModuleId};
use crate::scope::{derive_meta, RefKind};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Duplicate selected module id: {0}")]
    DuplicateSelectedId(String),

    #[error("Unknown module id: {0}")]
    UnknownModuleId(String),

    #[error("Missing required reference: {}", .0.label())]
    MissingReference(RefKind),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileInput {
    #[serde(default)]
    pub character_ref: Option<String>,
    #[serde(default)]
    pub product_ref: Option<String>,
    #[serde(default)]
    pub environment_ref: Option<String>,
    #[serde(default)]
    pub selected_modules: Vec<ModuleId>,
    #[serde(default)]
    pub variation_ids: Vec<String>,
}

impl CompileInput {
    fn reference(&self, kind: RefKind) -> Option<&str> {
        match kind {
            RefKind::Character => self.character_ref.as_deref(),
            RefKind::Product => self.product_ref.as_deref(),
            RefKind::Environment => self.environment_ref.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutput {
    pub prompt: String,
    pub used_module_ids: Vec<ModuleId>,
    pub deduped_constraints: Vec<String>,
}

/// Compile a validated selection into the final prompt text.
///
/// Determinism contract: for a fixed library, a fixed *set* of selected ids
/// (any order) and fixed references, `prompt` and `deduped_constraints` are
/// byte-identical across calls. `used_module_ids` preserves caller order and
/// is the only order-sensitive output field.
pub fn compile_prompt(input: &CompileInput, library: &Library) -> Result<CompileOutput, CompileError> {
    let mut seen = HashSet::new();
    for id in &input.selected_modules {
        if !seen.insert(id.as_str()) {
            return Err(CompileError::DuplicateSelectedId(id.clone()));
        }
    }

    let mut resolved: Vec<&Module> = Vec::with_capacity(input.selected_modules.len());
    for id in &input.selected_modules {
        let module = library
            .get(id)
            .ok_or_else(|| CompileError::UnknownModuleId(id.clone()))?;
        resolved.push(module);
    }

    // Defense in depth: re-check requirements even though the governor only
    // compiles error-free snapshots.
    for kind in RefKind::ALL {
        let needed = resolved.iter().any(|m| derive_meta(m).requires.requires(kind));
        if needed && input.reference(kind).is_none() {
            return Err(CompileError::MissingReference(kind));
        }
    }

    // BTreeSet gives exact-string dedup plus lexicographic order, the single
    // source of determinism for constraints.
    let constraints: BTreeSet<&str> = resolved
        .iter()
        .flat_map(|m| m.constraints.iter().map(String::as_str))
        .collect();
    let deduped_constraints: Vec<String> = constraints.into_iter().map(String::from).collect();

    let mut blocks = vec![];
    blocks.push(references_block(input));
    blocks.push(globals_block(library));

    for category in Category::SELECTABLE {
        let mut in_category: Vec<&Module> =
            resolved.iter().filter(|m| m.category == category).copied().collect();
        in_category.sort_by(|a, b| a.id.cmp(&b.id));
        let body: Vec<&str> = in_category
            .iter()
            .map(|m| m.prompt_text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect();
        // A block with no body is omitted entirely, heading included.
        if body.is_empty() {
            continue;
        }
        blocks.push(format!("{}\n{}", category.heading(), body.join("\n\n")));
    }

    if !input.variation_ids.is_empty() {
        blocks.push(format!("VARIATIONS\n{}", input.variation_ids.join("\n")));
    }

    if !deduped_constraints.is_empty() {
        let items: Vec<String> = deduped_constraints.iter().map(|c| format!("- {c}")).collect();
        blocks.push(format!("CONSTRAINTS\n{}", items.join("\n")));
    }

    Ok(CompileOutput {
        prompt: normalize(&blocks.join("\n\n")),
        used_module_ids: input.selected_modules.clone(),
        deduped_constraints,
    })
}

fn references_block(input: &CompileInput) -> String {
    let mut lines = vec![];
    if let Some(handle) = &input.character_ref {
        lines.push(format!("Character identity locked to CHARACTER REFERENCE IMAGE ({handle})."));
    }
    if let Some(handle) = &input.product_ref {
        lines.push(format!("Product appearance locked to PRODUCT REFERENCE IMAGE ({handle})."));
    }
    if let Some(handle) = &input.environment_ref {
        lines.push(format!("Setting locked to ENVIRONMENT REFERENCE IMAGE ({handle})."));
    }
    if lines.is_empty() {
        lines.push("No reference images supplied.".to_string());
    }
    format!("IDENTITY & REFERENCES\n{}", lines.join("\n"))
}

/// Always emitted, even for an empty selection.
fn globals_block(library: &Library) -> String {
    let body: Vec<&str> = library.globals().iter().map(|m| m.prompt_text.as_str()).collect();
    format!("{}\n{}", Category::GlobalRules.heading(), body.join("\n\n"))
}

/// Trim, collapse runs of 3+ newlines to exactly 2, end with one newline.
fn normalize(text: &str) -> String {
    let mut out = text.trim().to_string();
    while out.contains("\n\n\n") {
        out = out.replace("\n\n\n", "\n\n");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Library {
        Library::from_records(vec![
            Module {
                id: "rules-sheet".to_string(),
                category: Category::GlobalRules,
                label: "Contact sheet".to_string(),
                prompt_text: "Render a photographic contact sheet.".to_string(),
                constraints: vec![],
            },
            Module {
                id: "pose-lean".to_string(),
                category: Category::AnatomyPose,
                label: "Lean".to_string(),
                prompt_text: "Relaxed lean against a wall.".to_string(),
                constraints: vec!["No motion blur".to_string()],
            },
            Module {
                id: "face-soft".to_string(),
                category: Category::FacialPose,
                label: "Soft gaze".to_string(),
                prompt_text: "Soft gaze matching the CHARACTER REFERENCE IMAGE.".to_string(),
                constraints: vec!["No motion blur".to_string()],
            },
            Module {
                id: "cine-placeholder".to_string(),
                category: Category::Cinematography,
                label: "Placeholder".to_string(),
                prompt_text: String::new(),
                constraints: vec!["Keep framing loose".to_string()],
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_selected_id() {
        let input = CompileInput {
            selected_modules: vec!["pose-lean".to_string(), "pose-lean".to_string()],
            ..Default::default()
        };
        let err = compile_prompt(&input, &library()).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateSelectedId(id) if id == "pose-lean"));
    }

    #[test]
    fn test_unknown_module_id() {
        let input = CompileInput {
            selected_modules: vec!["pose-missing".to_string()],
            ..Default::default()
        };
        let err = compile_prompt(&input, &library()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownModuleId(id) if id == "pose-missing"));
    }

    #[test]
    fn test_missing_reference_rejected() {
        let input = CompileInput {
            selected_modules: vec!["face-soft".to_string()],
            ..Default::default()
        };
        let err = compile_prompt(&input, &library()).unwrap_err();
        assert!(matches!(err, CompileError::MissingReference(RefKind::Character)));
    }

    #[test]
    fn test_empty_body_block_omitted() {
        let input = CompileInput {
            selected_modules: vec!["cine-placeholder".to_string()],
            ..Default::default()
        };
        let output = compile_prompt(&input, &library()).unwrap();

        // No body text: the heading must not appear either
        assert!(!output.prompt.contains("CINEMATOGRAPHY"));
        // The module still contributes its constraints
        assert_eq!(output.deduped_constraints, vec!["Keep framing loose".to_string()]);
    }

    #[test]
    fn test_category_blocks_in_canonical_order() {
        let input = CompileInput {
            character_ref: Some("char-01".to_string()),
            selected_modules: vec!["pose-lean".to_string(), "face-soft".to_string()],
            ..Default::default()
        };
        let output = compile_prompt(&input, &library()).unwrap();
        let face = output.prompt.find("FACIAL POSE").unwrap();
        let pose = output.prompt.find("ANATOMY & POSE").unwrap();
        assert!(face < pose, "facial block must precede anatomy block");
        assert!(output.prompt.ends_with('\n'));
        assert!(!output.prompt.ends_with("\n\n"));
    }
}
