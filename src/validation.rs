//! Validation System - Soft Error Accumulation
//!
//! The validator never fails; it reports the full ordered error list for a
//! snapshot. A non-empty list is the sole authority that blocks compilation.

use crate::governor::AppState;
use crate::library::{Library, Module};
use crate::scope::{derive_meta, RefKind, Scope};

pub const HANDS_ONLY_ERROR: &str = "Hands-only modules must be selected alone.";
pub const ENVIRONMENT_ONLY_ERROR: &str = "Environment-only modules must be selected alone.";

pub fn missing_ref_message(kind: RefKind) -> String {
    format!("Missing {} reference.", kind.label())
}

pub fn unknown_module_message(id: &str) -> String {
    format!("Unknown module id: '{id}'")
}

/// Full error list for a snapshot, in fixed rule order: unknown-id guard,
/// then missing references (character, product, environment), then hands-only
/// exclusivity, then environment-only exclusivity. Each rule contributes at
/// most one message per call.
pub fn validate_state(state: &AppState, library: &Library) -> Vec<String> {
    let mut errors = vec![];

    let mut resolved: Vec<&Module> = vec![];
    for id in state.selection.iter_ids() {
        match library.get(id) {
            Some(module) => resolved.push(module),
            // Unreachable through the governor, which rejects unknown ids at
            // selection time; kept as a guard for hand-built states.
            None => errors.push(unknown_module_message(id)),
        }
    }

    let metas: Vec<_> = resolved.iter().map(|m| derive_meta(m)).collect();

    for kind in RefKind::ALL {
        let needed = metas.iter().any(|meta| meta.requires.requires(kind));
        if needed && state.refs.get(kind).is_none() {
            errors.push(missing_ref_message(kind));
        }
    }

    // Total selected count, not resolved count: an unresolvable id still
    // occupies a selection slot and must not mask an exclusivity clash.
    if state.selection.count() > 1 {
        if metas.iter().any(|meta| meta.scope == Scope::HandsOnly) {
            errors.push(HANDS_ONLY_ERROR.to_string());
        }
        if metas.iter().any(|meta| meta.scope == Scope::EnvironmentOnly) {
            errors.push(ENVIRONMENT_ONLY_ERROR.to_string());
        }
    }

    errors
}
