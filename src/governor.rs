//! Governor - Event-Driven Session State
//!
//! The only mutable-looking entity in the crate. Every event produces a
//! brand-new snapshot; the previous one is never touched, so callers may hold
//! old snapshots for inspection or undo. `reduce` never fails: invalid input
//! surfaces on the snapshot's error list, never as a panic or a hard error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compiler::{compile_prompt, CompileInput};
use crate::hashing::{fingerprint, sha256_hex};
use crate::library::{Category, Library, Module, ModuleId};
use crate::scope::{derive_meta, RefKind, Scope};
use crate::validation::{
    unknown_module_message, validate_state, ENVIRONMENT_ONLY_ERROR, HANDS_ONLY_ERROR,
};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

/// The three external reference handles. Absence means not supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSlots {
    pub character: Option<String>,
    pub product: Option<String>,
    pub environment: Option<String>,
}

impl RefSlots {
    pub fn get(&self, kind: RefKind) -> Option<&str> {
        match kind {
            RefKind::Character => self.character.as_deref(),
            RefKind::Product => self.product.as_deref(),
            RefKind::Environment => self.environment.as_deref(),
        }
    }

    fn set(&mut self, kind: RefKind, value: Option<String>) {
        match kind {
            RefKind::Character => self.character = value,
            RefKind::Product => self.product = value,
            RefKind::Environment => self.environment = value,
        }
    }
}

/// Per-category selection lists. v1 cap: each list holds at most one id and a
/// new selection replaces the old one. Preserve replace-on-select exactly;
/// do not generalize to multi-select.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub facial_pose: Vec<ModuleId>,
    pub anatomy_pose: Vec<ModuleId>,
    pub apparel_textile: Vec<ModuleId>,
    pub product: Vec<ModuleId>,
    pub cinematography: Vec<ModuleId>,
}

impl Selection {
    pub fn slot(&self, category: Category) -> &[ModuleId] {
        match category {
            Category::FacialPose => &self.facial_pose,
            Category::AnatomyPose => &self.anatomy_pose,
            Category::ApparelTextile => &self.apparel_textile,
            Category::Product => &self.product,
            Category::Cinematography => &self.cinematography,
            Category::GlobalRules => &[],
        }
    }

    fn slot_mut(&mut self, category: Category) -> Option<&mut Vec<ModuleId>> {
        match category {
            Category::FacialPose => Some(&mut self.facial_pose),
            Category::AnatomyPose => Some(&mut self.anatomy_pose),
            Category::ApparelTextile => Some(&mut self.apparel_textile),
            Category::Product => Some(&mut self.product),
            Category::Cinematography => Some(&mut self.cinematography),
            Category::GlobalRules => None,
        }
    }

    /// Selected ids flattened in canonical category order.
    pub fn iter_ids(&self) -> impl Iterator<Item = &ModuleId> + '_ {
        Category::SELECTABLE.into_iter().flat_map(move |c| self.slot(c).iter())
    }

    pub fn count(&self) -> usize {
        self.iter_ids().count()
    }
}

/// Governed compile artifact attached to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    pub prompt: String,
    pub used_module_ids: Vec<ModuleId>,
    pub deduped_constraints: Vec<String>,
    pub fingerprint: String,
    pub prompt_hash: String,
    pub engine_version: String,
    pub compiled_at: DateTime<Utc>,
}

/// One immutable session snapshot.
///
/// Invariant: `errors` non-empty implies `compiled` is `None`; a present
/// `compiled` implies `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub refs: RefSlots,
    pub selection: Selection,
    pub variations: Vec<String>,
    pub compiled: Option<CompiledPrompt>,
    pub errors: Vec<String>,
}

/// Discrete session events. Any event may follow any other; the machine is
/// re-enterable indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SetRef { slot: RefKind, value: String },
    ClearRef { slot: RefKind },
    AddVariation { id: String },
    RemoveVariation { id: String },
    ClearCategory { category: Category },
    DeselectModule { id: String },
    SelectModule { id: String },
    Compile,
}

/// Pure transition function: previous snapshot + event -> next snapshot.
pub fn reduce(state: &AppState, event: Event, library: &Library) -> AppState {
    let mut next = state.clone();

    match event {
        Event::SetRef { slot, value } => {
            next.refs.set(slot, Some(value));
        }
        Event::ClearRef { slot } => {
            next.refs.set(slot, None);
        }
        Event::AddVariation { id } => {
            if !next.variations.contains(&id) {
                next.variations.push(id);
            }
        }
        Event::RemoveVariation { id } => {
            next.variations.retain(|v| v != &id);
        }
        Event::ClearCategory { category } => {
            if let Some(slot) = next.selection.slot_mut(category) {
                slot.clear();
            }
        }
        Event::DeselectModule { id } => {
            deselect_module(&mut next, &id, library);
        }
        Event::SelectModule { id } => return select_module(state, id, library),
        Event::Compile => return run_compile(state, library),
    }

    revalidate(&mut next, library);
    next
}

fn revalidate(state: &mut AppState, library: &Library) {
    #[cfg(feature = "test-hooks")]
    VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

    state.errors = validate_state(state, library);
    if !state.errors.is_empty() {
        state.compiled = None;
    }
}

fn deselect_module(state: &mut AppState, id: &str, library: &Library) {
    match library.get(id) {
        Some(module) => {
            if let Some(slot) = state.selection.slot_mut(module.category) {
                slot.retain(|m| m != id);
            }
        }
        // Unknown to the library: scrub every category so a stale id cannot
        // wedge the session.
        None => {
            for category in Category::SELECTABLE {
                if let Some(slot) = state.selection.slot_mut(category) {
                    slot.retain(|m| m != id);
                }
            }
        }
    }
}

fn select_module(state: &AppState, id: ModuleId, library: &Library) -> AppState {
    let mut next = state.clone();

    let module = match library.get(&id) {
        Some(module) => module,
        None => {
            next.errors = vec![unknown_module_message(&id)];
            next.compiled = None;
            return next;
        }
    };

    // Exclusivity pre-check against the other categories, before mutating.
    // A rejected selection never takes effect.
    let others: Vec<&Module> = Category::SELECTABLE
        .into_iter()
        .filter(|c| *c != module.category)
        .flat_map(|c| state.selection.slot(c).iter())
        .filter_map(|mid| library.get(mid))
        .collect();

    let incoming = derive_meta(module);
    let clashes = |scope: Scope| {
        (incoming.scope == scope && !others.is_empty())
            || others.iter().any(|m| derive_meta(m).scope == scope)
    };

    if clashes(Scope::HandsOnly) {
        next.errors = vec![HANDS_ONLY_ERROR.to_string()];
        next.compiled = None;
        return next;
    }
    if clashes(Scope::EnvironmentOnly) {
        next.errors = vec![ENVIRONMENT_ONLY_ERROR.to_string()];
        next.compiled = None;
        return next;
    }

    // v1 cap: the new selection evicts whatever held the category.
    if let Some(slot) = next.selection.slot_mut(module.category) {
        *slot = vec![id];
    }

    revalidate(&mut next, library);
    next
}

fn run_compile(state: &AppState, library: &Library) -> AppState {
    let mut next = state.clone();

    revalidate(&mut next, library);
    if !next.errors.is_empty() {
        return next;
    }

    let input = CompileInput {
        character_ref: next.refs.character.clone(),
        product_ref: next.refs.product.clone(),
        environment_ref: next.refs.environment.clone(),
        selected_modules: next.selection.iter_ids().cloned().collect(),
        variation_ids: next.variations.clone(),
    };

    match compile_prompt(&input, library) {
        Ok(output) => {
            next.compiled = Some(CompiledPrompt {
                fingerprint: fingerprint(&next),
                prompt_hash: sha256_hex(output.prompt.as_bytes()),
                prompt: output.prompt,
                used_module_ids: output.used_module_ids,
                deduped_constraints: output.deduped_constraints,
                engine_version: ENGINE_VERSION.to_string(),
                compiled_at: Utc::now(),
            });
            next.errors.clear();
        }
        // Unreachable from an error-free snapshot; kept so reduce stays total
        // even if the compiler and validator ever disagree.
        Err(err) => {
            next.errors = vec![err.to_string()];
            next.compiled = None;
        }
    }

    next
}

/// A governed editing session: one library, one current snapshot.
///
/// Synchronous and single-writer by design; concurrent callers must serialize
/// access externally.
pub struct Session {
    id: String,
    library: Library,
    state: AppState,
}

impl Session {
    pub fn new(library: Library) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            library,
            state: AppState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatch(&mut self, event: Event) -> &AppState {
        self.state = reduce(&self.state, event, &self.library);
        &self.state
    }
}
