//! PromptLoom Core - Deterministic Prompt Compiler
//!
//! # The Five Guarantees (Non-Negotiable)
//! 1. The Library Is Immutable
//! 2. Validation Gates Compilation
//! 3. Output Is Deterministic
//! 4. Fingerprints Ignore History
//! 5. Callers Dispatch, Governor Enforces

pub mod compiler;
pub mod governor;
pub mod hashing;
pub mod library;
pub mod scope;
pub mod validation;

pub use compiler::{compile_prompt, CompileError, CompileInput, CompileOutput};
pub use governor::{reduce, AppState, CompiledPrompt, Event, RefSlots, Selection, Session};
pub use hashing::{canonical_json, fingerprint, rolling_hash_hex, sha256_hex};
pub use library::{Category, Library, LibraryError, Module, ModuleId, ModulePack};
pub use scope::{derive_meta, ModuleMeta, RefKind, RefRequirements, Scope};
pub use validation::validate_state;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
