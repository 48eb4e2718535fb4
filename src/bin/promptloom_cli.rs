//! PromptLoom CLI - Bridge interface for the studio front-end
//!
//! Commands: modules, compile, session
//! Outputs JSON to stdout
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use promptloom_core::{compile_prompt, derive_meta, CompileInput, Event, Library, Session};

#[derive(Parser)]
#[command(name = "promptloom-cli")]
#[command(about = "PromptLoom CLI - Deterministic Prompt Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the module pack directory
    #[arg(short, long, default_value = "modules")]
    modules_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List loaded modules with derived scope and reference requirements
    Modules,

    /// Compile a selection directly (JSON payload: CompileInput)
    Compile {
        /// JSON payload (CompileInput)
        #[arg(short, long)]
        payload: String,
    },

    /// Replay an event sequence from the empty state and print the final snapshot
    Session {
        /// JSON array of events
        #[arg(short, long)]
        events: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let library = match Library::load_from_dir(&cli.modules_dir) {
        Ok(l) => l,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load module packs: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Modules => {
            let modules: Vec<_> = library
                .list()
                .into_iter()
                .map(|m| {
                    let meta = derive_meta(m);
                    serde_json::json!({
                        "id": m.id,
                        "category": m.category,
                        "label": m.label,
                        "scope": meta.scope,
                        "requires": meta.requires,
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&modules).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Compile { payload } => {
            let input: CompileInput = match serde_json::from_str(&payload) {
                Ok(i) => i,
                Err(e) => {
                    println!(r#"{{"success": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match compile_prompt(&input, &library) {
                Ok(output) => {
                    let out = serde_json::json!({
                        "success": true,
                        "output": output,
                    });
                    println!("{}", serde_json::to_string_pretty(&out).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let out = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&out).unwrap());
                    ExitCode::from(2) // Compilation failure (validation)
                }
            }
        }

        Commands::Session { events } => {
            let events: Vec<Event> = match serde_json::from_str(&events) {
                Ok(e) => e,
                Err(e) => {
                    println!(r#"{{"error": "Invalid event payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            let mut session = Session::new(library);
            for event in events {
                session.dispatch(event);
            }

            let state = session.state();
            let out = serde_json::json!({
                "session_id": session.id(),
                "state": state,
            });
            println!("{}", serde_json::to_string_pretty(&out).unwrap());

            if state.errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2) // Final snapshot carries validation errors
            }
        }
    }
}
