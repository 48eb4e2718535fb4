//! Validation call-count hook tests. Requires `--features test-hooks`.
//!
//! Kept in a dedicated test binary: the counter is process-global, and the
//! other suites dispatch events of their own.

#![cfg(feature = "test-hooks")]

use promptloom_core::{
    governor::{get_validation_call_count, reset_validation_call_count, AppState, Event},
    library::{Category, Library, Module},
    reduce,
    scope::RefKind,
};

fn create_test_library() -> Library {
    Library::from_records(vec![
        Module {
            id: "face-warm-smile".to_string(),
            category: Category::FacialPose,
            label: "Warm smile".to_string(),
            prompt_text: "Warm smile matched to the CHARACTER REFERENCE IMAGE.".to_string(),
            constraints: vec![],
        },
        Module {
            id: "pose-hands-macro".to_string(),
            category: Category::AnatomyPose,
            label: "Hands macro".to_string(),
            prompt_text: "Macro study, HANDS ONLY.".to_string(),
            constraints: vec![],
        },
    ])
    .unwrap()
}

#[test]
fn invariant_reducer_revalidates_once_per_event() {
    let library = create_test_library();
    reset_validation_call_count();

    let mut state = AppState::default();
    let accepted = vec![
        Event::SetRef {
            slot: RefKind::Character,
            value: "char-ref-01".to_string(),
        },
        Event::SelectModule { id: "face-warm-smile".to_string() },
        Event::AddVariation { id: "var-a".to_string() },
    ];
    for event in accepted {
        state = reduce(&state, event, &library);
    }
    assert_eq!(get_validation_call_count(), 3);

    // A rejected selection short-circuits before revalidation
    state = reduce(
        &state,
        Event::SelectModule { id: "pose-hands-macro".to_string() },
        &library,
    );
    assert_eq!(get_validation_call_count(), 3);

    // Compile revalidates exactly once
    let state = reduce(&state, Event::Compile, &library);
    assert_eq!(get_validation_call_count(), 4);
    assert!(state.compiled.is_some());
}
