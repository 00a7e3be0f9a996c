//! Property tests for fallback resolution.
//!
//! Invariants tested:
//! - The chosen handler's kind is an ancestor of the failure kind
//! - No matching handler is deeper than the chosen one
//! - Among equally deep matches the first declared wins
//! - Nothing is chosen when no declared kind matches

use proptest::prelude::*;
use tower_fortify_core::{Classify, ErrorKind};
use tower_fortify_fallback::FallbackTable;

#[derive(Debug, Clone)]
struct NoError;

impl Classify for NoError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ANY
    }
}

fn kind() -> impl Strategy<Value = ErrorKind> {
    prop::collection::vec("[ab]", 0..4)
        .prop_map(|segments| ErrorKind::new(Box::leak(segments.join(".").into_boxed_str())))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn resolve_picks_the_deepest_first_declared_match(
        declared in prop::collection::vec(kind(), 0..8),
        failure in kind(),
    ) {
        let table = declared
            .iter()
            .enumerate()
            .fold(FallbackTable::<usize, NoError>::builder(), |builder, (i, k)| {
                builder.on_value(*k, i)
            })
            .build();

        let matching: Vec<(usize, ErrorKind)> = declared
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, k)| failure.is_a(k))
            .collect();

        match table.resolve(failure) {
            None => prop_assert!(matching.is_empty()),
            Some(resolution) => {
                let chosen = declared[resolution.index];
                prop_assert_eq!(chosen, resolution.handler_kind);
                prop_assert!(failure.is_a(&chosen));

                let deepest = matching.iter().map(|(_, k)| k.depth()).max();
                prop_assert_eq!(Some(chosen.depth()), deepest);

                let first_at_depth = matching
                    .iter()
                    .find(|(_, k)| k.depth() == chosen.depth())
                    .map(|(i, _)| *i);
                prop_assert_eq!(Some(resolution.index), first_at_depth);
            }
        }
    }
}
