//! Property tests for the universal invariants: join-point conservatism
//! and deduplication minimality.

use proptest::prelude::*;

use seep_analysis::cfg::BlockTaintState;
use seep_analysis::propagation::deduplicate_paths;
use seep_analysis::types::{PathStep, SinkOccurrence, SourceOccurrence, TaintPath};

fn var_name() -> impl Strategy<Value = String> {
    "[a-d]{1,3}".prop_map(|s| s)
}

fn state(block: i64) -> impl Strategy<Value = BlockTaintState> {
    (
        proptest::collection::vec(var_name(), 0..6),
        proptest::collection::vec(var_name(), 0..6),
    )
        .prop_map(move |(tainted, sanitized)| {
            let mut state = BlockTaintState::new(block);
            for var in tainted {
                state.add_taint(&var);
            }
            for var in sanitized {
                // Sanitizing an unknown var is allowed; only tainted vars
                // matter for the invariant.
                state.sanitize(&var);
            }
            state
        })
}

proptest! {
    /// Tainted anywhere → tainted after the merge; sanitized after the
    /// merge → sanitized on both sides.
    #[test]
    fn merge_is_conservative(a in state(1), b in state(1)) {
        let merged = a.merge(&b);

        for var in a.tainted_vars.iter().chain(b.tainted_vars.iter()) {
            prop_assert!(merged.tainted_vars.contains(var));
        }
        for var in &merged.sanitized_vars {
            prop_assert!(a.sanitized_vars.contains(var));
            prop_assert!(b.sanitized_vars.contains(var));
        }
        // A variable tainted on one side and sanitized only on the other
        // stays tainted.
        for var in &a.tainted_vars {
            if !a.sanitized_vars.contains(var) {
                prop_assert!(merged.is_tainted(var));
            }
        }
    }

    /// Dedup keeps exactly one path per pair and always the shortest.
    #[test]
    fn dedup_is_minimal(specs in proptest::collection::vec((0i64..4, 0i64..4, 0usize..6), 0..24)) {
        let paths: Vec<TaintPath> = specs
            .iter()
            .map(|(src_line, sink_line, extra_steps)| {
                let source = SourceOccurrence {
                    file: "a.js".into(),
                    name: "req.body".into(),
                    line: *src_line,
                    column: 0,
                    pattern: "req.body".into(),
                };
                let sink = SinkOccurrence {
                    file: "a.js".into(),
                    name: "res.send".into(),
                    line: *sink_line,
                    column: 0,
                    pattern: "res.send".into(),
                    category: "xss".into(),
                    metadata: None,
                };
                let mut steps = vec![PathStep::DirectUse {
                    location: format!("a.js:{src_line}"),
                }];
                for _ in 0..*extra_steps {
                    steps.push(PathStep::Propagation {
                        tainted_vars: vec![],
                        transformations: 0,
                    });
                }
                TaintPath::new(source, sink, steps)
            })
            .collect();

        let unique = deduplicate_paths(paths.clone());

        // One path per pair.
        let mut keys: Vec<_> = unique.iter().map(TaintPath::pair_key).collect();
        keys.sort();
        let before = keys.len();
        keys.dedup();
        prop_assert_eq!(before, keys.len());

        // Minimal length per pair.
        for kept in &unique {
            for candidate in paths.iter().filter(|p| p.pair_key() == kept.pair_key()) {
                prop_assert!(kept.path_length <= candidate.path_length);
            }
        }

        // Nothing is lost: every input pair survives.
        for path in &paths {
            prop_assert!(unique.iter().any(|u| u.pair_key() == path.pair_key()));
        }
    }
}
