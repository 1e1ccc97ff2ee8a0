// tests/ledger_property.rs

//! Property tests for the ledger merge.

use std::collections::BTreeSet;

use proptest::prelude::*;

use domd::ledger::Ledger;
use domd::model::{Command, ExecutionResult, ExecutionStatus, Fingerprint};
use domd::runner::CommandResult;

fn status_strategy() -> impl Strategy<Value = ExecutionStatus> {
    prop_oneof![
        Just(ExecutionStatus::Success),
        Just(ExecutionStatus::Failure),
        Just(ExecutionStatus::Timeout),
        Just(ExecutionStatus::Ignored),
        Just(ExecutionStatus::ParseSkipped),
    ]
}

/// Distinct command texts with arbitrary statuses; one result per text,
/// which is what the coordinator guarantees.
fn results_strategy() -> impl Strategy<Value = Vec<CommandResult>> {
    proptest::collection::btree_map(0..50u32, status_strategy(), 0..20).prop_map(|map| {
        map.into_iter()
            .map(|(id, status)| {
                let command = Command::new(format!("make target_{id}"), "Makefile");
                let code = match status {
                    ExecutionStatus::Success => 0,
                    ExecutionStatus::Timeout => -1,
                    _ => 1,
                };
                let result = ExecutionResult::new(command.fingerprint(), status, code);
                (command, result)
            })
            .collect()
    })
}

fn fingerprints(ledger: &Ledger) -> (BTreeSet<Fingerprint>, BTreeSet<Fingerprint>) {
    (
        ledger.working.keys().copied().collect(),
        ledger.broken.keys().copied().collect(),
    )
}

proptest! {
    #[test]
    fn partitions_are_always_disjoint(
        first in results_strategy(),
        second in results_strategy(),
    ) {
        let mid = Ledger::merge(&Ledger::default(), &first);
        let (working, broken) = fingerprints(&mid);
        prop_assert!(working.is_disjoint(&broken));

        let end = Ledger::merge(&mid, &second);
        let (working, broken) = fingerprints(&end);
        prop_assert!(working.is_disjoint(&broken));
    }

    #[test]
    fn merge_is_idempotent(results in results_strategy()) {
        let once = Ledger::merge(&Ledger::default(), &results);
        let twice = Ledger::merge(&once, &results);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_fingerprint_lands_where_its_status_says(results in results_strategy()) {
        let ledger = Ledger::merge(&Ledger::default(), &results);
        for (_, result) in &results {
            let in_working = ledger.working.contains_key(&result.fingerprint);
            let in_broken = ledger.broken.contains_key(&result.fingerprint);
            match result.status {
                ExecutionStatus::Success => {
                    prop_assert!(in_working && !in_broken);
                }
                ExecutionStatus::Failure | ExecutionStatus::Timeout => {
                    prop_assert!(in_broken && !in_working);
                }
                ExecutionStatus::Ignored | ExecutionStatus::ParseSkipped => {
                    prop_assert!(!in_working && !in_broken);
                }
            }
        }
    }

    #[test]
    fn stale_fingerprints_never_survive(
        first in results_strategy(),
        second in results_strategy(),
    ) {
        let mid = Ledger::merge(&Ledger::default(), &first);
        let end = Ledger::merge(&mid, &second);

        let current: BTreeSet<Fingerprint> =
            second.iter().map(|(_, r)| r.fingerprint).collect();
        let (working, broken) = fingerprints(&end);
        for fp in working.union(&broken) {
            prop_assert!(current.contains(fp));
        }
    }
}
