//! # Weight Vector Properties
//!
//! | Property | Test |
//! |----------|------|
//! | Output sums to 1 whenever any input is non-empty | `prop_weights_sum_to_one` |
//! | Empty inputs give an empty vector | `prop_empty_inputs_empty_output` |
//! | Phase controller is pure | `prop_phase_controller_is_pure` |
//! | Bootstrap epochs ignore merit | `prop_bootstrap_ignores_merit` |
//! | Fixed fraction stays within the decay range | `prop_fixed_fraction_bounded` |

use std::collections::BTreeMap;

use proptest::prelude::*;
use verity_consensus::WorkerId;
use verity_reputation::{PhaseSchedule, ReputationLedger, WeightVector};

fn vector() -> impl Strategy<Value = WeightVector> {
    prop::collection::btree_map(0u32..32, 0.001f64..10.0, 0..12)
        .prop_map(|m| m.into_iter().map(|(w, v)| (WorkerId(w), v)).collect())
}

proptest! {
    #[test]
    fn prop_weights_sum_to_one(
        epoch in 0u64..120,
        bootstrap in vector(),
        merit in vector(),
    ) {
        let w = PhaseSchedule::new().weights(epoch, &bootstrap, &merit);
        if bootstrap.is_empty() && merit.is_empty() {
            prop_assert!(w.is_empty());
        } else {
            prop_assert!((w.sum() - 1.0).abs() < 1e-9);
            for (_, weight) in w.iter() {
                prop_assert!(weight > 0.0 && weight <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn prop_empty_inputs_empty_output(epoch in 0u64..1000) {
        let empty = WeightVector::new();
        prop_assert!(PhaseSchedule::new().weights(epoch, &empty, &empty).is_empty());
    }

    #[test]
    fn prop_phase_controller_is_pure(
        epoch in 0u64..120,
        bootstrap in vector(),
        merit in vector(),
    ) {
        let schedule = PhaseSchedule::new();
        let a = schedule.weights(epoch, &bootstrap, &merit);
        let b = schedule.weights(epoch, &bootstrap, &merit);
        let bits = |v: &WeightVector| -> Vec<(WorkerId, u64)> {
            v.iter().map(|(k, w)| (k, w.to_bits())).collect()
        };
        prop_assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn prop_bootstrap_ignores_merit(
        epoch in 0u64..10,
        bootstrap in vector(),
        merit_a in vector(),
        merit_b in vector(),
    ) {
        prop_assume!(!bootstrap.is_empty());
        let schedule = PhaseSchedule::new();
        prop_assert_eq!(
            schedule.weights(epoch, &bootstrap, &merit_a),
            schedule.weights(epoch, &bootstrap, &merit_b)
        );
    }

    #[test]
    fn prop_fixed_fraction_bounded(epoch in 0u64..200) {
        let f = PhaseSchedule::new().phase(epoch).fixed_fraction();
        prop_assert!(f == 1.0 || f == 0.0 || (0.1..=0.3).contains(&f));
    }

    #[test]
    fn prop_ledger_merit_sums_to_one(
        batches in prop::collection::vec(
            prop::collection::btree_map(0u32..16, 0.0f64..=1.0, 1..8),
            1..10,
        )
    ) {
        let ledger = ReputationLedger::new();
        for batch in &batches {
            let scores: BTreeMap<WorkerId, f64> =
                batch.iter().map(|(&w, &s)| (WorkerId(w), s)).collect();
            ledger.record(&scores).unwrap();
        }
        let merit = ledger.merit_vector().unwrap();
        if !merit.is_empty() {
            prop_assert!((merit.sum() - 1.0).abs() < 1e-9);
        }
    }
}
