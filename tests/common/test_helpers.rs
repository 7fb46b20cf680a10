//! Helper functions for integration tests

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use physkit::physics::{DomainDescriptor, Field, FieldData, State};
use physkit::solver::Trajectory;

/// Assert that every field of two states agrees within `tolerance`
pub fn assert_states_close(state1: &State, state2: &State, tolerance: f64, message: &str) {
    assert!(state1.same_layout(state2), "{message}: layout mismatch");

    for ((field, a), (_, b)) in state1.fields().iter().zip(state2.fields()) {
        for (i, (x, y)) in a.to_complex().iter().zip(b.to_complex().iter()).enumerate() {
            let diff = (x - y).norm();
            assert!(
                diff < tolerance,
                "{message}: {field}[{i}] differs by {diff} (tolerance {tolerance})"
            );
        }
    }
}

/// First component of the primary field of the final state
pub fn final_value(trajectory: &Trajectory) -> f64 {
    trajectory.final_state().expect("trajectory has entries").primary().real_parts()[0]
}

/// Real state with uniform random values in `[-1, 1)` on `domain`
pub fn random_state(rng: &mut ChaCha8Rng, domain: &DomainDescriptor) -> State {
    let values = (0..domain.points()).map(|_| rng.random_range(-1.0..1.0)).collect();
    State::new(domain.clone(), Field::Value, FieldData::from_vec(values)).expect("values match the domain")
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}
