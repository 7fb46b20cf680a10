//! Common utilities for integration tests

pub mod mock_operators;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_operators::{cancelling_decay, decay_operator, logistic_operator};
pub use test_helpers::{assert_states_close, final_value, random_state, relative_error};
