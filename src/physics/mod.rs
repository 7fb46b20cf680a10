//! Physical states
//!
//! This module provides the data side of the engine: what a physical
//! configuration *is*, independently of how it evolves.
//!
//! # Core Concepts
//!
//! - **Field data** ([`FieldData`]): real or complex samples of one field
//! - **Domain** ([`DomainDescriptor`]): shape, bounds, layout and boundary tag
//! - **State** ([`State`]): ordered named fields on one domain, immutable
//!
//! # Architecture
//!
//! States are **separate from operators and steppers**:
//! - the state holds the numbers
//! - operators ([`crate::operator`]) say how they change
//! - steppers ([`crate::solver`]) say how time advances
//!
//! # Example
//!
//! ```rust
//! use physkit::physics::{Field, State};
//!
//! let state = State::lumped(vec![1.0, 0.5]).unwrap();
//! let next = state.axpy(0.5, &state).unwrap();
//!
//! assert_eq!(next.field(&Field::Value).unwrap().real_parts(), vec![1.5, 0.75]);
//! assert_eq!(state.field(&Field::Value).unwrap().real_parts(), vec![1.0, 0.5]);
//! ```

pub mod data;
pub mod domain;
pub mod state;

pub use data::{FieldData, ValueKind};
pub use domain::{BoundaryKind, DomainDescriptor, GridType, Layout};
pub use state::{Field, State};
