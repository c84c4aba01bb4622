//! # Permledger Testkit
//!
//! Testing utilities for Permledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known events with their expected canonical encoding
//! - **Generators**: Proptest strategies for events and facade operations
//! - **Model**: A plain-collections reference model of the permission rules
//! - **Fixtures**: A standard cast of principals and ready-made managers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use permledger_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, id) in verify_all_vectors() {
//!     println!("{}: {} ({})", name, id, matches);
//! }
//! ```
//!
//! ## Model-Based Testing
//!
//! Run generated operations against a manager and the model side by side:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use permledger_testkit::{generators::{ops, Universe}, Model, TestFixture};
//!
//! proptest! {
//!     #[test]
//!     fn manager_agrees_with_model(ops in ops(40)) {
//!         let universe = Universe::standard();
//!         let fixture = TestFixture::new();
//!         let mut model = Model::new();
//!         for op in &ops {
//!             let observed = op.run(&fixture.manager, &universe).unwrap();
//!             prop_assert_eq!(observed, model.apply(op, &universe));
//!         }
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use permledger_testkit::fixtures::{random_document, TestFixture};
//!
//! let hash = random_document();
//! let fixture = TestFixture::with_document(&hash).unwrap();
//! assert!(fixture.manager.exists(&hash).unwrap());
//! ```

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod vectors;

pub use fixtures::{acceptance_document, principal, random_document, Cast, TestFixture};
pub use generators::{Observed, Op, Universe};
pub use model::Model;
pub use vectors::{all_vectors, event_from_vector, verify_all_vectors, GoldenVector};
