//! # Graphwire Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs       # Two peers over a memory channel
//!     ├── cycles.rs      # Cyclic and shared graphs across the wire
//!     └── properties.rs  # Property tests for the codecs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p graphwire-tests
//!
//! # By category
//! cargo test -p graphwire-tests integration::flows
//!
//! # Benchmarks
//! cargo bench -p graphwire-tests
//! ```

pub mod integration;
