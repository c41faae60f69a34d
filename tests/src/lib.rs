//! # Plan Dispatch Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Spy plans and registry builders
//! └── integration/      # Cross-crate flows
//!     ├── ipc_flows.rs      # Renderer → IPC transport → registry → Plan
//!     ├── stdio_flows.rs    # Line protocol → stdio transport → registry
//!     └── properties.rs     # proptest: NOT_FOUND / UNAUTHORIZED / envelope shape
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dispatch-tests
//!
//! # By category
//! cargo test -p dispatch-tests integration::ipc_flows
//! cargo test -p dispatch-tests integration::properties
//!
//! # Benchmarks
//! cargo bench -p dispatch-tests
//! ```

#![allow(dead_code)]
