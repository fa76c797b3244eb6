//! Infrastructure layer
//!
//! ## 実装
//!
//! - `registry`: インメモリの ConnectionRegistry 実装

pub mod registry;

pub use registry::InMemoryConnectionRegistry;
