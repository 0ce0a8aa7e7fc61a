//! symgen: the expression IR behind generated derivative code.
//!
//! A front end records a function evaluation as a flat list of
//! expressions (`ir::ExprGraph`). The optimizer simplifies that list in
//! place, the emitter turns it into structured statements, and a target
//! syntax renders them as C or Rust source.

pub mod api;
pub mod capture;
pub mod diagnostic;
pub mod ir;
pub mod span;

// Re-export public API — `symgen::compile()` etc.
pub use api::*;
