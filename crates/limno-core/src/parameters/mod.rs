//! Parameter registry
//!
//! Maps the short codes used on the wire (`Tw`, `Ta:F`, `pH`) to canonical
//! parameter identifiers and the transform that brings a value into the
//! parameter's canonical unit.

mod registry;
mod transform;

pub use registry::*;
pub use transform::Transform;
