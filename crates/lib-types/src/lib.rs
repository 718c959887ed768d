//! # lib-types
//!
//! Core type definitions shared across the runtime bridge workspace:
//! - The closed set of logical element types and their raw codes
//! - Borrowed input tensors and host-owned result tensors
//! - Textual tensor literals (`2x3xf32=1 2 3 4 5 6`)
//! - Session lifecycle states

pub mod element;
pub mod tensor;
pub mod literal;
pub mod session;

pub use element::*;
pub use tensor::*;
pub use literal::{format_tensor_literal, format_values, parse_tensor_literal};
pub use session::SessionState;

/// Re-export the half-precision scalar types for convenience
pub use half::{bf16, f16};
