//! Host tensor representations.
//!
//! Two shapes of tensor cross the bridge:
//!
//! - [`HostTensor`]: a borrowed view of caller-owned bytes, used for inputs.
//!   It is only valid for the duration of one invocation.
//! - [`OwnedTensor`]: a result whose shape and bytes were freshly allocated
//!   on the host. Ownership passes to the caller.
//!
//! Both follow the exchange layout `{ element_type, rank, shape, data,
//! byte_length }` used by collaborator components.

use crate::element::{ElementType, TensorElement};
use thiserror::Error;

/// Errors raised while validating or building tensors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    /// Element type code outside the supported set.
    #[error("Unsupported element type code {code}")]
    UnsupportedElementType { code: i64 },

    /// Unknown element type token in a literal.
    #[error("Unknown element type token '{0}'")]
    UnknownToken(String),

    /// A shape dimension was negative.
    #[error("Dimension {index} is negative ({value})")]
    NegativeDimension { index: usize, value: i64 },

    /// Element count times element width does not fit in memory.
    #[error("Shape {shape:?} overflows the addressable byte length")]
    ShapeOverflow { shape: Vec<i64> },

    /// Data length disagrees with shape and element type.
    #[error("Byte length mismatch: shape requires {expected} bytes, got {actual}")]
    ByteLengthMismatch { expected: usize, actual: usize },

    /// Requested a typed view with the wrong scalar type.
    #[error("Element type mismatch: tensor is {actual}, requested {requested}")]
    ElementTypeMismatch {
        actual: ElementType,
        requested: ElementType,
    },

    /// Malformed tensor literal.
    #[error("Invalid tensor literal '{input}': {message}")]
    Literal { input: String, message: String },
}

/// Number of elements described by `shape`, rejecting negative dimensions.
pub fn element_count(shape: &[i64]) -> Result<usize, TensorError> {
    shape.iter().enumerate().try_fold(1usize, |acc, (index, &dim)| {
        let dim = usize::try_from(dim)
            .map_err(|_| TensorError::NegativeDimension { index, value: dim })?;
        acc.checked_mul(dim).ok_or_else(|| TensorError::ShapeOverflow {
            shape: shape.to_vec(),
        })
    })
}

/// Expected byte length for a dense row-major tensor.
pub fn dense_byte_length(element_type: ElementType, shape: &[i64]) -> Result<usize, TensorError> {
    element_count(shape)?
        .checked_mul(element_type.byte_width())
        .ok_or_else(|| TensorError::ShapeOverflow {
            shape: shape.to_vec(),
        })
}

/// Borrowed input tensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostTensor<'a> {
    /// Logical element type.
    pub element_type: ElementType,

    /// Dimension sizes, outermost first. Empty for scalars.
    pub shape: &'a [i64],

    /// Dense row-major bytes owned by the caller.
    pub data: &'a [u8],
}

impl<'a> HostTensor<'a> {
    /// Create a tensor view without validating it.
    pub fn new(element_type: ElementType, shape: &'a [i64], data: &'a [u8]) -> Self {
        Self {
            element_type,
            shape,
            data,
        }
    }

    /// View a typed slice as a tensor.
    pub fn from_slice<T: TensorElement>(shape: &'a [i64], values: &'a [T]) -> Self {
        Self {
            element_type: T::ELEMENT_TYPE,
            shape,
            data: bytemuck::cast_slice(values),
        }
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Length of the data view in bytes.
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    /// Check that the shape is well formed and the data length matches it.
    pub fn validate(&self) -> Result<(), TensorError> {
        let expected = dense_byte_length(self.element_type, self.shape)?;
        if expected != self.data.len() {
            return Err(TensorError::ByteLengthMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Copy into an owned tensor.
    pub fn to_owned_tensor(&self) -> OwnedTensor {
        OwnedTensor {
            element_type: self.element_type,
            shape: self.shape.to_vec(),
            data: self.data.to_vec(),
        }
    }
}

/// Host-owned tensor produced by an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedTensor {
    /// Logical element type.
    pub element_type: ElementType,

    /// Dimension sizes, outermost first.
    pub shape: Vec<i64>,

    /// Dense row-major bytes.
    pub data: Vec<u8>,
}

impl OwnedTensor {
    /// Build a tensor from typed values, validating the shape.
    pub fn from_values<T: TensorElement>(shape: Vec<i64>, values: &[T]) -> Result<Self, TensorError> {
        let tensor = Self {
            element_type: T::ELEMENT_TYPE,
            shape,
            data: bytemuck::cast_slice(values).to_vec(),
        };
        tensor.as_host().validate()?;
        Ok(tensor)
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Length of the data buffer in bytes.
    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    /// Number of elements, computed from the data length.
    pub fn len(&self) -> usize {
        self.data.len() / self.element_type.byte_width()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow as an input tensor.
    pub fn as_host(&self) -> HostTensor<'_> {
        HostTensor::new(self.element_type, &self.shape, &self.data)
    }

    /// Copy the data out as typed values.
    ///
    /// The byte buffer carries no alignment guarantee, so this always copies.
    pub fn to_values<T: TensorElement>(&self) -> Result<Vec<T>, TensorError> {
        if T::ELEMENT_TYPE != self.element_type {
            return Err(TensorError::ElementTypeMismatch {
                actual: self.element_type,
                requested: T::ELEMENT_TYPE,
            });
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }
}
