//! Logical element types.
//!
//! The bridge understands exactly six scalar types. The enumeration is
//! closed: raw codes or tokens outside it are rejected with
//! [`TensorError::UnsupportedElementType`] / [`TensorError::UnknownToken`]
//! instead of being mapped to a default.

use crate::tensor::TensorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar element type of a host tensor.
///
/// The discriminants are the raw codes used in the tensor exchange shape
/// shared with collaborator components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ElementType {
    /// IEEE 754 half precision.
    F16 = 0,
    /// bfloat16 ("brain" float).
    Bf16 = 1,
    /// IEEE 754 single precision.
    F32 = 2,
    /// IEEE 754 double precision.
    F64 = 3,
    /// 32-bit signed integer.
    I32 = 4,
    /// 64-bit signed integer.
    I64 = 5,
}

impl ElementType {
    /// Every supported element type, in raw-code order.
    pub const ALL: [ElementType; 6] = [
        Self::F16,
        Self::Bf16,
        Self::F32,
        Self::F64,
        Self::I32,
        Self::I64,
    ];

    /// Size of one element in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            Self::F16 | Self::Bf16 => 2,
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
        }
    }

    /// Short token used in tensor literals (`f32`, `bf16`, ...).
    pub const fn token(self) -> &'static str {
        match self {
            Self::F16 => "f16",
            Self::Bf16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }

    /// Parse a literal token.
    pub fn from_token(token: &str) -> Result<Self, TensorError> {
        Self::ALL
            .into_iter()
            .find(|t| t.token() == token)
            .ok_or_else(|| TensorError::UnknownToken(token.to_string()))
    }

    /// Raw exchange code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Decode a raw exchange code.
    pub fn from_code(code: i32) -> Result<Self, TensorError> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(TensorError::UnsupportedElementType {
                code: i64::from(code),
            })
    }

    /// Whether this is a floating-point type.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::Bf16 | Self::F32 | Self::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl TryFrom<i32> for ElementType {
    type Error = TensorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Rust scalar types that can back a tensor of a given [`ElementType`].
pub trait TensorElement: bytemuck::Pod {
    /// The element type tag for this scalar.
    const ELEMENT_TYPE: ElementType;
}

macro_rules! tensor_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl TensorElement for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$tag;
            }
        )*
    };
}

tensor_element! {
    half::f16 => F16,
    half::bf16 => Bf16,
    f32 => F32,
    f64 => F64,
    i32 => I32,
    i64 => I64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_widths() {
        assert_eq!(ElementType::F16.byte_width(), 2);
        assert_eq!(ElementType::Bf16.byte_width(), 2);
        assert_eq!(ElementType::F32.byte_width(), 4);
        assert_eq!(ElementType::I32.byte_width(), 4);
        assert_eq!(ElementType::F64.byte_width(), 8);
        assert_eq!(ElementType::I64.byte_width(), 8);
    }

    #[test]
    fn test_tokens_and_codes_are_closed() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_token(ty.token()).unwrap(), ty);
            assert_eq!(ElementType::from_code(ty.code()).unwrap(), ty);
        }
        assert!(matches!(
            ElementType::from_code(6),
            Err(TensorError::UnsupportedElementType { code: 6 })
        ));
        assert!(ElementType::from_code(-1).is_err());
        assert!(ElementType::from_token("u8").is_err());
    }
}
