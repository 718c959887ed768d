//! Textual tensor literals.
//!
//! The runtime's command-line tools describe tensors as
//! `<dim>x<dim>x...x<type>=<values>`, for example `2x3xf32=1 2 3 4 5 6`.
//! Scalars omit the dimensions (`f32=3.5`). Values may be separated by
//! whitespace or commas.

use crate::element::ElementType;
use crate::tensor::{element_count, OwnedTensor, TensorError};
use half::{bf16, f16};
use nom::{
    bytes::complete::take_while1,
    character::complete::{alphanumeric1, char, digit1, multispace0},
    combinator::{all_consuming, map_res},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

fn dimension(input: &str) -> IResult<&str, i64> {
    terminated(map_res(digit1, str::parse::<i64>), char('x'))(input)
}

fn element_type(input: &str) -> IResult<&str, ElementType> {
    map_res(alphanumeric1, ElementType::from_token)(input)
}

fn header(input: &str) -> IResult<&str, (Vec<i64>, ElementType)> {
    pair(many0(dimension), element_type)(input)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

fn values(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(
        multispace0,
        separated_list0(take_while1(is_separator), take_while1(|c| !is_separator(c))),
        multispace0,
    )(input)
}

fn literal(input: &str) -> IResult<&str, ((Vec<i64>, ElementType), Vec<&str>)> {
    all_consuming(separated_pair(preceded(multispace0, header), char('='), values))(input)
}

/// Parse a tensor literal into an owned tensor.
pub fn parse_tensor_literal(input: &str) -> Result<OwnedTensor, TensorError> {
    let literal_error = |message: String| TensorError::Literal {
        input: input.to_string(),
        message,
    };

    let (_, ((shape, element_type), tokens)) = literal(input).map_err(|e| {
        let message = match e {
            nom::Err::Incomplete(_) => "incomplete input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let preview: String = e.input.chars().take(20).collect();
                format!("{:?} at '{}'", e.code, preview)
            }
        };
        literal_error(message)
    })?;

    let expected = element_count(&shape)?;
    if tokens.len() != expected {
        return Err(literal_error(format!(
            "shape {:?} holds {} elements, found {} values",
            shape,
            expected,
            tokens.len()
        )));
    }

    let mut data = Vec::with_capacity(expected * element_type.byte_width());
    for token in tokens {
        encode_value(element_type, token, &mut data)
            .map_err(|reason| literal_error(format!("bad value '{}': {}", token, reason)))?;
    }

    Ok(OwnedTensor {
        element_type,
        shape,
        data,
    })
}

fn encode_value(element_type: ElementType, token: &str, out: &mut Vec<u8>) -> Result<(), String> {
    match element_type {
        ElementType::F16 => {
            let v: f32 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&f16::from_f32(v).to_le_bytes());
        }
        ElementType::Bf16 => {
            let v: f32 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&bf16::from_f32(v).to_le_bytes());
        }
        ElementType::F32 => {
            let v: f32 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ElementType::F64 => {
            let v: f64 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ElementType::I32 => {
            let v: i32 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        ElementType::I64 => {
            let v: i64 = token.parse().map_err(|e| format!("{e}"))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(())
}

/// Render the values of a tensor as display strings, one per element.
///
/// Trailing bytes that do not form a whole element are ignored.
pub fn format_values(tensor: &OwnedTensor) -> Vec<String> {
    let width = tensor.element_type.byte_width();
    tensor
        .data
        .chunks_exact(width)
        .map(|chunk| match tensor.element_type {
            ElementType::F16 => f16::from_le_bytes([chunk[0], chunk[1]]).to_string(),
            ElementType::Bf16 => bf16::from_le_bytes([chunk[0], chunk[1]]).to_string(),
            ElementType::F32 => f32::from_le_bytes(le_array(chunk)).to_string(),
            ElementType::F64 => f64::from_le_bytes(le_array(chunk)).to_string(),
            ElementType::I32 => i32::from_le_bytes(le_array(chunk)).to_string(),
            ElementType::I64 => i64::from_le_bytes(le_array(chunk)).to_string(),
        })
        .collect()
}

fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&chunk[..N]);
    bytes
}

/// Format a tensor back into literal form.
pub fn format_tensor_literal(tensor: &OwnedTensor) -> String {
    let mut out = String::new();
    for dim in &tensor.shape {
        out.push_str(&dim.to_string());
        out.push('x');
    }
    out.push_str(tensor.element_type.token());
    out.push('=');
    out.push_str(&format_values(tensor).join(" "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matrix_literal() {
        let tensor = parse_tensor_literal("2x3xf32=1 2 3 4 5 6").unwrap();
        assert_eq!(tensor.element_type, ElementType::F32);
        assert_eq!(tensor.shape, vec![2, 3]);
        assert_eq!(
            tensor.to_values::<f32>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_parse_scalar_and_commas() {
        let scalar = parse_tensor_literal("f64=3.5").unwrap();
        assert!(scalar.shape.is_empty());
        assert_eq!(scalar.to_values::<f64>().unwrap(), vec![3.5]);

        let ints = parse_tensor_literal("4xi64=1,-2, 3 ,4").unwrap();
        assert_eq!(ints.to_values::<i64>().unwrap(), vec![1, -2, 3, 4]);
    }

    #[test]
    fn test_parse_half_precision() {
        let tensor = parse_tensor_literal("2xbf16=1.5 -2").unwrap();
        assert_eq!(tensor.byte_length(), 4);
        let values = tensor.to_values::<bf16>().unwrap();
        assert_eq!(values[0].to_f32(), 1.5);
        assert_eq!(values[1].to_f32(), -2.0);

        let tensor = parse_tensor_literal("1xf16=0.25").unwrap();
        assert_eq!(tensor.to_values::<f16>().unwrap()[0].to_f32(), 0.25);
    }

    #[test]
    fn test_empty_tensor() {
        let tensor = parse_tensor_literal("0x4xi32=").unwrap();
        assert!(tensor.is_empty());
        assert_eq!(tensor.shape, vec![0, 4]);
    }

    #[test]
    fn test_rejects_bad_literals() {
        assert!(parse_tensor_literal("2x3xf32=1 2 3").is_err());
        assert!(parse_tensor_literal("2xu8=1 2").is_err());
        assert!(parse_tensor_literal("2xi32=1 two").is_err());
        assert!(parse_tensor_literal("2xi32").is_err());
    }

    #[test]
    fn test_format_literal() {
        let tensor = OwnedTensor::from_values(vec![2, 2], &[1i32, 2, 3, 4]).unwrap();
        assert_eq!(format_tensor_literal(&tensor), "2x2xi32=1 2 3 4");

        let parsed = parse_tensor_literal(&format_tensor_literal(&tensor)).unwrap();
        assert_eq!(parsed, tensor);
    }
}
