//! Result formatting.

use crate::OutputFormat;
use anyhow::Result;
use lib_types::{format_tensor_literal, format_values, ElementType, OwnedTensor};
use serde::Serialize;

/// Outcome of `rt-bridge probe`.
#[derive(Clone, Debug, Serialize)]
pub struct ProbeReport {
    pub available: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct TensorReport {
    index: usize,
    element_type: ElementType,
    shape: Vec<i64>,
    values: Vec<serde_json::Value>,
}

impl TensorReport {
    fn new(index: usize, tensor: &OwnedTensor) -> Self {
        // Non-finite floats have no JSON number form and stay strings.
        let values = format_values(tensor)
            .into_iter()
            .map(|v| serde_json::from_str(&v).unwrap_or(serde_json::Value::String(v)))
            .collect();
        Self {
            index,
            element_type: tensor.element_type,
            shape: tensor.shape.clone(),
            values,
        }
    }
}

/// Render invocation outputs.
pub fn render_outputs(outputs: &[OwnedTensor], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            if outputs.is_empty() {
                return Ok("(no results)".to_string());
            }
            let lines: Vec<String> = outputs
                .iter()
                .enumerate()
                .map(|(i, t)| format!("result[{}]: {}", i, format_tensor_literal(t)))
                .collect();
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => {
            let reports: Vec<TensorReport> = outputs
                .iter()
                .enumerate()
                .map(|(i, t)| TensorReport::new(i, t))
                .collect();
            Ok(serde_json::to_string_pretty(&reports)?)
        }
    }
}

/// Render a probe report.
pub fn render_probe(report: &ProbeReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = report.detail.clone();
            if let Some(error) = &report.error {
                out.push_str("\nreason: ");
                out.push_str(error);
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_outputs() {
        let a = OwnedTensor::from_values(vec![2, 2], &[1.5f32, 2.0, -3.0, 4.0]).unwrap();
        let b = OwnedTensor::from_values(vec![], &[7i64]).unwrap();
        let text = render_outputs(&[a, b], OutputFormat::Text).unwrap();
        assert_eq!(text, "result[0]: 2x2xf32=1.5 2 -3 4\nresult[1]: i64=7");
        assert_eq!(
            render_outputs(&[], OutputFormat::Text).unwrap(),
            "(no results)"
        );
    }

    #[test]
    fn test_json_outputs() {
        let a = OwnedTensor::from_values(vec![3], &[1.0f64, f64::NAN, 0.25]).unwrap();
        let json = render_outputs(&[a], OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &parsed[0];
        assert_eq!(first["element_type"], "f64");
        assert_eq!(first["shape"], serde_json::json!([3]));
        assert_eq!(first["values"][0], serde_json::json!(1));
        assert_eq!(first["values"][1], "NaN");
        assert_eq!(first["values"][2], serde_json::json!(0.25));
    }

    #[test]
    fn test_probe_rendering() {
        let report = ProbeReport {
            available: false,
            detail: "runtime=false disabled=true feature=true path=-".into(),
            error: Some("Runtime unavailable: disabled".into()),
        };
        let text = render_probe(&report, OutputFormat::Text).unwrap();
        assert!(text.ends_with("reason: Runtime unavailable: disabled"));

        let json: serde_json::Value =
            serde_json::from_str(&render_probe(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["available"], false);
    }
}
