use serde::Deserialize;

use crate::error::{Error, Result};

/// Model output before the tier name is validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEstimate {
    pub complexity: String,
    pub estimated_cost: f64,
    pub reasoning: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimatePayload {
    complexity: String,
    estimated_cost: serde_json::Value,
    #[serde(default)]
    reasoning: String,
}

pub fn parse_estimate_response(response: &str) -> Result<RawEstimate> {
    let json_str = extract_json(response)?;

    let payload: EstimatePayload = serde_json::from_str(&json_str)
        .map_err(|e| Error::ParseError(format!("Failed to parse LLM response: {}", e)))?;

    let estimated_cost = cost_from_value(&payload.estimated_cost)?;

    Ok(RawEstimate {
        complexity: payload.complexity,
        estimated_cost,
        reasoning: payload.reasoning.trim().to_string(),
    })
}

/// Accepts `450`, `450.5`, `"450"` and `"$1,200"`.
fn cost_from_value(value: &serde_json::Value) -> Result<f64> {
    let cost = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        _ => None,
    };

    match cost {
        Some(c) if c.is_finite() => Ok(c),
        _ => Err(Error::ParseError(format!(
            "estimatedCost is not a number: {}",
            value
        ))),
    }
}

fn extract_json(text: &str) -> Result<String> {
    // Try to find JSON block in markdown code blocks
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    // Try plain code block
    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip any language identifier on the same line
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut end = start;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }

        if depth == 0 && end > start {
            return Ok(text[start..end].to_string());
        }
    }

    Err(Error::ParseError("No valid JSON found in response".to_string()))
}
