use crate::error::{Error, Result};
use crate::models::{ComplexityTier, EstimationResult};

pub const CSV_HEADER: [&str; 7] = [
    "issue_number",
    "title",
    "complexity",
    "estimated_cost",
    "labels",
    "reasoning",
    "url",
];

const LABEL_SEPARATOR: &str = "; ";

/// Quotes a field when it contains a comma, quote, or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_row(result: &EstimationResult) -> Vec<String> {
    vec![
        result.issue_number.to_string(),
        result.title.clone(),
        result.complexity.to_string(),
        result.estimated_cost.to_string(),
        result.labels.join(LABEL_SEPARATOR),
        result.reasoning.clone(),
        result.url.clone(),
    ]
}

pub fn to_csv(results: &[EstimationResult]) -> String {
    let mut output = CSV_HEADER.join(",");
    output.push('\n');

    for result in results {
        let row: Vec<String> = to_row(result).iter().map(|f| escape_field(f)).collect();
        output.push_str(&row.join(","));
        output.push('\n');
    }

    output
}

/// Splits CSV text into records, honouring quoted fields.
pub fn parse_records(input: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(Error::ParseError("Unterminated quoted CSV field".to_string()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// Reads back a file produced by [`to_csv`].
pub fn from_csv(input: &str) -> Result<Vec<EstimationResult>> {
    let mut records = parse_records(input)?.into_iter();

    match records.next() {
        Some(header) if header == CSV_HEADER => {}
        _ => return Err(Error::ParseError("Missing or unexpected CSV header".to_string())),
    }

    records
        .map(|record| {
            if record.len() != CSV_HEADER.len() {
                return Err(Error::ParseError(format!(
                    "Expected {} columns, found {}",
                    CSV_HEADER.len(),
                    record.len()
                )));
            }

            let issue_number = record[0]
                .parse()
                .map_err(|_| Error::ParseError(format!("Invalid issue number: {}", record[0])))?;
            let complexity = ComplexityTier::parse(&record[2])
                .ok_or_else(|| Error::ParseError(format!("Invalid complexity: {}", record[2])))?;
            let estimated_cost = record[3]
                .parse()
                .map_err(|_| Error::ParseError(format!("Invalid cost: {}", record[3])))?;
            let labels = if record[4].is_empty() {
                Vec::new()
            } else {
                record[4].split(LABEL_SEPARATOR).map(str::to_string).collect()
            };

            Ok(EstimationResult {
                issue_number,
                title: record[1].clone(),
                complexity,
                estimated_cost,
                labels,
                reasoning: record[5].clone(),
                url: record[6].clone(),
            })
        })
        .collect()
}
