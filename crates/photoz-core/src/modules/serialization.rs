use crate::domain::{PhotozError, PhotozResult};
use std::fs;
use std::path::Path;

/// `printf`-style `%.<precision>e` rendering with a signed, two-digit exponent.
pub fn format_scientific(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let rendered = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

pub fn render_row(values: &[f64], precision: usize) -> String {
    values
        .iter()
        .map(|value| format_scientific(*value, precision))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_table<'a>(rows: impl IntoIterator<Item = &'a [f64]>, precision: usize) -> String {
    rows.into_iter()
        .map(|row| render_row(row, precision))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> PhotozResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| {
            PhotozError::io_system(
                "IO.OUTPUT_DIRECTORY",
                format!("failed to create directory '{}': {}", parent.display(), source),
            )
        })?;
    }

    fs::write(path, normalize_text_artifact(content)).map_err(|source| {
        PhotozError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}

pub fn parse_numeric_row(line: &str) -> Result<Vec<f64>, String> {
    line.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| format!("'{token}' is not a number"))
        })
        .collect()
}

/// Whitespace-delimited numeric table; blank lines and `#` comments are skipped.
pub fn read_numeric_table(path: &Path, io_code: &'static str) -> PhotozResult<Vec<Vec<f64>>> {
    let source = fs::read_to_string(path).map_err(|source| {
        PhotozError::io_system(
            io_code,
            format!("failed to read '{}': {}", path.display(), source),
        )
    })?;

    let mut rows = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = parse_numeric_row(trimmed).map_err(|reason| {
            PhotozError::configuration(
                "CONFIG.TABLE_PARSE",
                format!("'{}' line {}: {}", path.display(), line_index + 1, reason),
            )
        })?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(PhotozError::configuration(
            "CONFIG.TABLE_PARSE",
            format!("'{}' contains no numeric rows", path.display()),
        ));
    }

    Ok(rows)
}
