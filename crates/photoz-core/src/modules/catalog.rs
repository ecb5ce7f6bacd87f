//! Catalog column layout, line-range reads and the PDF/metrics/summary tables.

use super::serialization::{
    format_scientific, parse_numeric_row, read_numeric_table, render_table, write_text_artifact,
};
use crate::common::config::PhotozConfig;
use crate::common::constants::{IGNORED_COLUMN, REDSHIFT_COLUMN, VARIANCE_SUFFIX};
use crate::domain::{ObservedObject, PhotozError, PhotozResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub const RESULT_PRECISION: usize = 2;
pub const CATALOG_PRECISION: usize = 18;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogRowError {
    #[error("column {column}: '{token}' is not a number")]
    NotNumeric { column: usize, token: String },
    #[error("row has {found} column(s), layout needs at least {required}")]
    TooFewColumns { found: usize, required: usize },
}

/// Catalog columns of each configured band, the true redshift and the reference band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    band_columns: Vec<Option<(usize, usize)>>,
    redshift_column: Option<usize>,
    reference_column: usize,
    width: usize,
}

impl ColumnLayout {
    pub fn from_config(config: &PhotozConfig) -> PhotozResult<Self> {
        Self::from_band_order(
            &config.target.band_order,
            &config.band_names,
            &config.target.reference_band,
        )
    }

    /// Entries are a band name, `<band>_var`, `redshift` or `_`.
    pub fn from_band_order(
        band_order: &[String],
        band_names: &[String],
        reference_band: &str,
    ) -> PhotozResult<Self> {
        let mut flux_columns = BTreeMap::new();
        let mut variance_columns = BTreeMap::new();
        let mut redshift_column = None;

        for (column, entry) in band_order.iter().enumerate() {
            let entry = entry.as_str();
            let duplicate = if entry == IGNORED_COLUMN {
                false
            } else if entry == REDSHIFT_COLUMN {
                redshift_column.replace(column).is_some()
            } else if let Some(band) = entry.strip_suffix(VARIANCE_SUFFIX) {
                known_band(band, band_names, entry)?;
                variance_columns.insert(band, column).is_some()
            } else {
                known_band(entry, band_names, entry)?;
                flux_columns.insert(entry, column).is_some()
            };

            if duplicate {
                return Err(PhotozError::configuration(
                    "CONFIG.BAND_ORDER",
                    format!("bandOrder lists '{entry}' more than once"),
                ));
            }
        }

        if flux_columns.len() != variance_columns.len()
            || flux_columns.keys().any(|band| !variance_columns.contains_key(band))
        {
            return Err(PhotozError::configuration(
                "CONFIG.BAND_ORDER",
                "every band in bandOrder needs both a flux column and a '<band>_var' column",
            ));
        }

        let Some(&reference_column) = flux_columns.get(reference_band) else {
            return Err(PhotozError::configuration(
                "CONFIG.BAND_ORDER",
                format!("referenceBand '{reference_band}' has no flux column in bandOrder"),
            ));
        };

        let band_columns = band_names
            .iter()
            .map(|band| {
                let band = band.as_str();
                flux_columns
                    .get(band)
                    .zip(variance_columns.get(band))
                    .map(|(flux, variance)| (*flux, *variance))
            })
            .collect();

        Ok(Self {
            band_columns,
            redshift_column,
            reference_column,
            width: band_order.len(),
        })
    }

    /// Number of columns named by the band order.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn has_redshift(&self) -> bool {
        self.redshift_column.is_some()
    }

    pub fn redshift_column(&self) -> Option<usize> {
        self.redshift_column
    }

    /// `(flux, variance)` columns per configured band; `None` when the catalog lacks the band.
    pub fn band_columns(&self) -> &[Option<(usize, usize)>] {
        &self.band_columns
    }

    pub fn parse_object(&self, index: usize, line: &str) -> Result<ObservedObject, CatalogRowError> {
        let values = line
            .split_whitespace()
            .enumerate()
            .map(|(column, token)| {
                token.parse::<f64>().map_err(|_| CatalogRowError::NotNumeric {
                    column,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() < self.width {
            return Err(CatalogRowError::TooFewColumns {
                found: values.len(),
                required: self.width,
            });
        }

        let (fluxes, variances): (Vec<f64>, Vec<f64>) = self
            .band_columns
            .iter()
            .map(|columns| match columns {
                Some((flux, variance)) => (values[*flux], values[*variance]),
                None => (f64::NAN, f64::NAN),
            })
            .unzip();

        Ok(ObservedObject {
            index,
            fluxes,
            variances,
            true_redshift: self.redshift_column.map(|column| values[column]),
            reference_flux: values[self.reference_column],
        })
    }
}

fn known_band(band: &str, band_names: &[String], entry: &str) -> PhotozResult<()> {
    if band_names.iter().any(|name| name == band) {
        Ok(())
    } else {
        Err(PhotozError::configuration(
            "CONFIG.BAND_ORDER",
            format!("bandOrder entry '{entry}' does not name a configured band"),
        ))
    }
}

fn open_catalog(path: &Path) -> PhotozResult<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|source| {
        PhotozError::io_system(
            "IO.CATALOG_READ",
            format!("failed to open catalog '{}': {}", path.display(), source),
        )
    })
}

fn read_error(path: &Path, source: std::io::Error) -> PhotozError {
    PhotozError::io_system(
        "IO.CATALOG_READ",
        format!("failed to read catalog '{}': {}", path.display(), source),
    )
}

pub fn count_lines(path: &Path) -> PhotozResult<usize> {
    let mut count = 0;
    for line in open_catalog(path)?.lines() {
        line.map_err(|source| read_error(path, source))?;
        count += 1;
    }
    Ok(count)
}

/// Parses catalog lines `[start, end)`; object indices are line numbers.
pub fn read_line_range(
    path: &Path,
    layout: &ColumnLayout,
    start: usize,
    end: usize,
) -> PhotozResult<Vec<ObservedObject>> {
    let mut objects = Vec::with_capacity(end.saturating_sub(start));
    for (offset, line) in open_catalog(path)?
        .lines()
        .skip(start)
        .take(end.saturating_sub(start))
        .enumerate()
    {
        let line = line.map_err(|source| read_error(path, source))?;
        let index = start + offset;
        let object = layout.parse_object(index, &line).map_err(|error| {
            PhotozError::configuration(
                "CONFIG.CATALOG_ROW",
                format!("'{}' line {}: {}", path.display(), index + 1, error),
            )
        })?;
        objects.push(object);
    }

    if objects.len() != end.saturating_sub(start) {
        return Err(PhotozError::io_system(
            "IO.CATALOG_TRUNCATED",
            format!(
                "'{}' ended after {} of lines {}..{}",
                path.display(),
                objects.len(),
                start,
                end
            ),
        ));
    }

    debug!(start, end, "catalog line range parsed");
    Ok(objects)
}

/// Writes `values` as rows of `width` entries in `%.2e` notation.
pub fn write_result_table(path: &Path, values: &[f64], width: usize) -> PhotozResult<()> {
    let content = if width == 0 {
        String::new()
    } else {
        render_table(values.chunks(width), RESULT_PRECISION)
    };
    write_text_artifact(path, &content)
}

pub fn write_catalog(path: &Path, rows: &[Vec<f64>]) -> PhotozResult<()> {
    write_text_artifact(
        path,
        &render_table(rows.iter().map(Vec::as_slice), CATALOG_PRECISION),
    )
}

pub fn write_summary(path: &Path, rows: &[[f64; 2]]) -> PhotozResult<()> {
    let content = rows
        .iter()
        .map(|[mode, width]| {
            format!(
                "{} {}",
                format_scientific(*mode, RESULT_PRECISION + 2),
                format_scientific(*width, RESULT_PRECISION + 2)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    write_text_artifact(path, &content)
}

/// PDF table written by a fitting run; every row must span the redshift grid.
pub fn read_pdf_table(path: &Path, num_redshifts: usize) -> PhotozResult<Vec<Vec<f64>>> {
    let rows = read_numeric_table(path, "IO.PDF_READ")?;
    if let Some(index) = rows.iter().position(|row| row.len() != num_redshifts) {
        return Err(PhotozError::configuration(
            "CONFIG.PDF_SHAPE",
            format!(
                "'{}' row {} has {} values, the redshift grid has {}",
                path.display(),
                index + 1,
                rows[index].len(),
                num_redshifts
            ),
        ));
    }
    Ok(rows)
}

/// One object index per line; blank lines and `#` comments are skipped.
pub fn read_selection(path: &Path) -> PhotozResult<Vec<usize>> {
    let source = std::fs::read_to_string(path).map_err(|source| {
        PhotozError::io_system(
            "IO.SELECTION_READ",
            format!("failed to read selection '{}': {}", path.display(), source),
        )
    })?;

    let mut selection = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let values = parse_numeric_row(trimmed).ok();
        let index = match values.as_deref() {
            Some([value]) if *value >= 0.0 && value.fract() == 0.0 => *value as usize,
            _ => {
                return Err(PhotozError::configuration(
                    "CONFIG.SELECTION",
                    format!(
                        "'{}' line {}: expected a single non-negative object index, got '{}'",
                        path.display(),
                        line_index + 1,
                        trimmed
                    ),
                ));
            }
        };
        selection.push(index);
    }
    Ok(selection)
}
