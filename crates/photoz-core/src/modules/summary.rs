//! Mode and width of normalized redshift PDFs for a selection of objects.

use super::catalog::{read_pdf_table, read_selection, write_summary};
use crate::common::config::load_config;
use crate::common::constants::{SENTINEL, WIDTH_SCALE};
use crate::domain::{PhotozError, PhotozResult, RunArtifact};
use crate::numerics::{argmax_first, trapezoid};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, info_span};

#[derive(Debug, Clone, PartialEq)]
pub struct RedshiftSummary {
    pub modes: Vec<f64>,
    pub widths: Vec<f64>,
}

impl RedshiftSummary {
    /// `[mode, width]` per object.
    pub fn rows(&self) -> Vec<[f64; 2]> {
        self.modes
            .iter()
            .zip(&self.widths)
            .map(|(mode, width)| [*mode, *width])
            .collect()
    }
}

/// PDF row `k` belongs to the `k`-th smallest selected index; unselected objects stay at -1.
pub fn summarize(
    pdfs: &[Vec<f64>],
    redshifts: &[f64],
    selection: &[usize],
    total: usize,
) -> PhotozResult<RedshiftSummary> {
    let selected: BTreeSet<usize> = selection.iter().copied().collect();
    if let Some(index) = selected.iter().find(|index| **index >= total) {
        return Err(PhotozError::configuration(
            "CONFIG.SELECTION",
            format!("selected object {index} is outside a catalog of {total} objects"),
        ));
    }
    if selected.len() > pdfs.len() {
        return Err(PhotozError::configuration(
            "CONFIG.SELECTION",
            format!(
                "{} objects selected but only {} PDF rows available",
                selected.len(),
                pdfs.len()
            ),
        ));
    }

    let mut modes = vec![SENTINEL; total];
    for (row, object_index) in selected.into_iter().enumerate() {
        modes[object_index] = pdf_mode(&pdfs[row], redshifts);
    }

    let widths = modes
        .iter()
        .map(|&mode| {
            if mode > 0.0 {
                WIDTH_SCALE * (1.0 + mode)
            } else {
                SENTINEL
            }
        })
        .collect();

    Ok(RedshiftSummary { modes, widths })
}

/// Summarizes the PDF file of the run configured at `config_path`.
pub fn summarize_pdf_file(
    config_path: &Path,
    selection_path: &Path,
    total: usize,
    output_path: &Path,
) -> PhotozResult<Vec<RunArtifact>> {
    let span = info_span!("run", module = "SUMMARIZE");
    let _entered = span.enter();

    let config = load_config(config_path)?;
    let redshifts = config.redshift_grid()?;
    let pdfs = read_pdf_table(&config.output.redshift_pdf_file, redshifts.len())?;
    let selection = read_selection(selection_path)?;
    info!(
        pdf_rows = pdfs.len(),
        selected = selection.len(),
        total,
        "summarizing redshift PDFs"
    );

    let summary = summarize(&pdfs, redshifts.values(), &selection, total)?;
    write_summary(output_path, &summary.rows())?;
    info!(path = %output_path.display(), "summary written");
    Ok(vec![RunArtifact::new(output_path)])
}

fn pdf_mode(pdf: &[f64], redshifts: &[f64]) -> f64 {
    let integral = trapezoid(pdf, redshifts);
    if !(integral.is_finite() && integral > 0.0) {
        return SENTINEL;
    }

    let normalized: Vec<f64> = pdf.iter().map(|value| value / integral).collect();
    match argmax_first(&normalized) {
        Some(index) if index < redshifts.len() => redshifts[index],
        _ => SENTINEL,
    }
}

#[cfg(test)]
mod tests {
    use super::summarize;
    use crate::domain::PhotozErrorCategory;

    const GRID: [f64; 5] = [0.0, 0.1, 0.2, 0.3, 0.4];

    #[test]
    fn peak_at_index_three_gives_mode_and_width() {
        let pdfs = vec![vec![0.0, 1.0, 2.0, 5.0, 1.0]];
        let summary = summarize(&pdfs, &GRID, &[0], 1).expect("summary");
        assert_eq!(summary.modes, vec![0.3]);
        assert!((summary.widths[0] - 0.13).abs() < 1.0e-12);
    }

    #[test]
    fn all_zero_pdf_yields_sentinels() {
        let pdfs = vec![vec![0.0; 5]];
        let summary = summarize(&pdfs, &GRID, &[0], 1).expect("summary");
        assert_eq!(summary.modes, vec![-1.0]);
        assert_eq!(summary.widths, vec![-1.0]);
    }

    #[test]
    fn zero_mode_has_sentinel_width() {
        let pdfs = vec![vec![4.0, 1.0, 0.0, 0.0, 0.0]];
        let summary = summarize(&pdfs, &GRID, &[0], 1).expect("summary");
        assert_eq!(summary.modes, vec![0.0]);
        assert_eq!(summary.widths, vec![-1.0]);
    }

    #[test]
    fn rows_map_to_selected_objects_in_ascending_order() {
        let pdfs = vec![
            vec![0.0, 3.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 3.0],
        ];
        let summary = summarize(&pdfs, &GRID, &[4, 1], 6).expect("summary");
        assert_eq!(summary.modes, vec![-1.0, 0.1, -1.0, -1.0, 0.4, -1.0]);
        assert_eq!(summary.rows()[4][0], 0.4);
        assert!((summary.rows()[1][1] - 0.11).abs() < 1.0e-12);
    }

    #[test]
    fn inconsistent_selection_is_rejected() {
        let pdfs = vec![vec![1.0; 5]];
        let error = summarize(&pdfs, &GRID, &[7], 3).expect_err("index beyond total");
        assert_eq!(error.category(), PhotozErrorCategory::ConfigurationError);

        let error = summarize(&pdfs, &GRID, &[0, 1], 3).expect_err("more selections than rows");
        assert_eq!(error.code(), "CONFIG.SELECTION");
    }
}
