use crate::common::constants::SENTINEL;
use crate::numerics::{
    argmax_first, deterministic_argsort_descending, interpolate_linear, stable_sum,
};

/// Point estimates and highest-density-interval flags for one object.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub true_redshift: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub map: f64,
    pub residual: f64,
    /// One entry per confidence level: 1.0 when the true redshift lies inside the interval.
    pub calibration_flags: Vec<f64>,
}

impl MetricsRecord {
    pub const fn row_width(num_levels: usize) -> usize {
        5 + num_levels
    }

    pub fn sentinel_row(num_levels: usize) -> Vec<f64> {
        vec![SENTINEL; Self::row_width(num_levels)]
    }

    pub fn to_row(&self) -> Vec<f64> {
        let mut row = vec![
            self.true_redshift,
            self.mean,
            self.std_dev,
            self.map,
            self.residual,
        ];
        row.extend_from_slice(&self.calibration_flags);
        row
    }
}

/// `None` when the true redshift is unknown or the PDF carries no mass.
pub fn compute(
    true_redshift: Option<f64>,
    redshifts: &[f64],
    pdf: &[f64],
    confidence_levels: &[f64],
) -> Option<MetricsRecord> {
    let true_redshift = true_redshift.filter(|value| value.is_finite())?;
    if redshifts.is_empty() || redshifts.len() != pdf.len() {
        return None;
    }

    let total = stable_sum(pdf);
    if !(total.is_finite() && total > 0.0) {
        return None;
    }

    let mean = redshifts
        .iter()
        .zip(pdf)
        .map(|(redshift, weight)| redshift * weight)
        .sum::<f64>()
        / total;
    let variance = redshifts
        .iter()
        .zip(pdf)
        .map(|(redshift, weight)| (redshift - mean).powi(2) * weight)
        .sum::<f64>()
        / total;
    let map = redshifts[argmax_first(pdf)?];

    let density_at_truth = interpolate_linear(true_redshift, redshifts, pdf)?;
    let order = deterministic_argsort_descending(pdf);
    let calibration_flags = confidence_levels
        .iter()
        .map(|&level| {
            let threshold = hdi_threshold(pdf, &order, total, level);
            if density_at_truth >= threshold { 1.0 } else { 0.0 }
        })
        .collect();

    Some(MetricsRecord {
        true_redshift,
        mean,
        std_dev: variance.sqrt(),
        map,
        residual: map - true_redshift,
        calibration_flags,
    })
}

/// Density of the last cell accepted into the highest-density region holding `level` of the mass.
fn hdi_threshold(pdf: &[f64], order: &[usize], total: f64, level: f64) -> f64 {
    let mut accumulated = 0.0;
    let mut threshold = pdf[order[0]];
    for &index in order {
        threshold = pdf[index];
        accumulated += pdf[index] / total;
        if accumulated >= level {
            break;
        }
    }
    threshold
}

#[cfg(test)]
mod tests {
    use super::{MetricsRecord, compute};

    const GRID: [f64; 5] = [0.0, 0.1, 0.2, 0.3, 0.4];

    #[test]
    fn moments_and_map_follow_pdf_weights() {
        let pdf = [0.0, 1.0, 2.0, 1.0, 0.0];
        let record = compute(Some(0.25), &GRID, &pdf, &[]).expect("metrics");

        assert!((record.mean - 0.2).abs() < 1.0e-12);
        assert!((record.std_dev - 0.005_f64.sqrt()).abs() < 1.0e-12);
        assert_eq!(record.map, 0.2);
        assert!((record.residual + 0.05).abs() < 1.0e-12);
        assert_eq!(record.to_row().len(), MetricsRecord::row_width(0));
    }

    #[test]
    fn calibration_flags_use_highest_density_interval() {
        let pdf = [0.05, 0.1, 0.7, 0.1, 0.05];
        let levels = [0.5, 0.8, 0.95];

        let at_peak = compute(Some(0.2), &GRID, &pdf, &levels).expect("metrics");
        assert_eq!(at_peak.calibration_flags, vec![1.0, 1.0, 1.0]);

        let shoulder = compute(Some(0.1), &GRID, &pdf, &levels).expect("metrics");
        assert_eq!(shoulder.calibration_flags, vec![0.0, 1.0, 1.0]);

        let tail = compute(Some(0.4), &GRID, &pdf, &levels).expect("metrics");
        assert_eq!(tail.calibration_flags, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn true_redshift_beyond_grid_is_clamped_to_edge_density() {
        let pdf = [0.05, 0.1, 0.7, 0.1, 0.05];
        let record = compute(Some(3.0), &GRID, &pdf, &[0.95]).expect("metrics");
        assert_eq!(record.calibration_flags, vec![1.0]);
        assert!((record.residual + 2.8).abs() < 1.0e-12);
    }

    #[test]
    fn unknown_truth_or_empty_pdf_yields_sentinel() {
        let pdf = [0.0, 1.0, 2.0, 1.0, 0.0];
        assert_eq!(compute(None, &GRID, &pdf, &[0.68]), None);
        assert_eq!(compute(Some(f64::NAN), &GRID, &pdf, &[0.68]), None);
        assert_eq!(compute(Some(0.2), &GRID, &[0.0; 5], &[0.68]), None);

        assert_eq!(MetricsRecord::sentinel_row(2), vec![-1.0; 7]);
    }
}
