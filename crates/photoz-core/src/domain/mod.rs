pub mod errors;

pub use errors::{PhotozError, PhotozErrorCategory, PhotozResult};

use crate::numerics::{linear_grid, log_grid};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunModule {
    ProcessSeds,
    Simulate,
    TemplateFitting,
}

impl RunModule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessSeds => "PROCESS_SEDS",
            Self::Simulate => "SIMULATE",
            Self::TemplateFitting => "TEMPLATE_FITTING",
        }
    }
}

impl Display for RunModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub module: RunModule,
    pub config_path: PathBuf,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
}

impl RunRequest {
    pub fn new(module: RunModule, config_path: impl Into<PathBuf>) -> Self {
        Self {
            module,
            config_path: config_path.into(),
            workers: None,
            seed: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifact {
    pub path: PathBuf,
}

impl RunArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Redshift values every flux table and likelihood is evaluated on.
#[derive(Debug, Clone, PartialEq)]
pub struct RedshiftGrid {
    values: Vec<f64>,
}

impl RedshiftGrid {
    pub fn new(values: Vec<f64>) -> PhotozResult<Self> {
        let Some(&first) = values.first() else {
            return Err(PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                "redshift grid must contain at least one value",
            ));
        };

        if !first.is_finite() || first < 0.0 {
            return Err(PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                format!("redshift grid must start at a finite value >= 0, got {first}"),
            ));
        }

        if let Some(index) = values
            .windows(2)
            .position(|pair| !(pair[1].is_finite() && pair[1] > pair[0]))
        {
            return Err(PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                format!(
                    "redshift grid must be strictly increasing, index {} has {} after {}",
                    index + 1,
                    values[index + 1],
                    values[index]
                ),
            ));
        }

        Ok(Self { values })
    }

    /// `arange`-style grid: `min, min + step, ...` strictly below `max`.
    pub fn linear(min: f64, max: f64, bin_size: f64) -> PhotozResult<Self> {
        if !(min.is_finite() && max.is_finite() && bin_size.is_finite() && bin_size > 0.0 && max > min) {
            return Err(PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                format!(
                    "invalid linear redshift grid: min={min}, max={max}, binSize={bin_size}"
                ),
            ));
        }

        let count = ((max - min) / bin_size).ceil() as usize;
        let values = (0..count.max(1))
            .map(|index| min + bin_size * index as f64)
            .collect();
        Self::new(values)
    }

    pub fn log(min: f64, max: f64, num_bins: usize) -> PhotozResult<Self> {
        let values = log_grid(min, max, num_bins).ok_or_else(|| {
            PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                format!(
                    "invalid log redshift grid: min={min}, max={max}, numBins={num_bins} (need 0 < min < max, numBins >= 2)"
                ),
            )
        })?;
        Self::new(values)
    }

    pub fn evenly_spaced(min: f64, max: f64, count: usize) -> PhotozResult<Self> {
        let values = linear_grid(min, max, count).ok_or_else(|| {
            PhotozError::configuration(
                "CONFIG.REDSHIFT_GRID",
                format!("evenly spaced redshift grid needs at least 2 points, got {count}"),
            )
        })?;
        Self::new(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }
}

/// One catalog row, with fluxes and variances in configured band order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedObject {
    pub index: usize,
    pub fluxes: Vec<f64>,
    pub variances: Vec<f64>,
    pub true_redshift: Option<f64>,
    pub reference_flux: f64,
}

#[cfg(test)]
mod tests {
    use super::{PhotozErrorCategory, RedshiftGrid, RunModule, RunRequest};

    #[test]
    fn run_request_defaults_leave_overrides_unset() {
        let request = RunRequest::new(RunModule::TemplateFitting, "params.json");
        assert_eq!(request.workers, None);
        assert_eq!(request.seed, None);
        assert_eq!(request.module.to_string(), "TEMPLATE_FITTING");

        let request = request.with_workers(4).with_seed(7);
        assert_eq!(request.workers, Some(4));
        assert_eq!(request.seed, Some(7));
    }

    #[test]
    fn linear_grid_excludes_upper_bound_like_arange() {
        let grid = RedshiftGrid::linear(0.0, 0.5, 0.1).expect("grid");
        assert_eq!(grid.len(), 5);
        assert!((grid.last() - 0.4).abs() < 1.0e-12);
    }

    #[test]
    fn log_grid_includes_both_ends() {
        let grid = RedshiftGrid::log(0.01, 1.0, 3).expect("grid");
        assert_eq!(grid.len(), 3);
        assert!((grid.values()[1] - 0.1).abs() < 1.0e-12);
        assert!((grid.last() - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn grid_rejects_non_increasing_or_negative_values() {
        let error = RedshiftGrid::new(vec![0.1, 0.1, 0.2]).expect_err("duplicate value");
        assert_eq!(error.category(), PhotozErrorCategory::ConfigurationError);

        let error = RedshiftGrid::new(vec![-0.1, 0.2]).expect_err("negative start");
        assert_eq!(error.code(), "CONFIG.REDSHIFT_GRID");

        assert!(RedshiftGrid::new(Vec::new()).is_err());
    }

    #[test]
    fn single_point_grid_is_valid() {
        let grid = RedshiftGrid::new(vec![0.5]).expect("single point");
        assert_eq!(grid.first(), grid.last());
    }
}
