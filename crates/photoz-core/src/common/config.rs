//! JSON run configuration: band and template lists, the redshift grid, catalog
//! column layout and output locations.
//!
//! Relative paths are resolved against the directory holding the config file.

use super::constants::DEFAULT_FINE_GRID_POINTS;
use crate::domain::{PhotozError, PhotozResult, RedshiftGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotozConfig {
    pub bands_directory: PathBuf,
    pub band_names: Vec<String>,
    #[serde(default = "default_filter_extension")]
    pub filter_extension: String,
    pub templates_directory: PathBuf,
    pub template_names: Vec<String>,
    #[serde(default = "default_template_extension")]
    pub template_extension: String,
    pub lambda_ref: f64,
    pub redshift_grid: RedshiftGridSpec,
    #[serde(default = "default_fine_grid_points")]
    pub fine_grid_points: usize,
    #[serde(default)]
    pub confidence_levels: Vec<f64>,
    pub target: TargetCatalogConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "spacing", rename_all = "lowercase")]
pub enum RedshiftGridSpec {
    Linear {
        min: f64,
        max: f64,
        #[serde(rename = "binSize")]
        bin_size: f64,
    },
    Log {
        min: f64,
        max: f64,
        #[serde(rename = "numBins")]
        num_bins: usize,
    },
    Explicit {
        values: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCatalogConfig {
    pub catalog_file: PathBuf,
    pub band_order: Vec<String>,
    pub reference_band: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub flux_grid_directory: PathBuf,
    pub redshift_pdf_file: PathBuf,
    pub metrics_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub num_objects: usize,
    pub noise_level: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_filter_extension() -> String {
    "res".to_string()
}

fn default_template_extension() -> String {
    "sed".to_string()
}

fn default_fine_grid_points() -> usize {
    DEFAULT_FINE_GRID_POINTS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read run configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse run configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigLoadError> for PhotozError {
    fn from(error: ConfigLoadError) -> Self {
        match error {
            ConfigLoadError::Read { .. } => PhotozError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigLoadError::Parse { .. } => {
                PhotozError::configuration("CONFIG.PARSE", error.to_string())
            }
        }
    }
}

pub fn parse_config(source: &str, path: &Path) -> Result<PhotozConfig, ConfigLoadError> {
    serde_json::from_str(source).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads, resolves and validates the configuration at `config_path`.
pub fn load_config(config_path: impl AsRef<Path>) -> PhotozResult<PhotozConfig> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigLoadError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&source, config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base_dir);
    config.validate()?;
    Ok(config)
}

impl PhotozConfig {
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };

        resolve(&mut self.bands_directory);
        resolve(&mut self.templates_directory);
        resolve(&mut self.target.catalog_file);
        resolve(&mut self.output.flux_grid_directory);
        resolve(&mut self.output.redshift_pdf_file);
        resolve(&mut self.output.metrics_file);
    }

    pub fn validate(&self) -> PhotozResult<()> {
        validate_names("band", &self.band_names)?;
        validate_names("template", &self.template_names)?;

        if !(self.lambda_ref.is_finite() && self.lambda_ref > 0.0) {
            return Err(PhotozError::configuration(
                "CONFIG.LAMBDA_REF",
                format!("lambdaRef must be finite and > 0, got {}", self.lambda_ref),
            ));
        }

        if self.fine_grid_points < 2 {
            return Err(PhotozError::configuration(
                "CONFIG.FINE_GRID",
                format!(
                    "fineGridPoints must be >= 2, got {}",
                    self.fine_grid_points
                ),
            ));
        }

        if let Some(level) = self
            .confidence_levels
            .iter()
            .find(|level| !(level.is_finite() && **level > 0.0 && **level <= 1.0))
        {
            return Err(PhotozError::configuration(
                "CONFIG.CONFIDENCE_LEVELS",
                format!("confidence levels must lie in (0, 1], got {level}"),
            ));
        }

        if self.workers == Some(0) {
            return Err(PhotozError::configuration(
                "CONFIG.WORKERS",
                "workers must be >= 1",
            ));
        }

        if let Some(simulation) = &self.simulation {
            if !(simulation.noise_level.is_finite() && simulation.noise_level >= 0.0) {
                return Err(PhotozError::configuration(
                    "CONFIG.SIMULATION",
                    format!(
                        "simulation noiseLevel must be finite and >= 0, got {}",
                        simulation.noise_level
                    ),
                ));
            }
        }

        self.redshift_grid()?;
        Ok(())
    }

    pub fn redshift_grid(&self) -> PhotozResult<RedshiftGrid> {
        match &self.redshift_grid {
            RedshiftGridSpec::Linear { min, max, bin_size } => {
                RedshiftGrid::linear(*min, *max, *bin_size)
            }
            RedshiftGridSpec::Log { min, max, num_bins } => RedshiftGrid::log(*min, *max, *num_bins),
            RedshiftGridSpec::Explicit { values } => RedshiftGrid::new(values.clone()),
        }
    }

    pub fn filter_path(&self, band: &str) -> PathBuf {
        self.bands_directory
            .join(format!("{}.{}", band, self.filter_extension))
    }

    pub fn template_path(&self, template: &str) -> PathBuf {
        self.templates_directory
            .join(format!("{}.{}", template, self.template_extension))
    }
}

fn validate_names(kind: &str, names: &[String]) -> PhotozResult<()> {
    if names.is_empty() {
        return Err(PhotozError::configuration(
            "CONFIG.NAMES",
            format!("at least one {kind} name is required"),
        ));
    }

    let mut seen = BTreeSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(PhotozError::configuration(
                "CONFIG.NAMES",
                format!("{kind} names must not be blank"),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(PhotozError::configuration(
                "CONFIG.NAMES",
                format!("{kind} name '{name}' is listed more than once"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{PhotozConfig, RedshiftGridSpec, load_config, parse_config};
    use crate::domain::PhotozErrorCategory;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    pub(crate) const CONFIG_FIXTURE: &str = r#"
    {
      "bandsDirectory": "filters",
      "bandNames": ["u", "g", "r"],
      "templatesDirectory": "seds",
      "templateNames": ["flat", "red"],
      "lambdaRef": 4500.0,
      "redshiftGrid": { "spacing": "linear", "min": 0.1, "max": 1.0, "binSize": 0.1 },
      "fineGridPoints": 200,
      "confidenceLevels": [0.68, 0.95],
      "target": {
        "catalogFile": "catalog.txt",
        "bandOrder": ["u", "u_var", "g", "g_var", "r", "r_var", "redshift"],
        "referenceBand": "r"
      },
      "output": {
        "fluxGridDirectory": "grids",
        "redshiftPdfFile": "pdfs.txt",
        "metricsFile": "metrics.txt"
      }
    }
    "#;

    pub(crate) fn fixture_config() -> PhotozConfig {
        parse_config(CONFIG_FIXTURE, Path::new("params.json")).expect("fixture should parse")
    }

    #[test]
    fn parse_applies_defaults() {
        let config = fixture_config();
        assert_eq!(config.filter_extension, "res");
        assert_eq!(config.template_extension, "sed");
        assert_eq!(config.simulation, None);
        assert_eq!(config.workers, None);
        assert_eq!(
            config.redshift_grid,
            RedshiftGridSpec::Linear {
                min: 0.1,
                max: 1.0,
                bin_size: 0.1
            }
        );
        assert_eq!(config.redshift_grid().expect("grid").len(), 9);
    }

    #[test]
    fn load_resolves_paths_against_config_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("params.json");
        fs::write(&path, CONFIG_FIXTURE).expect("config should be written");

        let config = load_config(&path).expect("config should load");
        assert_eq!(config.bands_directory, temp.path().join("filters"));
        assert_eq!(config.target.catalog_file, temp.path().join("catalog.txt"));
        assert_eq!(config.filter_path("g"), temp.path().join("filters").join("g.res"));
        assert_eq!(
            config.template_path("red"),
            temp.path().join("seds").join("red.sed")
        );
    }

    #[test]
    fn load_reports_missing_file_as_io_error() {
        let error = load_config(PathBuf::from("/nonexistent/params.json"))
            .expect_err("missing config should fail");
        assert_eq!(error.category(), PhotozErrorCategory::IoSystemError);
        assert_eq!(error.code(), "IO.CONFIG_READ");
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("params.json");
        fs::write(&path, "{ \"bandNames\": ").expect("config should be written");

        let error = load_config(&path).expect_err("malformed config should fail");
        assert_eq!(error.category(), PhotozErrorCategory::ConfigurationError);
        assert_eq!(error.code(), "CONFIG.PARSE");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = fixture_config();
        config.confidence_levels = vec![0.5, 1.5];
        assert_eq!(
            config.validate().expect_err("level > 1").code(),
            "CONFIG.CONFIDENCE_LEVELS"
        );

        let mut config = fixture_config();
        config.band_names.push("u".to_string());
        assert_eq!(config.validate().expect_err("duplicate band").code(), "CONFIG.NAMES");

        let mut config = fixture_config();
        config.lambda_ref = 0.0;
        assert_eq!(
            config.validate().expect_err("zero lambdaRef").code(),
            "CONFIG.LAMBDA_REF"
        );

        let mut config = fixture_config();
        config.workers = Some(0);
        assert_eq!(config.validate().expect_err("zero workers").code(), "CONFIG.WORKERS");

        let mut config = fixture_config();
        config.redshift_grid = RedshiftGridSpec::Explicit {
            values: vec![0.3, 0.2],
        };
        assert_eq!(
            config.validate().expect_err("decreasing grid").code(),
            "CONFIG.REDSHIFT_GRID"
        );
    }

    #[test]
    fn log_and_explicit_grid_specs_parse() {
        let log = r#"{ "spacing": "log", "min": 0.01, "max": 2.0, "numBins": 50 }"#;
        let spec: RedshiftGridSpec = serde_json::from_str(log).expect("log spec");
        assert_eq!(
            spec,
            RedshiftGridSpec::Log {
                min: 0.01,
                max: 2.0,
                num_bins: 50
            }
        );

        let explicit = r#"{ "spacing": "explicit", "values": [0.1, 0.2] }"#;
        let spec: RedshiftGridSpec = serde_json::from_str(explicit).expect("explicit spec");
        assert_eq!(
            spec,
            RedshiftGridSpec::Explicit {
                values: vec![0.1, 0.2]
            }
        );
    }
}
