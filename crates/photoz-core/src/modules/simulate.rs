//! Mock target catalog drawn from persisted flux-grid tables.

use super::ModuleExecutor;
use super::catalog::{ColumnLayout, write_catalog};
use super::flux_grid::FluxGrid;
use crate::common::config::{PhotozConfig, load_config};
use crate::domain::{PhotozError, PhotozResult, RunArtifact, RunRequest};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{info, info_span};

/// Noise model and draw count for one simulated catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    pub num_objects: usize,
    pub noise_level: f64,
    pub seed: u64,
}

/// Rows in band-order layout plus a trailing template-index column.
///
/// Redshifts are uniform over the grid range, templates uniform over the
/// library. Each band flux is interpolated along redshift, perturbed with
/// `σ = noise_level × flux` and stored with variance `σ²`.
pub fn simulate_catalog(
    flux_grid: &FluxGrid,
    layout: &ColumnLayout,
    settings: &SimulationSettings,
) -> PhotozResult<Vec<Vec<f64>>> {
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let redshifts = flux_grid.redshifts();
    let (lower, upper) = (redshifts[0], redshifts[redshifts.len() - 1]);

    let mut rows = Vec::with_capacity(settings.num_objects);
    for _ in 0..settings.num_objects {
        let redshift = rng.gen_range(lower..=upper);
        let template_index = rng.gen_range(0..flux_grid.num_templates());

        let mut row = vec![0.0; layout.width() + 1];
        for (band_index, columns) in layout.band_columns().iter().enumerate() {
            let Some((flux_column, variance_column)) = columns else {
                continue;
            };
            let true_flux = flux_grid.interpolate_flux(template_index, band_index, redshift)?;
            let sigma = true_flux * settings.noise_level;
            let noise = Normal::new(true_flux, sigma).map_err(|error| {
                PhotozError::domain(
                    "DOMAIN.NOISE_MODEL",
                    format!(
                        "cannot draw flux around {true_flux} with sigma {sigma} in band '{}': {error}",
                        flux_grid.band_names()[band_index]
                    ),
                )
            })?;
            row[*flux_column] = noise.sample(&mut rng);
            row[*variance_column] = sigma * sigma;
        }

        if let Some(column) = layout.redshift_column() {
            row[column] = redshift;
        }
        row[layout.width()] = template_index as f64;
        rows.push(row);
    }

    Ok(rows)
}

fn simulation_settings(config: &PhotozConfig, seed_override: Option<u64>) -> PhotozResult<SimulationSettings> {
    let simulation = config.simulation.as_ref().ok_or_else(|| {
        PhotozError::configuration(
            "CONFIG.SIMULATION",
            "the simulate module needs a 'simulation' section with numObjects and noiseLevel",
        )
    })?;

    Ok(SimulationSettings {
        num_objects: simulation.num_objects,
        noise_level: simulation.noise_level,
        seed: seed_override.unwrap_or(simulation.seed),
    })
}

pub struct SimulateModule;

impl ModuleExecutor for SimulateModule {
    fn execute(&self, request: &RunRequest) -> PhotozResult<Vec<RunArtifact>> {
        let span = info_span!("run", module = %request.module);
        let _entered = span.enter();

        let config = load_config(&request.config_path)?;
        let settings = simulation_settings(&config, request.seed)?;
        let layout = ColumnLayout::from_config(&config)?;
        let flux_grid = FluxGrid::read_template_tables(
            &config.output.flux_grid_directory,
            &config.redshift_grid()?,
            &config.template_names,
            &config.band_names,
        )?;

        info!(
            objects = settings.num_objects,
            noise_level = settings.noise_level,
            seed = settings.seed,
            "simulating target catalog"
        );
        let rows = simulate_catalog(&flux_grid, &layout, &settings)?;
        write_catalog(&config.target.catalog_file, &rows)?;
        info!(path = %config.target.catalog_file.display(), "simulated catalog written");

        Ok(vec![RunArtifact::new(config.target.catalog_file)])
    }
}
