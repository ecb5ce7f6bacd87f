use super::ModuleExecutor;
use super::cosmology::FlatLambdaCdm;
use super::filters::FilterBank;
use super::flux_grid::{FluxGrid, FluxGridBuilder};
use super::templates::TemplateLibrary;
use crate::common::config::{PhotozConfig, load_config};
use crate::domain::{PhotozResult, RunArtifact, RunRequest};
use tracing::{info, info_span};

/// Loads filters and templates named by `config` and integrates the flux grid.
pub fn build_flux_grid(config: &PhotozConfig) -> PhotozResult<FluxGrid> {
    let filters = FilterBank::load(config)?;
    let templates = TemplateLibrary::load(config)?;
    let redshifts = config.redshift_grid()?;
    let cosmology = FlatLambdaCdm::default();

    FluxGridBuilder::new(&cosmology)
        .with_fine_grid_points(config.fine_grid_points)
        .build(&templates, &filters, &redshifts)
}

/// Builds the flux grid and persists one table per template.
pub struct ProcessSedsModule;

impl ModuleExecutor for ProcessSedsModule {
    fn execute(&self, request: &RunRequest) -> PhotozResult<Vec<RunArtifact>> {
        let span = info_span!("run", module = %request.module);
        let _entered = span.enter();

        let config = load_config(&request.config_path)?;
        info!(
            config = %request.config_path.display(),
            bands = config.band_names.len(),
            templates = config.template_names.len(),
            "processing SED templates"
        );

        let flux_grid = build_flux_grid(&config)?;
        let paths = flux_grid.write_template_tables(&config.output.flux_grid_directory)?;
        info!(
            directory = %config.output.flux_grid_directory.display(),
            tables = paths.len(),
            "flux grid tables written"
        );

        Ok(paths.into_iter().map(RunArtifact::new).collect())
    }
}
