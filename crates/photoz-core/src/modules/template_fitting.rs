//! Full fitting run: flux grid, partitioned catalog evaluation, gather and write.

use super::ModuleExecutor;
use super::catalog::{ColumnLayout, count_lines, read_line_range, write_result_table};
use super::flux_grid::FluxGrid;
use super::likelihood::redshift_pdf;
use super::metrics::{MetricsRecord, compute};
use super::parallel::{GatingTally, ParallelCoordinator, Partition, PartitionOutput, PartitionWorker};
use super::process_seds::build_flux_grid;
use crate::common::config::load_config;
use crate::domain::{ObservedObject, PhotozResult, RunArtifact, RunRequest};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// PDF and metrics rows for `objects`, in order. Objects failing the
/// validity gate keep a zero PDF row and a sentinel metrics row.
pub fn evaluate_objects(
    partition: Partition,
    objects: &[ObservedObject],
    flux_grid: &FluxGrid,
    confidence_levels: &[f64],
) -> PhotozResult<PartitionOutput> {
    let num_redshifts = flux_grid.num_redshifts();
    let metrics_width = MetricsRecord::row_width(confidence_levels.len());
    let mut output = PartitionOutput {
        partition,
        pdfs: Vec::with_capacity(objects.len() * num_redshifts),
        metrics: Vec::with_capacity(objects.len() * metrics_width),
        tally: GatingTally::default(),
    };

    for object in objects {
        match redshift_pdf(object, flux_grid) {
            Ok(pdf) => {
                let metrics = compute(
                    object.true_redshift,
                    flux_grid.redshifts(),
                    &pdf,
                    confidence_levels,
                )
                .map(|record| record.to_row())
                .unwrap_or_else(|| MetricsRecord::sentinel_row(confidence_levels.len()));
                output.pdfs.extend_from_slice(&pdf);
                output.metrics.extend_from_slice(&metrics);
                output.tally.record_evaluated();
            }
            Err(error) if !error.is_fatal() => {
                output.tally.record_skip(error.code());
                output.pdfs.extend(std::iter::repeat_n(0.0, num_redshifts));
                output
                    .metrics
                    .extend(MetricsRecord::sentinel_row(confidence_levels.len()));
            }
            Err(error) => return Err(error),
        }
    }

    Ok(output)
}

/// Reads its own catalog line range and evaluates it against a shared flux grid.
pub struct CatalogPartitionWorker<'a> {
    pub catalog_path: &'a Path,
    pub layout: &'a ColumnLayout,
    pub flux_grid: Arc<FluxGrid>,
    pub confidence_levels: &'a [f64],
}

impl PartitionWorker for CatalogPartitionWorker<'_> {
    fn run(&self, partition: Partition) -> PhotozResult<PartitionOutput> {
        let objects = read_line_range(self.catalog_path, self.layout, partition.start, partition.end)?;
        evaluate_objects(partition, &objects, &self.flux_grid, self.confidence_levels)
    }
}

pub struct TemplateFittingModule;

impl ModuleExecutor for TemplateFittingModule {
    fn execute(&self, request: &RunRequest) -> PhotozResult<Vec<RunArtifact>> {
        let span = info_span!("run", module = %request.module);
        let _entered = span.enter();

        let config = load_config(&request.config_path)?;
        let layout = ColumnLayout::from_config(&config)?;
        let flux_grid = Arc::new(build_flux_grid(&config)?);

        let num_objects = count_lines(&config.target.catalog_file)?;
        let num_workers = request
            .workers
            .or(config.workers)
            .unwrap_or_else(rayon::current_num_threads);
        info!(
            catalog = %config.target.catalog_file.display(),
            objects = num_objects,
            workers = num_workers,
            redshifts = flux_grid.num_redshifts(),
            "fitting target catalog"
        );

        let worker = CatalogPartitionWorker {
            catalog_path: &config.target.catalog_file,
            layout: &layout,
            flux_grid: Arc::clone(&flux_grid),
            confidence_levels: &config.confidence_levels,
        };
        let metrics_width = MetricsRecord::row_width(config.confidence_levels.len());
        let gathered = ParallelCoordinator::new(num_workers).run(
            &worker,
            num_objects,
            flux_grid.num_redshifts(),
            metrics_width,
        )?;

        info!(
            evaluated = gathered.tally.evaluated,
            skipped = gathered.tally.total_skipped(),
            "catalog evaluated"
        );
        for (code, count) in &gathered.tally.skipped {
            warn!(reason = code, count, "objects skipped");
        }

        let mut artifacts = Vec::with_capacity(2);
        write_result_table(
            &config.output.redshift_pdf_file,
            &gathered.pdfs,
            gathered.pdf_width,
        )?;
        artifacts.push(RunArtifact::new(config.output.redshift_pdf_file.clone()));

        if layout.has_redshift() {
            write_result_table(
                &config.output.metrics_file,
                &gathered.metrics,
                gathered.metrics_width,
            )?;
            artifacts.push(RunArtifact::new(config.output.metrics_file.clone()));
        }

        for artifact in &artifacts {
            info!(path = %artifact.path.display(), "artifact written");
        }
        Ok(artifacts)
    }
}
