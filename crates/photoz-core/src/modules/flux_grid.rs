//! Expected flux of every template in every band on the redshift grid.
//!
//! For each redshift the observed-frame filter window is mapped into the
//! template rest frame, the filter and the template are sampled on a fine
//! linear grid there, and the trapezoidal integral of their product is divided
//! by the filter normalization and dimmed by `(1+z)² / (4π D_L²)`.

use super::cosmology::LuminosityDistance;
use super::filters::{FilterBank, FilterCurve};
use super::serialization::{read_numeric_table, render_table, write_text_artifact};
use super::templates::{TemplateLibrary, TemplateSed};
use crate::common::constants::{DEFAULT_FINE_GRID_POINTS, FLUX_GRID_SUFFIX};
use crate::domain::{PhotozError, PhotozResult, RedshiftGrid};
use crate::numerics::{interpolate_strict, linear_grid, trapezoid};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TABLE_PRECISION: usize = 18;

/// Dense `[redshift][template][band]` flux table, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxGrid {
    redshifts: Vec<f64>,
    template_names: Vec<String>,
    band_names: Vec<String>,
    values: Vec<f64>,
}

impl FluxGrid {
    pub fn from_values(
        redshifts: &RedshiftGrid,
        template_names: Vec<String>,
        band_names: Vec<String>,
        values: Vec<f64>,
    ) -> PhotozResult<Self> {
        let expected = redshifts.len() * template_names.len() * band_names.len();
        if values.len() != expected || expected == 0 {
            return Err(PhotozError::internal(
                "SYS.FLUX_GRID_SHAPE",
                format!(
                    "flux grid expects {} x {} x {} = {} values, got {}",
                    redshifts.len(),
                    template_names.len(),
                    band_names.len(),
                    expected,
                    values.len()
                ),
            ));
        }

        Ok(Self {
            redshifts: redshifts.values().to_vec(),
            template_names,
            band_names,
            values,
        })
    }

    pub fn num_redshifts(&self) -> usize {
        self.redshifts.len()
    }

    pub fn num_templates(&self) -> usize {
        self.template_names.len()
    }

    pub fn num_bands(&self) -> usize {
        self.band_names.len()
    }

    pub fn redshifts(&self) -> &[f64] {
        &self.redshifts
    }

    pub fn template_names(&self) -> &[String] {
        &self.template_names
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    fn offset(&self, redshift_index: usize, template_index: usize) -> usize {
        (redshift_index * self.num_templates() + template_index) * self.num_bands()
    }

    pub fn get(&self, redshift_index: usize, template_index: usize, band_index: usize) -> f64 {
        self.values[self.offset(redshift_index, template_index) + band_index]
    }

    /// Model fluxes in all bands for one (redshift, template) cell.
    pub fn model(&self, redshift_index: usize, template_index: usize) -> &[f64] {
        let start = self.offset(redshift_index, template_index);
        &self.values[start..start + self.num_bands()]
    }

    /// Rows are redshifts, columns are bands.
    pub fn template_table(&self, template_index: usize) -> Vec<&[f64]> {
        (0..self.num_redshifts())
            .map(|redshift_index| self.model(redshift_index, template_index))
            .collect()
    }

    /// Linear interpolation of one band's flux along the redshift axis.
    pub fn interpolate_flux(
        &self,
        template_index: usize,
        band_index: usize,
        redshift: f64,
    ) -> PhotozResult<f64> {
        let column: Vec<f64> = (0..self.num_redshifts())
            .map(|redshift_index| self.get(redshift_index, template_index, band_index))
            .collect();

        if self.redshifts.len() == 1 {
            return if redshift == self.redshifts[0] {
                Ok(column[0])
            } else {
                Err(PhotozError::domain(
                    "DOMAIN.REDSHIFT_RANGE",
                    format!(
                        "redshift {} is not the single grid value {}",
                        redshift, self.redshifts[0]
                    ),
                ))
            };
        }

        interpolate_strict(redshift, &self.redshifts, &column).map_err(|error| {
            PhotozError::domain(
                "DOMAIN.REDSHIFT_RANGE",
                format!(
                    "template '{}' band '{}': {}",
                    self.template_names[template_index], self.band_names[band_index], error
                ),
            )
        })
    }

    pub fn table_path(directory: &Path, template_name: &str) -> PathBuf {
        directory.join(format!("{template_name}{FLUX_GRID_SUFFIX}"))
    }

    /// Writes one whitespace-delimited table per template.
    pub fn write_template_tables(&self, directory: &Path) -> PhotozResult<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.num_templates());
        for (template_index, name) in self.template_names.iter().enumerate() {
            let path = Self::table_path(directory, name);
            let content = render_table(self.template_table(template_index), TABLE_PRECISION);
            write_text_artifact(&path, &content)?;
            paths.push(path);
        }
        Ok(paths)
    }

    pub fn read_template_tables(
        directory: &Path,
        redshifts: &RedshiftGrid,
        template_names: &[String],
        band_names: &[String],
    ) -> PhotozResult<Self> {
        let num_bands = band_names.len();
        let mut tables = Vec::with_capacity(template_names.len());
        for name in template_names {
            let path = Self::table_path(directory, name);
            let rows = read_numeric_table(&path, "IO.FLUX_GRID_READ")?;
            if rows.len() != redshifts.len() || rows.iter().any(|row| row.len() != num_bands) {
                return Err(PhotozError::configuration(
                    "CONFIG.FLUX_GRID_SHAPE",
                    format!(
                        "'{}' must hold {} rows of {} columns to match the configured grid",
                        path.display(),
                        redshifts.len(),
                        num_bands
                    ),
                ));
            }
            tables.push(rows);
        }

        let mut values = Vec::with_capacity(redshifts.len() * template_names.len() * num_bands);
        for redshift_index in 0..redshifts.len() {
            for table in &tables {
                values.extend_from_slice(&table[redshift_index]);
            }
        }

        Self::from_values(redshifts, template_names.to_vec(), band_names.to_vec(), values)
    }
}

pub struct FluxGridBuilder<'a> {
    cosmology: &'a dyn LuminosityDistance,
    fine_grid_points: usize,
}

impl<'a> FluxGridBuilder<'a> {
    pub fn new(cosmology: &'a dyn LuminosityDistance) -> Self {
        Self {
            cosmology,
            fine_grid_points: DEFAULT_FINE_GRID_POINTS,
        }
    }

    pub fn with_fine_grid_points(mut self, fine_grid_points: usize) -> Self {
        self.fine_grid_points = fine_grid_points;
        self
    }

    pub fn build(
        &self,
        templates: &TemplateLibrary,
        filters: &FilterBank,
        redshifts: &RedshiftGrid,
    ) -> PhotozResult<FluxGrid> {
        if self.fine_grid_points < 2 {
            return Err(PhotozError::configuration(
                "CONFIG.FINE_GRID",
                format!("fine grid needs at least 2 points, got {}", self.fine_grid_points),
            ));
        }

        let dimming = self.dimming_factors(redshifts)?;
        info!(
            templates = templates.len(),
            bands = filters.len(),
            redshifts = redshifts.len(),
            fine_grid_points = self.fine_grid_points,
            "building template flux grid"
        );

        let blocks = templates
            .templates()
            .par_iter()
            .map(|template| self.template_block(template, filters, redshifts, &dimming))
            .collect::<PhotozResult<Vec<_>>>()?;

        let num_bands = filters.len();
        let mut values = Vec::with_capacity(redshifts.len() * templates.len() * num_bands);
        for redshift_index in 0..redshifts.len() {
            for block in &blocks {
                let start = redshift_index * num_bands;
                values.extend_from_slice(&block[start..start + num_bands]);
            }
        }

        FluxGrid::from_values(
            redshifts,
            templates.names().into_iter().map(str::to_string).collect(),
            filters
                .filters()
                .iter()
                .map(|filter| filter.name().to_string())
                .collect(),
            values,
        )
    }

    fn dimming_factors(&self, redshifts: &RedshiftGrid) -> PhotozResult<Vec<f64>> {
        redshifts
            .values()
            .iter()
            .map(|&redshift| {
                let distance = self.cosmology.luminosity_distance(redshift);
                if !(distance.is_finite() && distance > 0.0) {
                    return Err(PhotozError::domain(
                        "DOMAIN.LUMINOSITY_DISTANCE",
                        format!(
                            "luminosity distance at z={redshift} is {distance}; flux dimming needs a positive distance"
                        ),
                    ));
                }
                let opz = 1.0 + redshift;
                Ok(opz * opz / (distance * distance) / (4.0 * PI))
            })
            .collect()
    }

    /// `[redshift][band]` fluxes for a single template.
    fn template_block(
        &self,
        template: &TemplateSed,
        filters: &FilterBank,
        redshifts: &RedshiftGrid,
        dimming: &[f64],
    ) -> PhotozResult<Vec<f64>> {
        let mut block = vec![0.0; redshifts.len() * filters.len()];
        for (band_index, filter) in filters.filters().iter().enumerate() {
            for (redshift_index, &redshift) in redshifts.values().iter().enumerate() {
                let flux = self.band_flux(template, filter, redshift)?;
                block[redshift_index * filters.len() + band_index] = flux * dimming[redshift_index];
            }
        }
        debug!(template = template.name(), "template flux block complete");
        Ok(block)
    }

    fn band_flux(&self, template: &TemplateSed, filter: &FilterCurve, redshift: f64) -> PhotozResult<f64> {
        let opz = 1.0 + redshift;
        let (lower, upper) = filter.effective_window();
        let rest_filter = filter.rest_frame_wavelengths(opz);
        let fine = linear_grid(lower / opz, upper / opz, self.fine_grid_points).ok_or_else(|| {
            PhotozError::internal("SYS.FINE_GRID", "fine grid construction failed")
        })?;

        let mut integrand = Vec::with_capacity(fine.len());
        for &wavelength in &fine {
            let transmission = interpolate_strict(wavelength, &rest_filter, filter.transmissions())
                .map_err(|error| {
                    PhotozError::domain(
                        "DOMAIN.FILTER_RANGE",
                        format!(
                            "filter '{}' at z={}: {}",
                            filter.name(),
                            redshift,
                            error
                        ),
                    )
                })?;
            let luminosity = template.evaluate(wavelength).map_err(|error| {
                PhotozError::domain(
                    "DOMAIN.TEMPLATE_RANGE",
                    format!(
                        "template '{}' does not cover band '{}' at z={}: {}",
                        template.name(),
                        filter.name(),
                        redshift,
                        error
                    ),
                )
            })?;
            integrand.push(transmission * luminosity);
        }

        Ok(trapezoid(&integrand, &fine) / filter.normalization())
    }
}
