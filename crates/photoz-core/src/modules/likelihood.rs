//! Scale-free likelihood of an observed object over the (redshift, template)
//! grid, with the unknown flux amplitude marginalized analytically.

use super::flux_grid::FluxGrid;
use crate::common::constants::MIN_USABLE_BANDS;
use crate::domain::{ObservedObject, PhotozError, PhotozResult};

pub const REFERENCE_FLUX_CODE: &str = "DATA.REFERENCE_FLUX";
pub const TOO_FEW_BANDS_CODE: &str = "DATA.TOO_FEW_BANDS";

/// Indices of the bands that may enter the likelihood sums.
///
/// Fails with a non-fatal data validity error when the object has to be
/// skipped altogether.
pub fn usable_bands(object: &ObservedObject) -> PhotozResult<Vec<usize>> {
    if !(object.reference_flux.is_finite() && object.reference_flux > 0.0) {
        return Err(PhotozError::data_validity(
            REFERENCE_FLUX_CODE,
            format!(
                "object {} has reference flux {}",
                object.index, object.reference_flux
            ),
        ));
    }

    let bands: Vec<usize> = object
        .fluxes
        .iter()
        .zip(&object.variances)
        .enumerate()
        .filter(|(_, (flux, variance))| {
            flux.is_finite() && **flux > 0.0 && variance.is_finite() && **variance > 0.0
        })
        .map(|(band_index, _)| band_index)
        .collect();

    if bands.len() < MIN_USABLE_BANDS {
        return Err(PhotozError::data_validity(
            TOO_FEW_BANDS_CODE,
            format!(
                "object {} has {} usable band(s), at least {} required",
                object.index,
                bands.len(),
                MIN_USABLE_BANDS
            ),
        ));
    }

    Ok(bands)
}

/// Relative likelihood over `[redshift][template]`, scaled so the best cell is 1.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodGrid {
    num_redshifts: usize,
    num_templates: usize,
    values: Vec<f64>,
}

impl LikelihoodGrid {
    pub fn get(&self, redshift_index: usize, template_index: usize) -> f64 {
        self.values[redshift_index * self.num_templates + template_index]
    }

    pub fn num_redshifts(&self) -> usize {
        self.num_redshifts
    }

    pub fn num_templates(&self) -> usize {
        self.num_templates
    }

    /// `(redshift_index, template_index)` of the first largest cell.
    pub fn best_cell(&self) -> Option<(usize, usize)> {
        crate::numerics::argmax_first(&self.values).map(|flat| {
            (flat / self.num_templates, flat % self.num_templates)
        })
    }

    /// Sum over templates: the unnormalized redshift PDF.
    pub fn redshift_pdf(&self) -> Vec<f64> {
        self.values
            .chunks(self.num_templates)
            .map(|row| row.iter().sum())
            .collect()
    }
}

/// `ln L = ½·FOT²/FTT − ½·FOO − ½·ln FTT` for every grid cell, using only `bands`.
pub fn scale_free_likelihood(
    fluxes: &[f64],
    variances: &[f64],
    bands: &[usize],
    flux_grid: &FluxGrid,
) -> PhotozResult<LikelihoodGrid> {
    if fluxes.len() != flux_grid.num_bands() || variances.len() != flux_grid.num_bands() {
        return Err(PhotozError::internal(
            "SYS.BAND_COUNT",
            format!(
                "observation carries {} fluxes and {} variances for a {}-band flux grid",
                fluxes.len(),
                variances.len(),
                flux_grid.num_bands()
            ),
        ));
    }

    let foo: f64 = bands
        .iter()
        .map(|&band| fluxes[band] * fluxes[band] / variances[band])
        .sum();

    let num_redshifts = flux_grid.num_redshifts();
    let num_templates = flux_grid.num_templates();
    let mut log_likelihood = Vec::with_capacity(num_redshifts * num_templates);
    for redshift_index in 0..num_redshifts {
        for template_index in 0..num_templates {
            let model = flux_grid.model(redshift_index, template_index);
            let (mut fot, mut ftt) = (0.0, 0.0);
            for &band in bands {
                fot += fluxes[band] * model[band] / variances[band];
                ftt += model[band] * model[band] / variances[band];
            }

            let value = if ftt > 0.0 {
                0.5 * fot * fot / ftt - 0.5 * foo - 0.5 * ftt.ln()
            } else {
                f64::NEG_INFINITY
            };
            log_likelihood.push(if value.is_finite() {
                value
            } else {
                f64::NEG_INFINITY
            });
        }
    }

    let peak = log_likelihood
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let values = if peak.is_finite() {
        log_likelihood
            .into_iter()
            .map(|value| (value - peak).exp())
            .collect()
    } else {
        vec![0.0; num_redshifts * num_templates]
    };

    Ok(LikelihoodGrid {
        num_redshifts,
        num_templates,
        values,
    })
}

/// Gates `object`, then evaluates its likelihood and sums over templates.
pub fn redshift_pdf(object: &ObservedObject, flux_grid: &FluxGrid) -> PhotozResult<Vec<f64>> {
    let bands = usable_bands(object)?;
    let grid = scale_free_likelihood(&object.fluxes, &object.variances, &bands, flux_grid)?;
    Ok(grid.redshift_pdf())
}
