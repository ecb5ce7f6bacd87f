use super::serialization::read_numeric_table;
use crate::common::config::PhotozConfig;
use crate::common::constants::TRANSMISSION_WINDOW_FRACTION;
use crate::domain::{PhotozError, PhotozResult};
use crate::numerics::trapezoid;
use std::path::Path;

/// Transmission curve of one photometric band.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCurve {
    name: String,
    wavelengths: Vec<f64>,
    transmissions: Vec<f64>,
    window: (f64, f64),
    normalization: f64,
}

impl FilterCurve {
    pub fn from_samples(
        name: impl Into<String>,
        wavelengths: Vec<f64>,
        transmissions: Vec<f64>,
    ) -> PhotozResult<Self> {
        let name = name.into();
        validate_curve(&name, &wavelengths, &transmissions)?;

        let peak = transmissions.iter().copied().fold(0.0_f64, f64::max);
        let threshold = TRANSMISSION_WINDOW_FRACTION * peak;
        let first = transmissions.iter().position(|&value| value > threshold);
        let last = transmissions.iter().rposition(|&value| value > threshold);
        let (Some(first), Some(last)) = (first, last) else {
            return Err(PhotozError::internal(
                "SYS.FILTER_WINDOW",
                format!("filter '{name}' has no sample above its own peak fraction"),
            ));
        };
        let window = (wavelengths[first], wavelengths[last]);

        let weighted: Vec<f64> = wavelengths
            .iter()
            .zip(&transmissions)
            .map(|(wavelength, transmission)| transmission / wavelength)
            .collect();
        let normalization = trapezoid(&weighted, &wavelengths);
        if !(normalization.is_finite() && normalization > 0.0) {
            return Err(PhotozError::configuration(
                "CONFIG.FILTER_CURVE",
                format!("filter '{name}' integrates to a non-positive normalization {normalization}"),
            ));
        }

        Ok(Self {
            name,
            wavelengths,
            transmissions,
            window,
            normalization,
        })
    }

    pub fn load(name: &str, path: &Path) -> PhotozResult<Self> {
        let rows = read_numeric_table(path, "IO.FILTER_READ")?;
        let (wavelengths, transmissions) = two_columns(&rows, path)?;
        Self::from_samples(name, wavelengths, transmissions)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn transmissions(&self) -> &[f64] {
        &self.transmissions
    }

    /// Observed-frame wavelengths bounding the samples above 1% of peak transmission.
    pub fn effective_window(&self) -> (f64, f64) {
        self.window
    }

    /// `∫ T(λ)/λ dλ` over the full tabulated curve.
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    pub fn rest_frame_wavelengths(&self, opz: f64) -> Vec<f64> {
        self.wavelengths.iter().map(|wavelength| wavelength / opz).collect()
    }
}

fn validate_curve(name: &str, wavelengths: &[f64], transmissions: &[f64]) -> PhotozResult<()> {
    if wavelengths.len() < 2 || wavelengths.len() != transmissions.len() {
        return Err(PhotozError::configuration(
            "CONFIG.FILTER_CURVE",
            format!(
                "filter '{}' needs at least 2 (wavelength, transmission) samples, got {} and {}",
                name,
                wavelengths.len(),
                transmissions.len()
            ),
        ));
    }

    if let Some(index) = wavelengths
        .iter()
        .position(|wavelength| !(wavelength.is_finite() && *wavelength > 0.0))
    {
        return Err(PhotozError::configuration(
            "CONFIG.FILTER_CURVE",
            format!(
                "filter '{}' wavelength at row {} must be finite and > 0, got {}",
                name, index, wavelengths[index]
            ),
        ));
    }

    if let Some(index) = wavelengths.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(PhotozError::configuration(
            "CONFIG.FILTER_CURVE",
            format!(
                "filter '{}' wavelengths must be strictly increasing, row {} has {} after {}",
                name,
                index + 1,
                wavelengths[index + 1],
                wavelengths[index]
            ),
        ));
    }

    if let Some(index) = transmissions
        .iter()
        .position(|transmission| !(transmission.is_finite() && *transmission >= 0.0))
    {
        return Err(PhotozError::configuration(
            "CONFIG.FILTER_CURVE",
            format!(
                "filter '{}' transmission at row {} must be finite and >= 0, got {}",
                name, index, transmissions[index]
            ),
        ));
    }

    if !transmissions.iter().any(|transmission| *transmission > 0.0) {
        return Err(PhotozError::configuration(
            "CONFIG.FILTER_CURVE",
            format!("filter '{name}' has zero transmission everywhere"),
        ));
    }

    Ok(())
}

pub(crate) fn two_columns(rows: &[Vec<f64>], path: &Path) -> PhotozResult<(Vec<f64>, Vec<f64>)> {
    let mut first = Vec::with_capacity(rows.len());
    let mut second = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() < 2 {
            return Err(PhotozError::configuration(
                "CONFIG.TABLE_COLUMNS",
                format!(
                    "'{}' row {} has {} column(s), expected at least 2",
                    path.display(),
                    index + 1,
                    row.len()
                ),
            ));
        }
        first.push(row[0]);
        second.push(row[1]);
    }
    Ok((first, second))
}

/// Filter curves in configured band order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    filters: Vec<FilterCurve>,
}

impl FilterBank {
    pub fn new(filters: Vec<FilterCurve>) -> PhotozResult<Self> {
        if filters.is_empty() {
            return Err(PhotozError::configuration(
                "CONFIG.NAMES",
                "filter bank needs at least one band",
            ));
        }
        Ok(Self { filters })
    }

    pub fn load(config: &PhotozConfig) -> PhotozResult<Self> {
        let filters = config
            .band_names
            .iter()
            .map(|band| FilterCurve::load(band, &config.filter_path(band)))
            .collect::<PhotozResult<Vec<_>>>()?;
        Self::new(filters)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[FilterCurve] {
        &self.filters
    }

    pub fn index_of(&self, band: &str) -> Option<usize> {
        self.filters.iter().position(|filter| filter.name() == band)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{FilterBank, FilterCurve};
    use crate::domain::PhotozErrorCategory;
    use crate::numerics::linear_grid;
    use std::fs;
    use tempfile::TempDir;

    /// Triangular band peaking at `center` with zero transmission at both ends.
    pub(crate) fn triangle_filter(name: &str, center: f64, half_width: f64) -> FilterCurve {
        let wavelengths = linear_grid(center - half_width, center + half_width, 81).expect("grid");
        let transmissions = wavelengths
            .iter()
            .map(|wavelength| (1.0 - (wavelength - center).abs() / half_width).max(0.0))
            .collect();
        FilterCurve::from_samples(name, wavelengths, transmissions).expect("valid filter")
    }

    #[test]
    fn window_is_strictly_inside_raw_range_and_norm_is_positive() {
        let filter = triangle_filter("g", 4800.0, 700.0);
        let (lower, upper) = filter.effective_window();
        let wavelengths = filter.wavelengths();

        assert!(lower > wavelengths[0]);
        assert!(upper < wavelengths[wavelengths.len() - 1]);
        assert!(lower < upper);
        assert!(filter.normalization() > 0.0);
    }

    #[test]
    fn normalization_matches_flat_filter_closed_form() {
        let wavelengths = linear_grid(1000.0, 2000.0, 1001).expect("grid");
        let transmissions = vec![1.0; wavelengths.len()];
        let filter = FilterCurve::from_samples("flat", wavelengths, transmissions).expect("flat");

        assert!((filter.normalization() - 2.0_f64.ln()).abs() < 1.0e-6);
        assert_eq!(filter.effective_window(), (1000.0, 2000.0));
    }

    #[test]
    fn window_ignores_low_transmission_wings() {
        let wavelengths = vec![3000.0, 3100.0, 3200.0, 3300.0, 3400.0];
        let transmissions = vec![0.001, 0.2, 0.8, 0.5, 0.005];
        let filter = FilterCurve::from_samples("r", wavelengths, transmissions).expect("filter");
        assert_eq!(filter.effective_window(), (3100.0, 3300.0));
    }

    #[test]
    fn invalid_curves_are_configuration_errors() {
        let error = FilterCurve::from_samples("bad", vec![2.0, 1.0], vec![1.0, 1.0])
            .expect_err("decreasing wavelengths");
        assert_eq!(error.category(), PhotozErrorCategory::ConfigurationError);

        assert!(FilterCurve::from_samples("bad", vec![1.0, 2.0], vec![-0.1, 1.0]).is_err());
        assert!(FilterCurve::from_samples("bad", vec![1.0, 2.0], vec![0.0, 0.0]).is_err());
        assert!(FilterCurve::from_samples("bad", vec![1.0], vec![1.0]).is_err());
    }

    #[test]
    fn load_reads_two_column_text() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("i.res");
        fs::write(&path, "# lambda T\n7000 0.0\n7500 0.9\n8000 0.0\n").expect("filter written");

        let filter = FilterCurve::load("i", &path).expect("filter should load");
        assert_eq!(filter.name(), "i");
        assert_eq!(filter.wavelengths(), &[7000.0, 7500.0, 8000.0]);
        assert_eq!(filter.effective_window(), (7500.0, 7500.0));
    }

    #[test]
    fn bank_looks_up_bands_by_name() {
        let bank = FilterBank::new(vec![
            triangle_filter("u", 3500.0, 400.0),
            triangle_filter("g", 4800.0, 700.0),
        ])
        .expect("bank");
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.index_of("g"), Some(1));
        assert_eq!(bank.index_of("z"), None);
        assert!(FilterBank::new(Vec::new()).is_err());
    }
}
