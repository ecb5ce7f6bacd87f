use super::filters::two_columns;
use super::serialization::read_numeric_table;
use crate::common::config::PhotozConfig;
use crate::domain::{PhotozError, PhotozResult};
use crate::numerics::{InterpolationError, interpolate_strict};
use std::path::Path;

/// Rest-frame SED scaled so that `λ·L(λ)` equals one at the reference wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSed {
    name: String,
    wavelengths: Vec<f64>,
    values: Vec<f64>,
}

impl TemplateSed {
    pub fn from_samples(
        name: impl Into<String>,
        wavelengths: Vec<f64>,
        luminosities: Vec<f64>,
        lambda_ref: f64,
    ) -> PhotozResult<Self> {
        let name = name.into();
        validate_samples(&name, &wavelengths, &luminosities)?;

        let weighted: Vec<f64> = wavelengths
            .iter()
            .zip(&luminosities)
            .map(|(wavelength, luminosity)| luminosity * wavelength)
            .collect();

        let reference = interpolate_strict(lambda_ref, &wavelengths, &weighted).map_err(|error| {
            PhotozError::configuration(
                "CONFIG.LAMBDA_REF",
                format!("template '{name}' cannot be normalized at lambdaRef={lambda_ref}: {error}"),
            )
        })?;
        if !(reference.is_finite() && reference > 0.0) {
            return Err(PhotozError::configuration(
                "CONFIG.LAMBDA_REF",
                format!(
                    "template '{name}' has non-positive luminosity {reference} at lambdaRef={lambda_ref}"
                ),
            ));
        }

        let values = weighted.into_iter().map(|value| value / reference).collect();
        Ok(Self {
            name,
            wavelengths,
            values,
        })
    }

    pub fn load(name: &str, path: &Path, lambda_ref: f64) -> PhotozResult<Self> {
        let rows = read_numeric_table(path, "IO.TEMPLATE_READ")?;
        let (wavelengths, luminosities) = two_columns(&rows, path)?;
        Self::from_samples(name, wavelengths, luminosities, lambda_ref)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn wavelength_range(&self) -> (f64, f64) {
        (self.wavelengths[0], self.wavelengths[self.wavelengths.len() - 1])
    }

    pub fn evaluate(&self, wavelength: f64) -> Result<f64, InterpolationError> {
        interpolate_strict(wavelength, &self.wavelengths, &self.values)
    }
}

fn validate_samples(name: &str, wavelengths: &[f64], luminosities: &[f64]) -> PhotozResult<()> {
    if wavelengths.len() < 2 || wavelengths.len() != luminosities.len() {
        return Err(PhotozError::configuration(
            "CONFIG.TEMPLATE_SED",
            format!(
                "template '{}' needs at least 2 (wavelength, luminosity) samples, got {} and {}",
                name,
                wavelengths.len(),
                luminosities.len()
            ),
        ));
    }

    if let Some(index) = wavelengths
        .windows(2)
        .position(|pair| !(pair[0].is_finite() && pair[0] > 0.0 && pair[1] > pair[0]))
    {
        return Err(PhotozError::configuration(
            "CONFIG.TEMPLATE_SED",
            format!(
                "template '{}' wavelengths must be positive and strictly increasing near row {}",
                name,
                index + 1
            ),
        ));
    }

    if let Some(index) = luminosities
        .iter()
        .position(|value| !(value.is_finite() && *value >= 0.0))
    {
        return Err(PhotozError::configuration(
            "CONFIG.TEMPLATE_SED",
            format!(
                "template '{}' luminosity at row {} must be finite and >= 0, got {}",
                name, index, luminosities[index]
            ),
        ));
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLibrary {
    templates: Vec<TemplateSed>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<TemplateSed>) -> PhotozResult<Self> {
        if templates.is_empty() {
            return Err(PhotozError::configuration(
                "CONFIG.NAMES",
                "template library needs at least one template",
            ));
        }
        Ok(Self { templates })
    }

    pub fn load(config: &PhotozConfig) -> PhotozResult<Self> {
        let templates = config
            .template_names
            .iter()
            .map(|name| TemplateSed::load(name, &config.template_path(name), config.lambda_ref))
            .collect::<PhotozResult<Vec<_>>>()?;
        Self::new(templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[TemplateSed] {
        &self.templates
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(TemplateSed::name).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{TemplateLibrary, TemplateSed};
    use crate::domain::PhotozErrorCategory;
    use crate::numerics::{InterpolationError, log_grid};
    use std::fs;
    use tempfile::TempDir;

    /// Power law `L(λ) ∝ λ^slope` tabulated from 100 to 30000 Angstrom.
    pub(crate) fn power_law_template(name: &str, slope: f64, lambda_ref: f64) -> TemplateSed {
        let wavelengths = log_grid(100.0, 30_000.0, 600).expect("grid");
        let luminosities = wavelengths
            .iter()
            .map(|wavelength| (wavelength / 1000.0).powf(slope))
            .collect();
        TemplateSed::from_samples(name, wavelengths, luminosities, lambda_ref).expect("template")
    }

    #[test]
    fn normalization_sets_weighted_luminosity_to_one_at_reference() {
        let template = power_law_template("blue", -1.5, 4500.0);
        let at_reference = template.evaluate(4500.0).expect("inside range");
        assert!((at_reference - 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn flat_lambda_weighted_template_is_constant_after_normalization() {
        let template = power_law_template("flat", -1.0, 2000.0);
        for wavelength in [500.0, 5000.0, 20_000.0] {
            let value = template.evaluate(wavelength).expect("inside range");
            assert!((value - 1.0).abs() < 1.0e-9);
        }
    }

    #[test]
    fn evaluation_outside_tabulated_range_fails_loudly() {
        let template = power_law_template("blue", -1.5, 4500.0);
        let error = template.evaluate(50.0).expect_err("below range");
        assert!(matches!(error, InterpolationError::OutOfDomain { .. }));
    }

    #[test]
    fn reference_outside_template_is_rejected() {
        let error = TemplateSed::from_samples("short", vec![1000.0, 2000.0], vec![1.0, 1.0], 4500.0)
            .expect_err("lambdaRef outside template");
        assert_eq!(error.category(), PhotozErrorCategory::ConfigurationError);
        assert_eq!(error.code(), "CONFIG.LAMBDA_REF");

        let error = TemplateSed::from_samples("dark", vec![1000.0, 5000.0], vec![0.0, 0.0], 4500.0)
            .expect_err("zero luminosity at lambdaRef");
        assert_eq!(error.code(), "CONFIG.LAMBDA_REF");
    }

    #[test]
    fn library_loads_templates_from_text() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("flat.sed");
        fs::write(&path, "1000 2.0\n3000 2.0\n9000 2.0\n").expect("template written");

        let template = TemplateSed::load("flat", &path, 3000.0).expect("template should load");
        assert_eq!(template.wavelength_range(), (1000.0, 9000.0));
        assert!((template.values()[1] - 1.0).abs() < 1.0e-12);

        let library = TemplateLibrary::new(vec![template]).expect("library");
        assert_eq!(library.names(), vec!["flat"]);
        assert!(TemplateLibrary::new(Vec::new()).is_err());
    }
}
