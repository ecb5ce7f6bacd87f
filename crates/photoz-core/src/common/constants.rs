pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
pub const DEFAULT_HUBBLE_CONSTANT: f64 = 70.0;
pub const DEFAULT_OMEGA_MATTER: f64 = 0.3;

pub const DEFAULT_FINE_GRID_POINTS: usize = 5000;
/// Filter samples above this fraction of peak transmission bound the integration window.
pub const TRANSMISSION_WINDOW_FRACTION: f64 = 0.01;

pub const MIN_USABLE_BANDS: usize = 2;
pub const SENTINEL: f64 = -1.0;
pub const WIDTH_SCALE: f64 = 0.1;

pub const FLUX_GRID_SUFFIX: &str = "_fluxredshiftmod.txt";
pub const VARIANCE_SUFFIX: &str = "_var";
pub const REDSHIFT_COLUMN: &str = "redshift";
pub const IGNORED_COLUMN: &str = "_";
