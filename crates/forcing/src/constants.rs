//! Physical constants and fixed output conventions.

/// Boltzmann's constant (J/K/molecule)
pub const BOLTZMANN: f64 = 1.38065e-23;

/// Avogadro's number (molecules/kmole)
pub const AVOGADRO: f64 = 6.02214e26;

/// Molecular weight of dry air (kg/kmole)
pub const MW_DRY_AIR: f64 = 28.966;

/// Acceleration of gravity (m/s^2)
pub const GRAVITY: f64 = 9.80616;

/// Universal gas constant (J/K/kmole)
pub const R_GAS: f64 = AVOGADRO * BOLTZMANN;

/// Dry air gas constant (J/K/kg)
pub const R_DRY_AIR: f64 = R_GAS / MW_DRY_AIR;

/// Ratio of molecular weights of water vapour and dry air used for Qair.
pub const EPSILON: f64 = 0.622;

/// Dewpoint lapse rate (K/m).
pub const DEWPOINT_LAPSE: f64 = 0.0018;

/// Default temperature lapse rate (K/m), Pritchard et al. (GRL, 35, 2008).
pub const DEFAULT_LAPSE_RATE: f64 = 0.006;

/// Default forcing reference height (m).
pub const DEFAULT_ZBOT: f64 = 30.0;

/// Height of the reanalysis screen-level temperature and humidity (m).
pub const SCREEN_HEIGHT: f64 = 2.0;

/// Height of the reanalysis wind (m).
pub const WIND_HEIGHT: f64 = 10.0;

/// Seconds per accumulation period of hourly reanalysis fluxes.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Floor applied to non-positive radiation, precipitation and humidity.
pub const FLOOR: f64 = 1.0e-16;

/// Fill value carried by every forcing variable.
pub const FILL_VALUE: f64 = 1.0e36;

/// Flatau et al. (1992) polynomial for saturation vapour pressure over water (hPa).
pub const WATER_COEFFS: [f64; 9] = [
    6.11213476,
    0.444007856,
    0.143064234e-01,
    0.264461437e-03,
    0.305903558e-05,
    0.196237241e-07,
    0.892344772e-10,
    -0.373208410e-12,
    0.209339997e-15,
];

/// Flatau et al. (1992) polynomial for saturation vapour pressure over ice (hPa).
pub const ICE_COEFFS: [f64; 9] = [
    6.11123516,
    0.503109514,
    0.188369801e-01,
    0.420547422e-03,
    0.614396778e-05,
    0.602780717e-07,
    0.387940929e-09,
    0.149436277e-11,
    0.262655803e-14,
];
