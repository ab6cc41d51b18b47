//! Conversion of screen-level reanalysis fields to forcing at a reference height.
//!
//! Temperature follows a constant lapse rate, pressure the hypsometric
//! equation, wind a neutral log profile over the reanalysis roughness length.
//! Humidity comes from the lapse-adjusted dewpoint through the Flatau et al.
//! (1992) saturation vapour pressure polynomials.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ForcingError, ForcingResult};
use crate::record::{ForcingRecord, RawRecord};

/// Height and lapse parameters of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Reference height (m)
    pub zbot: f64,
    /// Temperature lapse rate (K/m)
    pub lapse_rate: f64,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            zbot: DEFAULT_ZBOT,
            lapse_rate: DEFAULT_LAPSE_RATE,
        }
    }
}

impl ConversionParams {
    pub fn new(zbot: f64, lapse_rate: f64) -> ForcingResult<Self> {
        let params = Self { zbot, lapse_rate };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> ForcingResult<()> {
        if !self.zbot.is_finite() || self.zbot <= 0.0 {
            return Err(ForcingError::InvalidConfig(format!(
                "zbot must be a positive height in metres, got {}",
                self.zbot
            )));
        }
        if !self.lapse_rate.is_finite() {
            return Err(ForcingError::InvalidConfig(format!(
                "lapse rate must be finite, got {}",
                self.lapse_rate
            )));
        }
        Ok(())
    }
}

/// Air temperature at `zbot` from the 2 m temperature (K).
pub fn air_temperature(t2m: f64, lapse_rate: f64, zbot: f64) -> f64 {
    t2m - lapse_rate * (zbot - SCREEN_HEIGHT)
}

/// Surface pressure at `zbot` using the scale height of the air at `zbot` (Pa).
pub fn surface_pressure(sp: f64, tair: f64, zbot: f64) -> f64 {
    let scale_height = R_DRY_AIR * tair / GRAVITY;
    sp * (-(zbot - SCREEN_HEIGHT) / scale_height).exp()
}

/// 10 m wind speed rescaled to `zbot` with a log profile over roughness `fsr` (m/s).
pub fn wind_speed(u10: f64, v10: f64, zbot: f64, fsr: f64) -> f64 {
    u10.hypot(v10) * (zbot / fsr).ln() / (WIND_HEIGHT / fsr).ln()
}

/// Dewpoint at `zbot` in degrees Celsius.
pub fn dewpoint_celsius(d2m: f64, zbot: f64) -> f64 {
    d2m - 273.15 - DEWPOINT_LAPSE * (zbot - SCREEN_HEIGHT)
}

/// Saturation vapour pressure (Pa) at a temperature in degrees Celsius.
///
/// Uses the water polynomial at or above 0 °C and the ice polynomial below.
pub fn saturation_vapor_pressure(td: f64) -> f64 {
    let coeffs = if td >= 0.0 { &WATER_COEFFS } else { &ICE_COEFFS };
    let hpa = coeffs.iter().rev().fold(0.0, |acc, c| acc * td + c);
    hpa * 100.0
}

/// Specific humidity (kg/kg) from vapour pressure and surface pressure (Pa).
pub fn specific_humidity(e: f64, psurf: f64) -> f64 {
    floor(EPSILON * e / (psurf - (1.0 - EPSILON) * e))
}

/// Replace values that are not strictly positive (including NaN) with [`FLOOR`].
pub fn floor(v: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        FLOOR
    }
}

/// Hourly accumulation (J/m^2) to mean flux (W/m^2), floored.
pub fn accumulated_flux(acc: f64) -> f64 {
    floor(acc / SECONDS_PER_HOUR)
}

/// Hourly precipitation depth (m) to rate (mm/s), floored.
pub fn precipitation_rate(tp: f64) -> f64 {
    floor(tp * 1000.0 / SECONDS_PER_HOUR)
}

/// Derive the forcing series from a raw record.
pub fn convert(raw: &RawRecord, params: &ConversionParams) -> ForcingResult<ForcingRecord> {
    params.validate()?;
    raw.validate()?;

    let zbot = params.zbot;
    let n = raw.len();
    let mut out = ForcingRecord {
        time: raw.time.clone(),
        zbot,
        tair: Vec::with_capacity(n),
        psurf: Vec::with_capacity(n),
        wind: Vec::with_capacity(n),
        qair: Vec::with_capacity(n),
        swdown: Vec::with_capacity(n),
        lwdown: Vec::with_capacity(n),
        prectmms: Vec::with_capacity(n),
    };

    for i in 0..n {
        let tair = air_temperature(raw.t2m[i], params.lapse_rate, zbot);
        let psurf = surface_pressure(raw.sp[i], tair, zbot);
        let e = saturation_vapor_pressure(dewpoint_celsius(raw.d2m[i], zbot));

        out.tair.push(tair);
        out.psurf.push(psurf);
        out.wind.push(wind_speed(raw.u10[i], raw.v10[i], zbot, raw.fsr[i]));
        out.qair.push(specific_humidity(e, psurf));
        out.swdown.push(accumulated_flux(raw.ssrd[i]));
        out.lwdown.push(accumulated_flux(raw.strd[i]));
        out.prectmms.push(precipitation_rate(raw.tp[i]));
    }

    Ok(out)
}
