//! Unit conversions from the raw ERA5 variables to the units the daily
//! summary reports: °C for temperature, mm for precipitation, hPa for
//! pressure and percent for relative humidity.

/// 2 m temperature and dewpoint arrive in kelvin.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

/// Total precipitation arrives in metres of water equivalent.
pub fn metres_to_millimetres(metres: f64) -> f64 {
    metres * 1000.0
}

/// Mean sea level pressure arrives in pascal.
pub fn pascals_to_hectopascals(pascals: f64) -> f64 {
    pascals / 100.0
}

/// Saturation vapour pressure over water in hPa, Magnus approximation
/// (Bolton 1980), for a temperature in °C.
fn saturation_vapour_pressure(temperature_c: f64) -> f64 {
    6.112 * (17.67 * temperature_c / (temperature_c + 243.5)).exp()
}

/// Relative humidity in percent from air temperature and dewpoint, both in °C.
///
/// `rh = e_s(dewpoint) / e_s(temperature)`, the same formulation metpy's
/// `relative_humidity_from_dewpoint` uses.
pub fn relative_humidity_from_dewpoint(temperature_c: f64, dewpoint_c: f64) -> f64 {
    100.0 * saturation_vapour_pressure(dewpoint_c) / saturation_vapour_pressure(temperature_c)
}
