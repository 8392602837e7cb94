//! Turns a downloaded NetCDF file into the per-day summary DataFrame.
//!
//! Each retrieval covers one grid cell, so every time step holds a handful of
//! grid points around the municipality. Per step those points are averaged
//! into a single value; per day the 3-hourly values are aggregated into
//! minimum, mean and maximum. The resulting frame has the columns
//!
//! `geocodigo, date, temp_min/med/max, precip_min/med/max,
//! pressao_min/med/max, umid_min/med/max`
//!
//! in °C, mm, hPa and percent respectively. Relative humidity is derived from
//! temperature and dewpoint, not retrieved directly.

use crate::cds::request::Era5Variable;
use crate::reanalysis::convert;
use crate::reanalysis::date_selection::DateSelection;
use crate::reanalysis::error::ReanalysisError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use netcdf::AttributeValue;
use polars::prelude::*;
use std::path::Path;

/// Spatially averaged time series of one output variable, in output units.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSeries {
    /// Output column prefix (`temp`, `precip`, `pressao`, `umid`).
    pub name: &'static str,
    pub samples: Vec<(NaiveDateTime, f64)>,
}

/// Reads a NetCDF file and produces the daily summary with the leading
/// `geocodigo` column.
///
/// Time steps outside `selection` are dropped before aggregation: the CDS
/// cross-products the year/month/day request selectors, so a downloaded file
/// for a range crossing a month boundary contains days the caller never asked
/// for.
pub fn summarize_file(
    path: &Path,
    geocode: u32,
    selection: &DateSelection,
) -> Result<DataFrame, ReanalysisError> {
    let series = clip_to_selection(read_series(path)?, selection);
    let summary = daily_summary(&series)?;

    let mut columns = vec![col("geocodigo"), col("date")];
    for s in &series {
        for stat in ["min", "med", "max"] {
            columns.push(col(format!("{}_{}", s.name, stat)));
        }
    }

    let df = summary
        .lazy()
        .with_column(lit(geocode).alias("geocodigo"))
        .select(columns)
        .collect()?;
    Ok(df)
}

/// Extracts the four output series (temperature, precipitation, pressure,
/// relative humidity) from a downloaded file.
pub fn read_series(path: &Path) -> Result<Vec<VariableSeries>, ReanalysisError> {
    let file =
        netcdf::open(path).map_err(|e| ReanalysisError::NetcdfOpen(path.to_path_buf(), e))?;
    let times = read_time_axis(&file, path)?;

    let t2m = spatial_means(&file, path, Era5Variable::Temperature2m, times.len())?;
    let tp = spatial_means(&file, path, Era5Variable::TotalPrecipitation, times.len())?;
    let d2m = spatial_means(&file, path, Era5Variable::Dewpoint2m, times.len())?;
    let msl = spatial_means(&file, path, Era5Variable::MeanSeaLevelPressure, times.len())?;

    Ok(vec![
        series("temp", &times, &t2m, convert::kelvin_to_celsius),
        series("precip", &times, &tp, convert::metres_to_millimetres),
        series("pressao", &times, &msl, convert::pascals_to_hectopascals),
        humidity_series(&times, &t2m, &d2m),
    ])
}

/// Drops samples whose date falls outside the selection.
fn clip_to_selection(
    series: Vec<VariableSeries>,
    selection: &DateSelection,
) -> Vec<VariableSeries> {
    series
        .into_iter()
        .map(|s| VariableSeries {
            name: s.name,
            samples: s
                .samples
                .into_iter()
                .filter(|(time, _)| {
                    let date = time.date();
                    selection.start() <= date && date <= selection.end()
                })
                .collect(),
        })
        .collect()
}

fn series(
    name: &'static str,
    times: &[NaiveDateTime],
    means: &[Option<f64>],
    convert_unit: impl Fn(f64) -> f64,
) -> VariableSeries {
    let samples = times
        .iter()
        .zip(means)
        .filter_map(|(time, mean)| mean.map(|value| (*time, convert_unit(value))))
        .collect();
    VariableSeries { name, samples }
}

fn humidity_series(
    times: &[NaiveDateTime],
    t2m: &[Option<f64>],
    d2m: &[Option<f64>],
) -> VariableSeries {
    let samples = times
        .iter()
        .zip(t2m.iter().zip(d2m))
        .filter_map(|(time, (temperature, dewpoint))| match (temperature, dewpoint) {
            (Some(t), Some(d)) => Some((
                *time,
                convert::relative_humidity_from_dewpoint(
                    convert::kelvin_to_celsius(*t),
                    convert::kelvin_to_celsius(*d),
                ),
            )),
            _ => None,
        })
        .collect();
    VariableSeries {
        name: "umid",
        samples,
    }
}

/// Groups every series by day, aggregates to min/mean/max and joins the
/// results on `date`, sorted ascending.
pub fn daily_summary(series: &[VariableSeries]) -> Result<DataFrame, ReanalysisError> {
    let mut frames = series
        .iter()
        .map(variable_frame)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let first = frames.next().ok_or_else(|| {
        ReanalysisError::DataFrame(PolarsError::NoData(
            "no variable series to aggregate".into(),
        ))
    })?;
    let merged = frames.fold(first, |acc, frame| {
        acc.join(
            frame,
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Inner),
        )
    });
    Ok(merged.sort(["date"], Default::default()).collect()?)
}

fn variable_frame(series: &VariableSeries) -> Result<LazyFrame, ReanalysisError> {
    let dates: Vec<NaiveDate> = series.samples.iter().map(|(time, _)| time.date()).collect();
    let values: Vec<f64> = series.samples.iter().map(|(_, value)| *value).collect();
    let df = df!("date" => dates, "value" => values)?;
    Ok(df.lazy().group_by([col("date")]).agg([
        col("value").min().alias(format!("{}_min", series.name)),
        col("value").mean().alias(format!("{}_med", series.name)),
        col("value").max().alias(format!("{}_max", series.name)),
    ]))
}

/// Per-time-step mean over the cell's grid points, unpacked to physical
/// (dataset) units but not yet converted to output units.
fn spatial_means(
    file: &netcdf::File,
    path: &Path,
    variable: Era5Variable,
    steps: usize,
) -> Result<Vec<Option<f64>>, ReanalysisError> {
    let name = variable.short_name();
    let var = file
        .variable(name)
        .ok_or_else(|| ReanalysisError::MissingVariable {
            path: path.to_path_buf(),
            variable: name.to_string(),
        })?;
    let raw = var
        .get_values::<f64, _>(..)
        .map_err(|e| ReanalysisError::NetcdfRead {
            path: path.to_path_buf(),
            variable: name.to_string(),
            source: e,
        })?;
    if steps == 0 || raw.len() % steps != 0 {
        return Err(ReanalysisError::ShapeMismatch {
            path: path.to_path_buf(),
            variable: name.to_string(),
            values: raw.len(),
            steps,
        });
    }

    // ERA5 NetCDF files pack values as shorts; unpack with the variable's
    // scale/offset and mask its fill value (compared in packed units).
    let scale = attr_f64(&var, "scale_factor").unwrap_or(1.0);
    let offset = attr_f64(&var, "add_offset").unwrap_or(0.0);
    let fill = attr_f64(&var, "_FillValue").or_else(|| attr_f64(&var, "missing_value"));

    Ok(unpacked_means(&raw, steps, scale, offset, fill))
}

fn unpacked_means(
    raw: &[f64],
    steps: usize,
    scale: f64,
    offset: f64,
    fill: Option<f64>,
) -> Vec<Option<f64>> {
    let per_step = raw.len() / steps;
    raw.chunks(per_step)
        .map(|chunk| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for &value in chunk {
                if !value.is_finite() || fill.is_some_and(|f| value == f) {
                    continue;
                }
                sum += value * scale + offset;
                count += 1;
            }
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

fn read_time_axis(
    file: &netcdf::File,
    path: &Path,
) -> Result<Vec<NaiveDateTime>, ReanalysisError> {
    let var = file
        .variable("time")
        .or_else(|| file.variable("valid_time"))
        .ok_or_else(|| ReanalysisError::MissingTimeAxis(path.to_path_buf()))?;
    let name = var.name();
    let raw = var
        .get_values::<f64, _>(..)
        .map_err(|e| ReanalysisError::NetcdfRead {
            path: path.to_path_buf(),
            variable: name,
            source: e,
        })?;
    let units = attr_string(&var, "units")
        .ok_or_else(|| ReanalysisError::MissingTimeUnits(path.to_path_buf()))?;
    let (unit_seconds, epoch) = parse_time_units(&units)?;
    Ok(raw
        .iter()
        .map(|value| epoch + TimeDelta::seconds((value * unit_seconds).round() as i64))
        .collect())
}

/// Parses a CF time `units` attribute like `hours since 1900-01-01 00:00:00.0`
/// into seconds-per-unit and the epoch.
fn parse_time_units(units: &str) -> Result<(f64, NaiveDateTime), ReanalysisError> {
    let (unit, epoch_text) = units
        .split_once(" since ")
        .ok_or_else(|| ReanalysisError::TimeUnits(units.to_string()))?;
    let unit_seconds = match unit.trim() {
        "seconds" | "second" => 1.0,
        "hours" | "hour" => 3600.0,
        "days" | "day" => 86400.0,
        _ => return Err(ReanalysisError::TimeUnits(units.to_string())),
    };
    let epoch_text = epoch_text.trim();
    let epoch = NaiveDateTime::parse_from_str(epoch_text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(epoch_text, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(epoch_text, "%Y-%m-%d")
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| ReanalysisError::TimeUnits(units.to_string()))?;
    Ok((unit_seconds, epoch))
}

fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        _ => None,
    }
}

fn attr_string(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
