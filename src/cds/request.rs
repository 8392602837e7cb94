//! Construction of the request body sent to the CDS retrieval endpoint.
//!
//! All data comes from the "ERA5 hourly data on single levels from 1959 to
//! present" dataset. A request selects the four variables the daily summary is
//! built from, eight 3-hourly times per day, and the one grid cell enclosing
//! the municipality.

use crate::grid::area::Area;
use crate::reanalysis::date_selection::DateSelection;
use serde::Serialize;
use std::fmt;

/// Dataset identifier of the ERA5 single-level reanalysis.
pub const REANALYSIS_DATASET: &str = "reanalysis-era5-single-levels";

/// The 3-hourly sampling used for daily aggregation.
pub const SYNOPTIC_TIMES: [&str; 8] = [
    "00:00", "03:00", "06:00", "09:00", "12:00", "15:00", "18:00", "21:00",
];

/// The ERA5 variables retrieved for the daily summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Era5Variable {
    /// 2 m air temperature (K).
    Temperature2m,
    /// Total precipitation (m).
    TotalPrecipitation,
    /// 2 m dewpoint temperature (K); combined with [`Era5Variable::Temperature2m`]
    /// to derive relative humidity.
    Dewpoint2m,
    /// Mean sea level pressure (Pa).
    MeanSeaLevelPressure,
}

impl Era5Variable {
    pub const ALL: [Era5Variable; 4] = [
        Era5Variable::Temperature2m,
        Era5Variable::TotalPrecipitation,
        Era5Variable::Dewpoint2m,
        Era5Variable::MeanSeaLevelPressure,
    ];

    /// Name used in the request body.
    pub fn api_name(&self) -> &'static str {
        match self {
            Era5Variable::Temperature2m => "2m_temperature",
            Era5Variable::TotalPrecipitation => "total_precipitation",
            Era5Variable::Dewpoint2m => "2m_dewpoint_temperature",
            Era5Variable::MeanSeaLevelPressure => "mean_sea_level_pressure",
        }
    }

    /// Variable name inside the downloaded NetCDF file.
    pub fn short_name(&self) -> &'static str {
        match self {
            Era5Variable::Temperature2m => "t2m",
            Era5Variable::TotalPrecipitation => "tp",
            Era5Variable::Dewpoint2m => "d2m",
            Era5Variable::MeanSeaLevelPressure => "msl",
        }
    }
}

impl fmt::Display for Era5Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

/// The JSON body POSTed to `{api}/resources/{dataset}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalRequest {
    pub product_type: String,
    pub variable: Vec<String>,
    pub year: Vec<String>,
    pub month: Vec<String>,
    pub day: Vec<String>,
    pub time: Vec<String>,
    /// `[north, west, south, east]`, the CDS extent ordering.
    pub area: [f64; 4],
    pub format: String,
}

impl RetrievalRequest {
    /// Builds the reanalysis request for one grid cell and date selection.
    ///
    /// The year/month/day selectors are cross-producted by the CDS server, so
    /// a range crossing a month boundary selects some days outside the range;
    /// those rows are dropped again at aggregation time by their date.
    pub fn reanalysis(selection: &DateSelection, area: Area) -> Self {
        Self {
            product_type: "reanalysis".to_string(),
            variable: Era5Variable::ALL
                .iter()
                .map(|v| v.api_name().to_string())
                .collect(),
            year: selection.years(),
            month: selection.months(),
            day: selection.days(),
            time: SYNOPTIC_TIMES.iter().map(|t| t.to_string()).collect(),
            area: area.to_request_extent(),
            format: "netcdf".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Grid, LatLon};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn builds_the_reanalysis_request_body() {
        let selection = DateSelection::range(
            NaiveDate::from_ymd_opt(2022, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 10, 4).unwrap(),
        )
        .unwrap();
        // Rio de Janeiro's enclosing cell.
        let area = Grid::era5().resolve_area(LatLon(-22.9, -43.2)).unwrap();

        let request = RetrievalRequest::reanalysis(&selection, area);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "product_type": "reanalysis",
                "variable": [
                    "2m_temperature",
                    "total_precipitation",
                    "2m_dewpoint_temperature",
                    "mean_sea_level_pressure",
                ],
                "year": ["2022"],
                "month": ["10"],
                "day": ["01", "02", "03", "04"],
                "time": [
                    "00:00", "03:00", "06:00", "09:00",
                    "12:00", "15:00", "18:00", "21:00",
                ],
                "area": [-22.75, -43.25, -23.0, -43.0],
                "format": "netcdf",
            })
        );
    }

    #[test]
    fn variable_names_match_the_dataset() {
        for variable in Era5Variable::ALL {
            assert!(!variable.api_name().is_empty());
            assert!(variable.short_name().len() <= 3);
        }
        assert_eq!(Era5Variable::Temperature2m.to_string(), "2m_temperature");
    }
}
