//! Resolves a geographical point to the enclosing cell of the fixed-step
//! ERA5 global grid.
//!
//! The CDS API retrieves data for a rectangular extent. For a single
//! municipality we want the smallest such extent: the one grid cell whose four
//! corners surround the municipality's reference coordinate. [`Grid::resolve_area`]
//! computes that cell in closed form from the axis origin and step.
//!
//! Convention: both axes are modelled ascending. A coordinate that lies exactly
//! on a grid line snaps to the cell where that grid value is the *south* (or
//! *west*) edge; on the top axis boundary it snaps to the cell below instead,
//! so every finite in-range input resolves to exactly one cell.

use crate::grid::error::GridError;
use crate::LatLon;

/// Grid spacing of the `reanalysis-era5-single-levels` dataset, in degrees.
pub const ERA5_GRID_STEP: f64 = 0.25;

/// A single grid cell, identified by its four edge coordinates.
///
/// Invariants (guaranteed by [`Grid::resolve_area`]): `north == south + step`,
/// `east == west + step`, and all four values are members of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Area {
    /// Edge ordering expected by the CDS `area` request field.
    pub fn to_request_extent(&self) -> [f64; 4] {
        [self.north, self.west, self.south, self.east]
    }

    /// Whether the (normalized) point lies inside or on the edges of this cell.
    pub fn contains(&self, point: LatLon) -> bool {
        let lon = normalize_longitude(point.1);
        self.south <= point.0 && point.0 <= self.north && self.west <= lon && lon <= self.east
    }
}

/// One coordinate axis: `len + 1` grid lines at `min + i * step`, `i in 0..=len`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Axis {
    min: f64,
    max: f64,
    step: f64,
}

impl Axis {
    fn new(min: f64, max: f64, step: f64) -> Result<Self, GridError> {
        let span = max - min;
        let cells = span / step;
        if !(step > 0.0) || (cells.round() - cells).abs() > 1e-9 {
            return Err(GridError::InvalidStep(step));
        }
        Ok(Self { min, max, step })
    }

    fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Lower and upper grid line of the cell containing `value`.
    ///
    /// Assumes `value` is within `[min, max]`. On-grid values become the lower
    /// edge, except `max` itself which falls back to the topmost cell.
    fn cell(&self, value: f64) -> (f64, f64) {
        let mut index = ((value - self.min) / self.step).floor();
        let last = ((self.max - self.min) / self.step).round() - 1.0;
        if index > last {
            index = last;
        }
        let lower = self.min + index * self.step;
        (lower, lower + self.step)
    }
}

/// The fixed-resolution global coordinate grid of the ERA5 dataset.
///
/// Immutable once constructed; pass it (or [`crate::AdClima`], which owns one)
/// to whatever needs cell lookups.
///
/// # Examples
///
/// ```
/// use adclima::{Grid, LatLon};
///
/// let grid = Grid::era5();
/// // Rio de Janeiro
/// let area = grid.resolve_area(LatLon(-22.9, -43.2)).unwrap();
/// assert_eq!(area.north, -22.75);
/// assert_eq!(area.south, -23.0);
/// assert_eq!(area.west, -43.25);
/// assert_eq!(area.east, -43.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    lat: Axis,
    lon: Axis,
}

impl Grid {
    /// The 0.25° grid used by `reanalysis-era5-single-levels`.
    pub fn era5() -> Self {
        Self {
            lat: Axis {
                min: -90.0,
                max: 90.0,
                step: ERA5_GRID_STEP,
            },
            lon: Axis {
                min: -180.0,
                max: 180.0,
                step: ERA5_GRID_STEP,
            },
        }
    }

    /// A global grid with a custom spacing (e.g. 0.5° for ERA5 pressure levels).
    pub fn with_step(step: f64) -> Result<Self, GridError> {
        Ok(Self {
            lat: Axis::new(-90.0, 90.0, step)?,
            lon: Axis::new(-180.0, 180.0, step)?,
        })
    }

    pub fn step(&self) -> f64 {
        self.lat.step
    }

    /// Finds the grid cell enclosing `point` and returns its four edges.
    ///
    /// The longitude is normalized into `(-180, 180]` before matching.
    ///
    /// # Errors
    ///
    /// [`GridError::NotFinite`] for NaN/infinite input and
    /// [`GridError::LatitudeOutOfRange`] / [`GridError::LongitudeOutOfRange`]
    /// for coordinates off the grid.
    pub fn resolve_area(&self, point: LatLon) -> Result<Area, GridError> {
        let LatLon(lat, lon) = point;
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GridError::NotFinite { lat, lon });
        }
        let lon = normalize_longitude(lon);
        if !self.lat.contains(lat) {
            return Err(GridError::LatitudeOutOfRange {
                value: lat,
                min: self.lat.min,
                max: self.lat.max,
            });
        }
        if !self.lon.contains(lon) {
            return Err(GridError::LongitudeOutOfRange {
                value: lon,
                min: self.lon.min,
                max: self.lon.max,
            });
        }
        let (south, north) = self.lat.cell(lat);
        let (west, east) = self.lon.cell(lon);
        Ok(Area {
            north,
            south,
            east,
            west,
        })
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::era5()
    }
}

/// Maps a longitude in `[0, 360)` convention into `(-180, 180]`.
///
/// Idempotent: values already in `(-180, 180]` pass through unchanged.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::era5()
    }

    fn assert_cell(area: &Area, point: LatLon, step: f64) {
        assert!(area.north > area.south);
        assert!((area.north - area.south - step).abs() < 1e-12);
        assert!((area.east - area.west - step).abs() < 1e-12);
        assert!(area.contains(point), "{area:?} does not contain {point:?}");
        for edge in [area.north, area.south, area.east, area.west] {
            let steps = edge / step;
            assert!(
                (steps - steps.round()).abs() < 1e-9,
                "{edge} is not a grid value"
            );
        }
    }

    #[test]
    fn resolves_rio_de_janeiro() {
        let area = grid().resolve_area(LatLon(-22.9, -43.2)).unwrap();
        assert_eq!(area.north, -22.75);
        assert_eq!(area.south, -23.0);
        assert_eq!(area.west, -43.25);
        assert_eq!(area.east, -43.0);
    }

    #[test]
    fn resolves_points_in_every_quadrant_of_a_cell() {
        // Four points around the grid intersection at (10.0, 20.0).
        let cases = [
            LatLon(10.1, 20.1),
            LatLon(10.1, 19.9),
            LatLon(9.9, 20.1),
            LatLon(9.9, 19.9),
        ];
        for point in cases {
            let area = grid().resolve_area(point).unwrap();
            assert_cell(&area, point, ERA5_GRID_STEP);
        }
        // Northern-hemisphere pair share the latitude band, southern pair too.
        let ne = grid().resolve_area(cases[0]).unwrap();
        let nw = grid().resolve_area(cases[1]).unwrap();
        assert_eq!(ne.north, nw.north);
        assert_eq!(ne.south, 10.0);
        assert_eq!(nw.east, 20.0);
        assert_eq!(ne.west, 20.0);
    }

    #[test]
    fn on_grid_latitude_snaps_to_south_edge() {
        let area = grid().resolve_area(LatLon(-23.0, -43.2)).unwrap();
        assert_eq!(area.south, -23.0);
        assert_eq!(area.north, -22.75);
    }

    #[test]
    fn on_grid_longitude_snaps_to_west_edge() {
        let area = grid().resolve_area(LatLon(-22.9, -43.25)).unwrap();
        assert_eq!(area.west, -43.25);
        assert_eq!(area.east, -43.0);
    }

    #[test]
    fn grid_intersection_snaps_south_west() {
        let area = grid().resolve_area(LatLon(0.0, 0.0)).unwrap();
        assert_eq!(area.south, 0.0);
        assert_eq!(area.north, 0.25);
        assert_eq!(area.west, 0.0);
        assert_eq!(area.east, 0.25);
    }

    #[test]
    fn poles_snap_into_the_grid() {
        let north_pole = grid().resolve_area(LatLon(90.0, 10.0)).unwrap();
        assert_eq!(north_pole.north, 90.0);
        assert_eq!(north_pole.south, 89.75);

        let south_pole = grid().resolve_area(LatLon(-90.0, 10.0)).unwrap();
        assert_eq!(south_pole.south, -90.0);
        assert_eq!(south_pole.north, -89.75);
    }

    #[test]
    fn antimeridian_stays_on_the_grid() {
        let east_edge = grid().resolve_area(LatLon(0.1, 180.0)).unwrap();
        assert_eq!(east_edge.east, 180.0);
        assert_eq!(east_edge.west, 179.75);

        let west_edge = grid().resolve_area(LatLon(0.1, -180.0)).unwrap();
        assert_eq!(west_edge.west, -180.0);
        assert_eq!(west_edge.east, -179.75);
    }

    #[test]
    fn longitudes_above_180_are_normalized() {
        // 316.8°E is -43.2° in the grid's convention.
        let wrapped = grid().resolve_area(LatLon(-22.9, 316.8)).unwrap();
        let direct = grid().resolve_area(LatLon(-22.9, -43.2)).unwrap();
        assert_eq!(wrapped, direct);
    }

    #[test]
    fn normalization_is_idempotent() {
        for lon in [-179.9, -43.2, 0.0, 13.4, 180.0] {
            assert_eq!(normalize_longitude(lon), lon);
            assert_eq!(normalize_longitude(normalize_longitude(lon + 360.0)), lon);
        }
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(matches!(
            grid().resolve_area(LatLon(90.5, 0.0)),
            Err(GridError::LatitudeOutOfRange { .. })
        ));
        assert!(matches!(
            grid().resolve_area(LatLon(0.0, -181.0)),
            Err(GridError::LongitudeOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert!(matches!(
            grid().resolve_area(LatLon(f64::NAN, 0.0)),
            Err(GridError::NotFinite { .. })
        ));
        assert!(matches!(
            grid().resolve_area(LatLon(0.0, f64::INFINITY)),
            Err(GridError::NotFinite { .. })
        ));
    }

    #[test]
    fn custom_step_grid() {
        let grid = Grid::with_step(0.5).unwrap();
        let area = grid.resolve_area(LatLon(-22.9, -43.2)).unwrap();
        assert_cell(&area, LatLon(-22.9, -43.2), 0.5);
        assert_eq!(area.south, -23.0);
        assert_eq!(area.north, -22.5);
    }

    #[test]
    fn rejects_invalid_step() {
        assert!(matches!(
            Grid::with_step(0.0),
            Err(GridError::InvalidStep(_))
        ));
        assert!(matches!(
            Grid::with_step(-0.25),
            Err(GridError::InvalidStep(_))
        ));
        assert!(matches!(
            Grid::with_step(0.7),
            Err(GridError::InvalidStep(_))
        ));
    }

    #[test]
    fn request_extent_ordering() {
        let area = grid().resolve_area(LatLon(-22.9, -43.2)).unwrap();
        assert_eq!(area.to_request_extent(), [-22.75, -43.25, -23.0, -43.0]);
    }
}
