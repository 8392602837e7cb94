//! The Brazilian municipality reference record, as stored in `municipios.json`,
//! plus the `rstar` implementations that allow spatial indexing of the dataset.

use crate::LatLon;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// A Brazilian municipality and its reference coordinate.
///
/// Geocodes follow the seven-digit IBGE numbering (e.g. `3304557` for
/// Rio de Janeiro). The coordinate is the municipality's reference point in
/// the dataset, not a centroid of its administrative area.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Municipality {
    /// IBGE geocode.
    #[serde(rename = "geocodigo")]
    pub geocode: u32,
    /// Municipality name (e.g. "Rio de Janeiro").
    #[serde(rename = "municipio")]
    pub name: String,
    /// Two-letter federative unit code (e.g. "RJ").
    pub uf: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Municipality {
    pub fn location(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }
}

impl RTreeObject for Municipality {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.latitude, self.longitude])
    }
}

impl PointDistance for Municipality {
    /// Squared Euclidean distance in degree space. Good enough for R-tree
    /// candidate ordering; the final ranking uses Haversine distance.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.latitude - point[0];
        let dy = self.longitude - point[1];
        dx * dx + dy * dy
    }
}
