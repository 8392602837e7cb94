//! Loads the IBGE municipality reference dataset and answers geocode, name and
//! nearest-point lookups against it.
//!
//! The dataset is fetched once from the project repository (or read from a
//! local file) and cached as bincode in the cache directory, so subsequent
//! constructions are a single file read.

use crate::municipalities::error::LocateMunicipalityError;
use crate::municipalities::municipality::Municipality;
use crate::LatLon;
use bincode::config::{Configuration, Fixint, LittleEndian};
use haversine::{distance, Location as HaversineLocation, Units};
use log::info;
use reqwest::Client;
use rstar::RTree;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

const DATA_URL: &str =
    "https://raw.githubusercontent.com/AlertaDengue/ADClima/main/data/municipios.json";
const BINCODE_CACHE_FILE_NAME: &str = "municipios.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Index over the municipality reference dataset.
#[derive(Debug, Clone)]
pub struct MunicipalityLocator {
    rtree: RTree<Municipality>,
    by_geocode: HashMap<u32, Municipality>,
    // Municipality names repeat across states, so the name index is
    // multi-valued.
    by_name: HashMap<String, Vec<Municipality>>,
}

impl MunicipalityLocator {
    /// Builds the locator, fetching the dataset on the first run and reading
    /// the bincode cache afterwards.
    pub async fn new(cache_dir: &Path) -> Result<Self, LocateMunicipalityError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        let municipalities: Vec<Municipality>;

        if cache_file.exists() {
            let path_clone = cache_file.clone();
            municipalities =
                tokio::task::spawn_blocking(move || Self::get_cached_municipalities(&path_clone))
                    .await??;
        } else {
            info!("Municipality cache not found. Fetching from {}", DATA_URL);
            municipalities = Self::fetch_municipalities().await?;
            Self::cache_municipalities(municipalities.clone(), &cache_file).await?;
        }

        Ok(Self::from_records(municipalities))
    }

    /// Builds the locator from a local `municipios.json` file.
    pub async fn from_json_path(path: &Path) -> Result<Self, LocateMunicipalityError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LocateMunicipalityError::FileRead(path.to_path_buf(), e))?;
        Self::from_json_slice(&bytes)
    }

    /// Builds the locator from raw `municipios.json` bytes.
    ///
    /// The original dataset carries a UTF-8 BOM, which `serde_json` rejects,
    /// so it is stripped here before parsing.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, LocateMunicipalityError> {
        let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
        let municipalities = serde_json::from_slice::<Vec<Municipality>>(bytes)?;
        Ok(Self::from_records(municipalities))
    }

    fn from_records(municipalities: Vec<Municipality>) -> Self {
        let by_geocode = municipalities
            .iter()
            .map(|m| (m.geocode, m.clone()))
            .collect();
        let mut by_name: HashMap<String, Vec<Municipality>> = HashMap::new();
        for municipality in &municipalities {
            by_name
                .entry(municipality.name.to_lowercase())
                .or_default()
                .push(municipality.clone());
        }
        let rtree = RTree::bulk_load(municipalities);
        Self {
            rtree,
            by_geocode,
            by_name,
        }
    }

    fn get_cached_municipalities(
        cache_path: &Path,
    ) -> Result<Vec<Municipality>, LocateMunicipalityError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| LocateMunicipalityError::CacheRead(cache_path.to_path_buf(), e))?;
        let (decoded, _) =
            bincode::serde::decode_from_slice::<Vec<Municipality>, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| {
                    LocateMunicipalityError::CacheDecode(cache_path.to_path_buf(), Box::from(e))
                })?;
        Ok(decoded)
    }

    async fn fetch_municipalities() -> Result<Vec<Municipality>, LocateMunicipalityError> {
        let client = Client::new();
        let response = client
            .get(DATA_URL)
            .send()
            .await
            .map_err(|e| LocateMunicipalityError::NetworkRequest(DATA_URL.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                if let Some(status) = e.status() {
                    return Err(LocateMunicipalityError::HttpStatus {
                        url: DATA_URL.to_string(),
                        status,
                        source: e,
                    });
                } else {
                    return Err(LocateMunicipalityError::NetworkRequest(
                        DATA_URL.to_string(),
                        e,
                    ));
                }
            }
        };
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LocateMunicipalityError::NetworkRequest(DATA_URL.to_string(), e))?;
        let municipalities = tokio::task::spawn_blocking(move || {
            let body = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(&bytes);
            serde_json::from_slice::<Vec<Municipality>>(body)
                .map_err(LocateMunicipalityError::from)
        })
        .await??;
        info!("Parsed {} municipalities from JSON", municipalities.len());
        Ok(municipalities)
    }

    async fn cache_municipalities(
        municipalities: Vec<Municipality>,
        cache_path: &Path,
    ) -> Result<(), LocateMunicipalityError> {
        let bincode_data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(municipalities, BINCODE_CONFIG)
                .map_err(|e| LocateMunicipalityError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(&cache_path, &bincode_data)
            .await
            .map_err(|e| LocateMunicipalityError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Cached {} bytes of municipality data at {}",
            bincode_data.len(),
            cache_path.display()
        );
        Ok(())
    }

    /// Looks a municipality up by its IBGE geocode.
    pub fn by_geocode(&self, geocode: u32) -> Result<&Municipality, LocateMunicipalityError> {
        self.by_geocode
            .get(&geocode)
            .ok_or(LocateMunicipalityError::GeocodeNotFound(geocode))
    }

    /// Looks a municipality up by name, case-insensitively.
    ///
    /// Fails with [`LocateMunicipalityError::AmbiguousName`] when the name
    /// exists in more than one state; use [`MunicipalityLocator::by_name_in_uf`]
    /// to disambiguate.
    pub fn by_name(&self, name: &str) -> Result<&Municipality, LocateMunicipalityError> {
        let matches = self
            .by_name
            .get(&name.to_lowercase())
            .ok_or_else(|| LocateMunicipalityError::NameNotFound(name.to_string()))?;
        match matches.as_slice() {
            [municipality] => Ok(municipality),
            _ => Err(LocateMunicipalityError::AmbiguousName {
                name: name.to_string(),
                ufs: matches.iter().map(|m| m.uf.clone()).collect(),
            }),
        }
    }

    /// Looks a municipality up by name within one federative unit, both
    /// case-insensitively.
    pub fn by_name_in_uf(
        &self,
        name: &str,
        uf: &str,
    ) -> Result<&Municipality, LocateMunicipalityError> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|matches| matches.iter().find(|m| m.uf.eq_ignore_ascii_case(uf)))
            .ok_or_else(|| LocateMunicipalityError::NameNotFoundInUf {
                name: name.to_string(),
                uf: uf.to_string(),
            })
    }

    /// Finds up to `limit` municipalities within `max_distance_km` of the
    /// query point, closest first, paired with their Haversine distance.
    pub fn nearest(
        &self,
        location: LatLon,
        limit: usize,
        max_distance_km: f64,
    ) -> Vec<(Municipality, f64)> {
        if limit == 0 {
            return vec![];
        }
        let query_point = [location.0, location.1];

        // Degree-space nearest neighbors are not exactly Haversine-nearest,
        // so take a margin of candidates before the precise ranking.
        let candidate_limit = (limit * 2).max(20);

        let mut with_distance: Vec<(Municipality, f64)> = self
            .rtree
            .nearest_neighbor_iter(&query_point)
            .take(candidate_limit)
            .filter_map(|municipality| {
                let dist_km = distance(
                    HaversineLocation {
                        latitude: location.0,
                        longitude: location.1,
                    },
                    HaversineLocation {
                        latitude: municipality.latitude,
                        longitude: municipality.longitude,
                    },
                    Units::Kilometers,
                );
                if dist_km <= max_distance_km {
                    Some((municipality.to_owned(), dist_km))
                } else {
                    None
                }
            })
            .collect();

        with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        with_distance.truncate(limit);
        with_distance
    }
}
