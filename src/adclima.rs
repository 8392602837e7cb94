//! This module provides the main entry point for retrieving ERA5 reanalysis
//! data for Brazilian municipalities and summarizing it into daily climate
//! indicators.

use crate::cds::client::{ApiStatus, CdsClient};
use crate::cds::credentials::CredentialProvider;
use crate::cds::request::{RetrievalRequest, REANALYSIS_DATASET};
use crate::error::AdClimaError;
use crate::grid::area::Grid;
use crate::municipalities::locate::MunicipalityLocator;
use crate::municipalities::municipality::Municipality;
use crate::reanalysis::aggregate;
use crate::reanalysis::date_selection::DateSelection;
use crate::reanalysis::error::ReanalysisError;
use crate::utils::{ensure_dir_exists, get_data_dir};
use bon::bon;
use chrono::NaiveDate;
use log::info;
use polars::prelude::{DataFrame, LazyFrame, ParquetCompression, ParquetWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second
/// (index 1). Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use adclima::LatLon;
///
/// let rio_de_janeiro = LatLon(-22.9, -43.2);
/// assert_eq!(rio_de_janeiro.0, -22.9); // Latitude
/// assert_eq!(rio_de_janeiro.1, -43.2); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// Where the municipality registry is loaded from.
#[derive(Debug, Clone, Default)]
pub enum MunicipalitySource {
    /// Download the registry on first use and cache it in the data folder.
    #[default]
    Remote,
    /// Load the registry from a local `municipios.json` file.
    JsonFile(PathBuf),
}

/// Configuration for [`AdClima::with_config`].
///
/// `Default` gives the setup [`AdClima::new`] uses: data files under the
/// system cache directory, credentials from `~/.cdsapirc`, the remote
/// municipality registry and the 0.25° ERA5 grid.
#[derive(Debug, Clone)]
pub struct AdClimaConfig {
    /// Directory for downloaded NetCDF files, summary caches and the
    /// municipality registry cache. `None` resolves the system default.
    pub data_folder: Option<PathBuf>,
    pub credentials: CredentialProvider,
    pub municipalities: MunicipalitySource,
    pub grid: Grid,
    /// How often the server-side retrieval task is polled.
    pub poll_interval: Duration,
}

impl Default for AdClimaConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            credentials: CredentialProvider::default(),
            municipalities: MunicipalitySource::default(),
            grid: Grid::era5(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// The main client for retrieving municipal climate data.
///
/// Downloads are cached in the data folder and reused: retrieving the same
/// municipality and date range twice only contacts the API once, and the
/// daily summary keeps a Parquet cache next to each NetCDF file.
///
/// Create an instance with [`AdClima::new()`] for default behavior, or
/// [`AdClima::with_config()`] to control the data folder, credentials or
/// municipality source.
///
/// # Examples
///
/// ```no_run
/// # use adclima::{AdClima, AdClimaError};
/// # async fn run() -> Result<(), AdClimaError> {
/// let client = AdClima::new().await?;
/// let summary = client
///     .daily_summary()
///     .geocode(3304557) // Rio de Janeiro
///     .start("2022-10-01".parse().unwrap())
///     .end("2022-10-04".parse().unwrap())
///     .call()
///     .await?;
/// println!("{summary}");
/// # Ok(())
/// # }
/// ```
pub struct AdClima {
    cds: CdsClient,
    locator: MunicipalityLocator,
    grid: Grid,
    data_folder: PathBuf,
}

#[bon]
impl AdClima {
    /// Creates a client with the default configuration.
    ///
    /// Credentials come from `~/.cdsapirc` and data files go to the system
    /// cache directory (e.g. `~/.cache/adclima` on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`AdClimaError::DataDirResolution`] or
    /// [`AdClimaError::DataDirCreation`] when the data folder is unusable,
    /// [`AdClimaError::Credential`] when `~/.cdsapirc` is missing or invalid,
    /// and [`AdClimaError::LocateMunicipality`] variants when the municipality
    /// registry cannot be loaded.
    pub async fn new() -> Result<Self, AdClimaError> {
        Self::with_config(AdClimaConfig::default()).await
    }

    /// Creates a client from an explicit [`AdClimaConfig`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use adclima::{AdClima, AdClimaConfig, AdClimaError, CredentialProvider};
    /// # use std::path::PathBuf;
    /// # async fn run() -> Result<(), AdClimaError> {
    /// let client = AdClima::with_config(AdClimaConfig {
    ///     data_folder: Some(PathBuf::from("/tmp/adclima")),
    ///     credentials: CredentialProvider::Explicit {
    ///         uid: "153228".to_string(),
    ///         key: "b5e40948-b398-41c2-9a8a-e9c003f4410f".to_string(),
    ///     },
    ///     ..AdClimaConfig::default()
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_config(config: AdClimaConfig) -> Result<Self, AdClimaError> {
        let data_folder = match config.data_folder {
            Some(folder) => folder,
            None => get_data_dir().map_err(AdClimaError::DataDirResolution)?,
        };
        ensure_dir_exists(&data_folder)
            .await
            .map_err(|e| AdClimaError::DataDirCreation(data_folder.clone(), e))?;

        // Resolving may read ~/.cdsapirc or prompt on stdin.
        let provider = config.credentials;
        let credentials = task::spawn_blocking(move || provider.resolve()).await??;

        let locator = match config.municipalities {
            MunicipalitySource::Remote => MunicipalityLocator::new(&data_folder).await?,
            MunicipalitySource::JsonFile(path) => MunicipalityLocator::from_json_path(&path).await?,
        };

        Ok(Self {
            cds: CdsClient::with_poll_interval(credentials, config.poll_interval),
            locator,
            grid: config.grid,
            data_folder,
        })
    }

    /// Checks connectivity and credentials against the API status endpoint.
    pub async fn status(&self) -> Result<ApiStatus, AdClimaError> {
        Ok(self.cds.status().await?)
    }

    /// Looks a municipality up by its IBGE geocode.
    pub fn municipality_by_geocode(&self, geocode: u32) -> Result<&Municipality, AdClimaError> {
        Ok(self.locator.by_geocode(geocode)?)
    }

    /// Looks a municipality up by name, case-insensitively.
    ///
    /// Names that exist in more than one state are an error; use
    /// [`AdClima::municipality_by_name_in_uf`] for those.
    pub fn municipality_by_name(&self, name: &str) -> Result<&Municipality, AdClimaError> {
        Ok(self.locator.by_name(name)?)
    }

    /// Looks a municipality up by name within one federative unit.
    pub fn municipality_by_name_in_uf(
        &self,
        name: &str,
        uf: &str,
    ) -> Result<&Municipality, AdClimaError> {
        Ok(self.locator.by_name_in_uf(name, uf)?)
    }

    /// Finds the municipalities closest to a location, with their Haversine
    /// distance in kilometers, closest first.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** The search center.
    /// * `.limit(usize)`: Optional. Maximum number of results. Defaults to `5`.
    /// * `.max_distance_km(f64)`: Optional. Search radius. Defaults to `300.0`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use adclima::{AdClima, AdClimaError, LatLon};
    /// # async fn run() -> Result<(), AdClimaError> {
    /// let client = AdClima::new().await?;
    /// let nearby = client
    ///     .nearest_municipalities()
    ///     .location(LatLon(-22.9, -43.2))
    ///     .limit(3)
    ///     .call();
    /// for (municipality, distance_km) in nearby {
    ///     println!("{} ({:.1} km)", municipality.name, distance_km);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn nearest_municipalities(
        &self,
        location: LatLon,
        limit: Option<usize>,
        max_distance_km: Option<f64>,
    ) -> Vec<(Municipality, f64)> {
        let limit = limit.unwrap_or(5);
        let max_distance_km = max_distance_km.unwrap_or(300.0);
        self.locator.nearest(location, limit, max_distance_km)
    }

    /// Downloads the raw ERA5 NetCDF file for a municipality and date range,
    /// returning the path of the downloaded file.
    ///
    /// The retrieval covers the single grid cell around the municipality's
    /// coordinate. If the file is already in the data folder the download is
    /// skipped.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.geocode(u32)`: **Required.** IBGE geocode of the municipality.
    /// * `.start(NaiveDate)`: **Required.** First day of the range.
    /// * `.end(NaiveDate)`: Optional. Last day, inclusive. Defaults to a
    ///   single-day retrieval of `start`.
    ///
    /// # Errors
    ///
    /// Returns [`AdClimaError::DateSelection`] for invalid ranges,
    /// [`AdClimaError::LocateMunicipality`] for unknown geocodes and
    /// [`AdClimaError::Cds`] variants when the retrieval itself fails.
    #[builder]
    pub async fn download(
        &self,
        geocode: u32,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<PathBuf, AdClimaError> {
        let selection = match end {
            Some(end) => DateSelection::range(start, end)?,
            None => DateSelection::single(start)?,
        };
        self.download_selection(geocode, &selection).await
    }

    /// Retrieves a municipality's data and aggregates it into the per-day
    /// min/mean/max summary frame.
    ///
    /// Columns: `geocodigo`, `date`, then `{temp,precip,pressao,umid}` each
    /// as `_min`, `_med` and `_max`, in °C, mm, hPa and percent. The summary
    /// is cached as Parquet next to the NetCDF file.
    ///
    /// This method uses a builder pattern; arguments match [`AdClima::download`].
    #[builder]
    pub async fn daily_summary(
        &self,
        geocode: u32,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<DataFrame, AdClimaError> {
        let selection = match end {
            Some(end) => DateSelection::range(start, end)?,
            None => DateSelection::single(start)?,
        };
        let netcdf_path = self.download_selection(geocode, &selection).await?;
        self.summarize(&netcdf_path, geocode, &selection).await
    }

    async fn download_selection(
        &self,
        geocode: u32,
        selection: &DateSelection,
    ) -> Result<PathBuf, AdClimaError> {
        let municipality = self.locator.by_geocode(geocode)?;
        let area = self.grid.resolve_area(municipality.location())?;

        let target = self
            .data_folder
            .join(format!("{}.nc", selection.file_stem(geocode)));
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            info!("Using previously downloaded {}", target.display());
            return Ok(target);
        }

        let request = RetrievalRequest::reanalysis(selection, area);
        self.cds
            .retrieve(REANALYSIS_DATASET, &request, &target)
            .await?;
        Ok(target)
    }

    async fn summarize(
        &self,
        netcdf_path: &Path,
        geocode: u32,
        selection: &DateSelection,
    ) -> Result<DataFrame, AdClimaError> {
        let parquet_path = netcdf_path.with_extension("parquet");
        if tokio::fs::try_exists(&parquet_path).await.unwrap_or(false) {
            let df = LazyFrame::scan_parquet(&parquet_path, Default::default())
                .map_err(|e| ReanalysisError::ParquetScan(parquet_path.clone(), e))?
                .collect()
                .map_err(ReanalysisError::DataFrame)?;
            return Ok(df);
        }

        let path = netcdf_path.to_path_buf();
        let selection = *selection;
        let df =
            task::spawn_blocking(move || aggregate::summarize_file(&path, geocode, &selection))
                .await??;
        Self::cache_dataframe(df.clone(), &parquet_path).await?;
        info!("Cached daily summary at {}", parquet_path.display());
        Ok(df)
    }

    /// Writes a DataFrame to a Parquet file asynchronously using
    /// spawn_blocking. ParquetWriter needs `&mut df`.
    async fn cache_dataframe(mut df: DataFrame, path: &Path) -> Result<(), AdClimaError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| ReanalysisError::ParquetWriteIo(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| ReanalysisError::ParquetWritePolars(path_buf, e))?;
            Ok::<(), ReanalysisError>(())
        })
        .await??;
        Ok(())
    }
}
