mod adclima;
mod cds;
mod error;
mod grid;
mod municipalities;
mod reanalysis;
mod utils;

pub use adclima::*;
pub use error::AdClimaError;

pub use cds::client::{ApiStatus, CdsClient};
pub use cds::credentials::{CdsCredentials, CredentialProvider, DEFAULT_API_URL};
pub use cds::request::{Era5Variable, RetrievalRequest, REANALYSIS_DATASET, SYNOPTIC_TIMES};

pub use grid::area::{normalize_longitude, Area, Grid, ERA5_GRID_STEP};

pub use municipalities::locate::MunicipalityLocator;
pub use municipalities::municipality::Municipality;

pub use reanalysis::aggregate::{daily_summary, read_series, summarize_file, VariableSeries};
pub use reanalysis::convert;
pub use reanalysis::date_selection::{DateSelection, MAX_RANGE_DAYS, UPDATE_DELAY_DAYS};

pub use cds::error::{CdsError, CredentialError};
pub use grid::error::GridError;
pub use municipalities::error::LocateMunicipalityError;
pub use reanalysis::error::{DateSelectionError, ReanalysisError};
