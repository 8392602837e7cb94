use crate::cds::error::{CdsError, CredentialError};
use crate::grid::error::GridError;
use crate::municipalities::error::LocateMunicipalityError;
use crate::reanalysis::error::{DateSelectionError, ReanalysisError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdClimaError {
    #[error(transparent)]
    Cds(#[from] CdsError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    LocateMunicipality(#[from] LocateMunicipalityError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    DateSelection(#[from] DateSelectionError),

    #[error(transparent)]
    Reanalysis(#[from] ReanalysisError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
