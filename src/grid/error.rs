use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("coordinate is not finite: ({lat}, {lon})")]
    NotFinite { lat: f64, lon: f64 },

    #[error("latitude {value} is outside the grid range [{min}, {max}]")]
    LatitudeOutOfRange { value: f64, min: f64, max: f64 },

    #[error("longitude {value} is outside the grid range [{min}, {max}] after normalization")]
    LongitudeOutOfRange { value: f64, min: f64, max: f64 },

    #[error("grid step must be positive and divide both axis spans, got {0}")]
    InvalidStep(f64),
}
