use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid lease config: {0}")]
    Invalid(String),

    #[error("invalid last-seen value for slot '{slot}': {raw:?}")]
    InvalidTimestamp { slot: String, raw: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
