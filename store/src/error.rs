use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("store backend failure: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
