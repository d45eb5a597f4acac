use store::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("observer {0} is already registered")]
    DuplicateObserver(String),

    #[error("observer {0} is not registered")]
    ObserverNotFound(String),

    #[error("invalid symbol {0:?}")]
    InvalidSymbol(String),

    #[error("invalid price {price} for {symbol}: must be finite and non-negative")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("invalid threshold {0}: must be a finite, non-negative percentage")]
    InvalidThreshold(f64),

    #[error("investor {0} not found")]
    InvestorNotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub type NotifierResult<T> = std::result::Result<T, NotifierError>;
