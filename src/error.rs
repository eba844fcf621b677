use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(wrs::validation))]
    ValidationError(String),

    #[error(
        "Gateway error: {message}{}",
        .http_status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
    )]
    #[diagnostic(
        code(wrs::gateway),
        help("the payment was not recorded; retry by initializing a new payment")
    )]
    GatewayError {
        message: String,
        http_status: Option<u16>,
    },

    #[error("Conflict: {0}")]
    #[diagnostic(code(wrs::conflict))]
    ConflictError(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(wrs::not_found))]
    NotFoundError(String),

    #[error("Forbidden: {0}")]
    #[diagnostic(code(wrs::forbidden))]
    ForbiddenError(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(wrs::io))]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(wrs::csv))]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(wrs::serialization))]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(wrs::internal))]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn gateway(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self::GatewayError {
            message: message.into(),
            http_status,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
