use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid backend response: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Please select a broker")]
    MissingBroker,

    #[error("This strategy requires a Telegram chat")]
    TelegramRequired,

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("This strategy is already deployed. Edit it from the portfolio instead.")]
    AlreadyDeployed,

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Broker {0} does not belong to this account")]
    UnknownBroker(String),

    #[error("Telegram chat {0} does not belong to this account")]
    UnknownTelegramChat(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Name, Platform, and API Key are required")]
    MissingBrokerFields,

    #[error("Bot Token and Chat ID are required")]
    MissingTelegramFields,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
