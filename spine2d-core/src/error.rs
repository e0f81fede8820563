use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{name}' for slot '{slot}'")]
    UnknownAttachment { slot: String, name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("invalid animation '{name}': {message}")]
    InvalidAnimation { name: String, message: String },

    #[cfg(feature = "json")]
    #[error("json error: {message}")]
    Json { message: String },
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}
