use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Viewer responded with status {0}")]
    Status(u16),

    #[error("Request timeout exceeded")]
    Timeout,

    #[error("Invalid markup: {0}")]
    InvalidMarkup(String),

    #[error("No async runtime available")]
    NoRuntime,

    #[error("Queue dropped the item before it settled")]
    Dropped,

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
