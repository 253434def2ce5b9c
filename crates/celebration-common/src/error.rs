use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// The store could not be opened or introspected. Fatal during boot.
    #[error("store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("malformed dump: {0}")]
    DumpParse(String),

    #[error("dump error: {0}")]
    Dump(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}
