#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing container id")]
    MissingContainerID,
    #[error("invalid container id: {0}")]
    InvalidContainerID(String),
}
pub type Result<T> = std::result::Result<T, Error>;
