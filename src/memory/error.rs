use crate::container;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container: {0}")]
    Container(#[from] container::Error),
    #[error("invalid stats record at position {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: container::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
