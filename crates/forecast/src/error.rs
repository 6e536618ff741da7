use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("prediction requires a sequence of at least {required} entries, got {actual}")]
    InsufficientSequence { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
