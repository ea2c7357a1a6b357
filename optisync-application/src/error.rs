use std::time::Duration;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("dispatch exceeded grace period of {0:?}")]
    GraceExceeded(Duration),
}
