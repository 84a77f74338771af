use thiserror::Error;


/// Failures that callers branch on. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub(crate) enum SieveError {
    #[error("The page has not been navigated after {attempts} attempts")]
    NotNavigated { attempts: u32 },

    #[error("Could not advance to page {page} after {attempts} attempts")]
    PageAdvance { page: u32, attempts: u32 },

    #[error("Job detail endpoint answered with status {0:?}")]
    DetailStatus(String),

    #[error("No element matches {0}")]
    MissingElement(String),
}
