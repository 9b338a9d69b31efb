use std::fmt::Display;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("HTTP transport error: {0}")]
    HttpTransportError(String),
    #[error("Cache store error: {0}")]
    CacheStoreError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Request build error: {0}")]
    RequestBuildError(String),
    #[error("Time conversion error: {0}")]
    TimeConversionError(String),
}

pub trait AddContext<T, E>: Context<T, E> {
    fn err_context<C: Display + Send + Sync + 'static>(self, msg: C) -> Result<T, anyhow::Error>
    where
        Self: Sized,
    {
        self.with_context(|| msg.to_string())
    }
}

impl<U, T, E> AddContext<T, E> for U where U: Context<T, E> {}

pub fn gen<T: AsRef<str>>(msg: T) -> anyhow::Error {
    anyhow!(msg.as_ref().to_string())
}

/// Wraps any displayable failure of a cache backing store into a
/// `WireError::CacheStoreError`.
pub fn store<E: Display>(err: E) -> anyhow::Error {
    WireError::CacheStoreError(err.to_string()).into()
}
