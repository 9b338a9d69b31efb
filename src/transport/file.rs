use std::path::PathBuf;

use crate::cache::{Cache, FileCache};
use crate::http::{Method, Request};
use crate::io::{Response, Transport};
use crate::transport::Flush;
use crate::{log_debug, log_info, log_warn, Result};

/// Caches GET responses on disk, keyed by the request label
/// (`"GET /path?query"`). Entries outlive the process, so a new transport
/// over the same directory serves what an earlier one stored.
///
/// Only the label is used as key: requests differing in headers or host
/// share one entry. Bodies that are not UTF-8 text are returned but never
/// written.
pub struct FileCachingTransport<T> {
    inner: T,
    cache: FileCache,
    flush: Flush,
}

impl<T> FileCachingTransport<T> {
    pub fn new<P: Into<PathBuf>>(inner: T, directory: P) -> Self {
        FileCachingTransport {
            inner,
            cache: FileCache::new(directory),
            flush: Flush::never(),
        }
    }

    /// Caches under a process-unique directory in the system temp dir.
    pub fn in_temp_dir(inner: T) -> Self {
        FileCachingTransport {
            inner,
            cache: FileCache::default(),
            flush: Flush::never(),
        }
    }

    pub fn with_flush(self, flush: &str) -> Result<Self> {
        Ok(FileCachingTransport {
            flush: Flush::new(flush)?,
            ..self
        })
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Removes the cache directory and everything under it.
    pub fn invalidate(&self) -> Result<()> {
        self.cache.invalidate()
    }
}

impl<T: Transport> Transport for FileCachingTransport<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        let label = match request.label() {
            Ok(label) => label,
            Err(err) if request.method() != Method::GET => {
                log_warn!("No flush check for {}: {}", request.uri(), err);
                return self.inner.send(request);
            }
            Err(err) => return Err(err),
        };
        if self.flush.matches(&label) {
            log_info!("{} matches {}, flushing cache", label, self.flush.as_str());
            self.cache.invalidate()?;
        }
        if request.method() != Method::GET {
            return self.inner.send(request);
        }
        if let Some(response) = self.cache.get(&label)? {
            log_debug!("Cache hit for {}", label);
            return Ok(response);
        }
        log_debug!("Cache miss for {}", label);
        let response = self.inner.send(request)?;
        if response.is_server_error() {
            return Ok(response);
        }
        if response.text().is_err() {
            log_warn!("Not caching {}: body is not UTF-8 text", label);
            return Ok(response);
        }
        self.cache.set(&label, &response)?;
        Ok(response)
    }
}
