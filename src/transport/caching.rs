use std::sync::Arc;

use crate::cache::{Cache, InMemoryCache};
use crate::http::{Method, Request};
use crate::io::{Response, Transport};
use crate::transport::Flush;
use crate::{log_debug, log_info, log_warn, Result};

/// Caches GET responses verbatim, keyed by the full request.
///
/// Every request label is matched against the flush pattern first; a match
/// clears the cache, whatever the method. This lets write requests such as
/// `PUT /save/1`, or a write-style `GET /save/1`, bust stale reads. Server
/// errors are returned but not stored.
///
/// Decorators built over the same `InMemoryCache` handle share entries and
/// invalidation.
pub struct CachingTransport<T> {
    inner: T,
    cache: Arc<InMemoryCache<Request>>,
    flush: Flush,
}

impl<T> CachingTransport<T> {
    pub fn new(inner: T) -> Self {
        CachingTransport {
            inner,
            cache: Arc::new(InMemoryCache::new()),
            flush: Flush::never(),
        }
    }

    pub fn with_flush(inner: T, flush: &str) -> Result<Self> {
        Ok(CachingTransport {
            flush: Flush::new(flush)?,
            ..CachingTransport::new(inner)
        })
    }

    /// Shares `cache` with every other decorator built over it.
    pub fn with_cache(self, cache: Arc<InMemoryCache<Request>>) -> Self {
        CachingTransport { cache, ..self }
    }

    pub fn cache(&self) -> &Arc<InMemoryCache<Request>> {
        &self.cache
    }

    pub fn invalidate(&self) -> Result<()> {
        self.cache.invalidate()
    }
}

impl<T: Transport> Transport for CachingTransport<T> {
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
        if let Some(response) = self.cache.get(request)? {
            log_debug!("Cache hit for {}", label);
            return Ok(response);
        }
        log_debug!("Cache miss for {}", label);
        let response = self.inner.send(request)?;
        if !response.is_server_error() {
            self.cache.set(request, &response)?;
        }
        Ok(response)
    }
}
