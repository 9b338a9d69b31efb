use std::sync::Arc;

use crate::cache::{Cache, InMemoryCache};
use crate::http::{Method, Request, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use crate::io::{Response, Transport};
use crate::{log_debug, Result};

/// Pair of headers driving a conditional GET: the validator a server sends
/// with a representation, and the request header that echoes it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    version: String,
    conditional: String,
}

impl Validator {
    pub fn new(version: &str, conditional: &str) -> Self {
        Validator {
            version: version.to_string(),
            conditional: conditional.to_string(),
        }
    }

    /// `ETag` / `If-None-Match`
    pub fn etag() -> Self {
        Validator::new(ETAG, IF_NONE_MATCH)
    }

    /// `Last-Modified` / `If-Modified-Since`
    pub fn last_modified() -> Self {
        Validator::new(LAST_MODIFIED, IF_MODIFIED_SINCE)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn conditional(&self) -> &str {
        &self.conditional
    }
}

/// Revalidates cached GET responses with a conditional request.
///
/// Entries are keyed by the caller's request. When one exists, the request
/// is sent once more carrying the stored validator; a `304 Not Modified`
/// answer is replaced by the cached response, anything else refreshes the
/// cache. Requests where the caller set the conditional header are passed
/// through untouched.
pub struct RevalidatingTransport<T> {
    inner: T,
    validator: Validator,
    cache: Arc<InMemoryCache<Request>>,
}

impl<T> RevalidatingTransport<T> {
    pub fn new(inner: T, validator: Validator) -> Self {
        RevalidatingTransport {
            inner,
            validator,
            cache: Arc::new(InMemoryCache::new()),
        }
    }

    pub fn etag(inner: T) -> Self {
        RevalidatingTransport::new(inner, Validator::etag())
    }

    pub fn last_modified(inner: T) -> Self {
        RevalidatingTransport::new(inner, Validator::last_modified())
    }

    pub fn with_cache(self, cache: Arc<InMemoryCache<Request>>) -> Self {
        RevalidatingTransport { cache, ..self }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn cache(&self) -> &Arc<InMemoryCache<Request>> {
        &self.cache
    }

    pub fn invalidate(&self) -> Result<()> {
        self.cache.invalidate()
    }

    fn update(&self, request: &Request, response: &Response) -> Result<()> {
        if response.is_not_modified() {
            return Ok(());
        }
        if response.headers.contains(self.validator.version()) {
            self.cache.set(request, response)
        } else if response.is_success() {
            // The resource no longer carries a validator, so whatever we
            // held for it cannot be revalidated anymore.
            self.cache.remove(request)
        } else {
            Ok(())
        }
    }
}

impl<T: Transport> Transport for RevalidatingTransport<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        if request.method() != Method::GET
            || request.headers().contains(self.validator.conditional())
        {
            return self.inner.send(request);
        }
        let cached = self.cache.get(request)?;
        let version = cached
            .as_ref()
            .and_then(|cached| cached.header(self.validator.version()));
        let response = match version {
            Some(version) => {
                let conditional = request
                    .clone()
                    .with_header(self.validator.conditional(), version);
                let response = self.inner.send(&conditional)?;
                if response.is_not_modified() {
                    log_debug!(
                        "{} {} not modified since {}",
                        request.method(),
                        request.uri(),
                        version
                    );
                    if let Some(cached) = cached {
                        return Ok(cached);
                    }
                }
                response
            }
            None => self.inner.send(request)?,
        };
        self.update(request, &response)?;
        Ok(response)
    }
}
