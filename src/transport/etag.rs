use std::sync::Arc;

use crate::cache::expiring::{ExpiringCache, DEFAULT_IDLE};
use crate::http::{Method, Request, IF_NONE_MATCH};
use crate::io::{Response, Transport};
use crate::time::{Clock, Seconds, SystemClock};
use crate::{log_debug, Result};

/// ETag revalidation with a content addressed store.
///
/// Responses are stored under their `ETag` value, not under the request
/// that fetched them. Each request only remembers the last ETag it saw.
/// Unrelated requests that end up with the same ETag therefore share one
/// cached response: this is the intended content addressing, not a leak.
///
/// Both stores drop entries after `idle` seconds without access (five
/// minutes by default). Expiry is checked lazily.
pub struct EtagTransport<T> {
    inner: T,
    entries: ExpiringCache<String, Response>,
    known: ExpiringCache<Request, String>,
}

impl<T> EtagTransport<T> {
    pub fn new(inner: T) -> Self {
        EtagTransport::with_idle(inner, DEFAULT_IDLE)
    }

    pub fn with_idle(inner: T, idle: Seconds) -> Self {
        EtagTransport::with_clock(inner, idle, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: T, idle: Seconds, clock: Arc<dyn Clock>) -> Self {
        EtagTransport {
            inner,
            entries: ExpiringCache::with_clock(idle, clock.clone()),
            known: ExpiringCache::with_clock(idle, clock),
        }
    }

    /// Response currently stored under `etag`, if still live.
    pub fn cached(&self, etag: &str) -> Option<Response> {
        self.entries.get(&etag.to_string())
    }

    pub fn invalidate(&self) {
        self.entries.clear();
        self.known.clear();
    }

    fn remember(&self, request: &Request, response: &Response) {
        if response.is_not_modified() {
            return;
        }
        match response.get_etag() {
            Some(etag) => {
                log_debug!("Storing {} {} under ETag {}", request.method(), request.uri(), etag);
                self.entries.insert(etag.to_string(), response.clone());
                self.known.insert(request.clone(), etag.to_string());
            }
            // The latest answer carries no ETag, so an older one must not be
            // sent as If-None-Match anymore.
            None => self.known.remove(request),
        }
    }
}

impl<T: Transport> Transport for EtagTransport<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        if request.method() != Method::GET {
            return self.inner.send(request);
        }
        if !request.headers().contains(IF_NONE_MATCH) {
            let revalidate = self
                .known
                .get(request)
                .and_then(|etag| self.entries.get(&etag).map(|cached| (etag, cached)));
            if let Some((etag, cached)) = revalidate {
                let conditional = request.clone().with_header(IF_NONE_MATCH, &etag);
                let response = self.inner.send(&conditional)?;
                if response.is_not_modified() {
                    log_debug!("{} {} not modified, ETag {}", request.method(), request.uri(), etag);
                    return Ok(cached);
                }
                self.remember(request, &response);
                return Ok(response);
            }
        }
        let response = self.inner.send(request)?;
        self.remember(request, &response);
        Ok(response)
    }
}
