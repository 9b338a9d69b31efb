use crate::error::WireError;
use crate::time::Milliseconds;
use crate::Result;
use std::collections::{btree_map, BTreeMap};
use std::fmt::{self, Display, Formatter};
use url::Url;

pub const ETAG: &str = "ETag";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

pub const DEFAULT_CONNECT_TIMEOUT: Milliseconds = Milliseconds::new(60_000);
pub const DEFAULT_READ_TIMEOUT: Milliseconds = Milliseconds::new(60_000);

lazy_static! {
    // Relative request targets are resolved against this base only to
    // extract their path and query.
    static ref LABEL_BASE: Url = Url::parse("http://localhost/").unwrap();
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical capitalization of a header name: the first letter and every
/// letter following a hyphen are upper-cased, the rest lower-cased.
/// `content-type` becomes `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.trim().chars() {
        if upper {
            canonical.extend(c.to_uppercase());
        } else {
            canonical.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    canonical
}

/// Header multi-map. Names are stored canonicalized, so lookups are case
/// insensitive. Values keep their insertion order per name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Headers(BTreeMap::new())
    }

    /// Replaces every value of `key` with `value`.
    pub fn set<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0
            .insert(canonical_name(key.as_ref()), vec![value.into()]);
    }

    /// Appends `value` to the values already held for `key`.
    pub fn add<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0
            .entry(canonical_name(key.as_ref()))
            .or_default()
            .push(value.into());
    }

    /// First value of the header, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&canonical_name(key))
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .get(&canonical_name(key))
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(&canonical_name(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(&canonical_name(key))
    }

    pub fn iter(&self) -> btree_map::Iter<String, Vec<String>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.add(key, value);
        }
        headers
    }
}

/// An immutable HTTP request. Every field takes part in equality and
/// hashing, so a request is its own cache key: two requests address the same
/// cache slot iff method, uri, headers, body and timeouts are all equal.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Hash)]
#[builder(pattern = "owned")]
pub struct Request {
    #[builder(default)]
    method: Method,
    #[builder(setter(into))]
    uri: String,
    #[builder(default)]
    headers: Headers,
    #[builder(setter(into), default)]
    body: Vec<u8>,
    #[builder(setter(into), default = "DEFAULT_CONNECT_TIMEOUT")]
    connect_timeout: Milliseconds,
    #[builder(setter(into), default = "DEFAULT_READ_TIMEOUT")]
    read_timeout: Milliseconds,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn new(uri: &str, method: Method) -> Self {
        Request {
            method,
            uri: uri.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Returns a copy of this request with `key` set to `value`.
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn connect_timeout(&self) -> Milliseconds {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Milliseconds {
        self.read_timeout
    }

    /// Cache label of the request: `<METHOD> <path>[?<query>]`. Host, headers
    /// and timeouts are left out on purpose so that cosmetically different
    /// requests share the label.
    pub fn label(&self) -> Result<String> {
        let url = match Url::parse(&self.uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                LABEL_BASE.join(&self.uri).map_err(|err| {
                    WireError::RequestBuildError(format!("Invalid uri {}: {}", self.uri, err))
                })?
            }
            Err(err) => {
                return Err(WireError::RequestBuildError(format!(
                    "Invalid uri {}: {}",
                    self.uri, err
                ))
                .into())
            }
        };
        let mut label = format!("{} {}", self.method, url.path());
        if let Some(query) = url.query() {
            label.push('?');
            label.push_str(query);
        }
        Ok(label)
    }
}
