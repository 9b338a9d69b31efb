//! Caching decorators around a `Transport` and the resolution of a decorator
//! chain from configuration.

pub mod caching;
pub mod etag;
pub mod file;
pub mod revalidating;

use regex::Regex;

use crate::config::ConfigProperties;
use crate::error::WireError;
use crate::io::Transport;
use crate::{log_debug, Result};

use caching::CachingTransport;
use etag::EtagTransport;
use file::FileCachingTransport;
use revalidating::RevalidatingTransport;

/// Flush pattern that no label can match: nothing follows the end of input.
pub const NEVER: &str = "$never";

pub type BoxTransport = Box<dyn Transport + Send + Sync>;

/// Regular expression matched against request labels. A match clears the
/// whole cache before the request goes through.
#[derive(Clone, Debug)]
pub struct Flush(Regex);

impl Flush {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| {
            WireError::ConfigurationError(format!("Invalid flush pattern {pattern}: {err}"))
        })?;
        Ok(Flush(regex))
    }

    pub fn never() -> Self {
        lazy_static! {
            static ref NEVER_RE: Regex = Regex::new(NEVER).unwrap();
        }
        Flush(NEVER_RE.clone())
    }

    pub fn matches(&self, label: &str) -> bool {
        self.0.is_match(label)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Flush {
    fn default() -> Self {
        Flush::never()
    }
}

/// Wraps `leaf` with the decorators named by `config.chain()`. The first name
/// is the outermost decorator, the one a request reaches first.
///
/// Known names: `caching`, `file`, `etag`, `revalidating` (ETag, request
/// keyed) and `last-modified`.
pub fn build_chain<C: ConfigProperties + ?Sized>(
    config: &C,
    leaf: BoxTransport,
) -> Result<BoxTransport> {
    config
        .chain()
        .iter()
        .rev()
        .try_fold(leaf, |inner, name| -> Result<BoxTransport> {
            log_debug!("Decorating transport with {}", name);
            let decorated: BoxTransport = match name.as_str() {
                "caching" => Box::new(CachingTransport::with_flush(
                    inner,
                    config.flush("caching"),
                )?),
                "file" => {
                    let transport = match config.directory() {
                        Some(directory) => FileCachingTransport::new(inner, directory),
                        None => FileCachingTransport::in_temp_dir(inner),
                    };
                    Box::new(transport.with_flush(config.flush("file"))?)
                }
                "etag" => Box::new(EtagTransport::with_idle(inner, config.idle()?)),
                "revalidating" => Box::new(RevalidatingTransport::etag(inner)),
                "last-modified" => Box::new(RevalidatingTransport::last_modified(inner)),
                unknown => {
                    return Err(WireError::ConfigurationError(format!(
                        "Unknown transport decorator: {unknown}"
                    ))
                    .into())
                }
            };
            Ok(decorated)
        })
}
