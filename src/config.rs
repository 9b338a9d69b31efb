//! Config file parsing and validation.
//!
//! One setting per line, `#` starts a comment:
//!
//! ```text
//! chain=caching,last-modified
//! caching.flush=PUT /save/.*
//! file.directory=/var/cache/wire
//! etag.idle=5m
//! ```

use crate::cache::expiring::DEFAULT_IDLE;
use crate::error::{AddContext, WireError};
use crate::time::Seconds;
use crate::transport::NEVER;
use crate::Result;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::{collections::HashMap, io::Read};

pub trait ConfigProperties {
    /// Decorator names, outermost first.
    fn chain(&self) -> &[String];
    fn property(&self, decorator: &str, key: &str) -> Option<&str>;
    fn flush(&self, decorator: &str) -> &str {
        self.property(decorator, "flush").unwrap_or(NEVER)
    }
    fn directory(&self) -> Option<&str> {
        self.property("file", "directory")
    }
    fn idle(&self) -> Result<Seconds> {
        match self.property("etag", "idle") {
            Some(idle) => Ok(Seconds::try_from(idle)?),
            None => Ok(DEFAULT_IDLE),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    chain: Vec<String>,
    properties: HashMap<String, HashMap<String, String>>,
}

lazy_static! {
    static ref CHAIN_RE: Regex = Regex::new(r"^chain\s*=\s*(?P<chain>.*)$").unwrap();
    static ref PROPERTY_RE: Regex =
        Regex::new(r"^(?P<decorator>[\w-]+)\.(?P<key>\w+)\s*=\s*(?P<value>.*)$").unwrap();
}

impl Config {
    pub fn new<T: Read>(mut reader: T) -> Result<Self> {
        let mut config_data = String::new();
        reader
            .read_to_string(&mut config_data)
            .err_context("Cannot read config data")?;
        let mut config = Config::default();
        for (number, line) in config_data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(captured) = CHAIN_RE.captures(line) {
                config.chain = captured["chain"]
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                continue;
            }
            match PROPERTY_RE.captures(line) {
                Some(captured) => {
                    config
                        .properties
                        .entry(captured["decorator"].to_string())
                        .or_default()
                        .insert(
                            captured["key"].to_string(),
                            captured["value"].trim().to_string(),
                        );
                }
                None => {
                    return Err(WireError::ConfigurationError(format!(
                        "Invalid config line {}: {}",
                        number + 1,
                        line
                    ))
                    .into())
                }
            }
        }
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .map_err(|err| WireError::ConfigurationError(err.to_string()))
            .err_context(format!("Cannot open config file {}", path.display()))?;
        Config::new(f)
    }
}

impl ConfigProperties for Config {
    fn chain(&self) -> &[String] {
        &self.chain
    }

    fn property(&self, decorator: &str, key: &str) -> Option<&str> {
        self.properties
            .get(decorator)
            .and_then(|properties| properties.get(key))
            .map(String::as_str)
    }
}

impl<T: ConfigProperties + ?Sized> ConfigProperties for Arc<T> {
    fn chain(&self) -> &[String] {
        self.as_ref().chain()
    }

    fn property(&self, decorator: &str, key: &str) -> Option<&str> {
        self.as_ref().property(decorator, key)
    }
}
