pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod io;
pub mod time;
pub mod transport;
pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
pub mod logging;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate derive_builder;

pub use http::{Headers, Method, Request};
pub use io::{Response, Transport, UreqTransport};
pub use transport::{
    caching::CachingTransport, etag::EtagTransport, file::FileCachingTransport,
    revalidating::RevalidatingTransport, revalidating::Validator,
};
