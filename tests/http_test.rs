use std::sync::Arc;

use httpmock::prelude::*;
use wirecache::config::Config;
use wirecache::error::WireError;
use wirecache::http::{Method, Request, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use wirecache::transport::build_chain;
use wirecache::{
    CachingTransport, EtagTransport, FileCachingTransport, RevalidatingTransport, Transport,
    UreqTransport,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn has_header(req: &HttpMockRequest, name: &str) -> bool {
    req.headers
        .as_ref()
        .map(|headers| headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name)))
        .unwrap_or(false)
}

fn without_if_none_match(req: &HttpMockRequest) -> bool {
    !has_header(req, "if-none-match")
}

fn without_if_modified_since(req: &HttpMockRequest) -> bool {
    !has_header(req, "if-modified-since")
}

#[test]
fn test_ureq_transport_get() {
    init_logger();
    let server = MockServer::start();
    let server_mock = server.mock(|when, then| {
        when.method(GET).path("/repos/wire");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id": 4}"#);
    });
    let request = Request::new(&server.url("/repos/wire"), Method::GET);
    let response = UreqTransport::new().send(&request).unwrap();
    assert_eq!(200, response.status);
    assert_eq!("OK", response.reason);
    assert_eq!(Some("application/json"), response.header("Content-Type"));
    assert_eq!(r#"{"id": 4}"#, response.text().unwrap());
    server_mock.assert();
}

#[test]
fn test_ureq_transport_error_status_is_a_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing");
        then.status(404).body("not found");
    });
    let request = Request::new(&server.url("/missing"), Method::GET);
    let response = UreqTransport::new().send(&request).unwrap();
    assert_eq!(404, response.status);
    assert_eq!("Not Found", response.reason);
}

#[test]
fn test_ureq_transport_post_with_body_and_headers() {
    let server = MockServer::start();
    let server_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/save")
            .header("x-request-id", "42")
            .body("payload");
        then.status(201);
    });
    let request = Request::new(&server.url("/save"), Method::POST)
        .with_header("X-Request-Id", "42")
        .with_body("payload");
    let response = UreqTransport::new().send(&request).unwrap();
    assert_eq!(201, response.status);
    server_mock.assert();
}

#[test]
fn test_ureq_transport_server_down() {
    let request = Request::new("http://localhost:8091/repos/wire", Method::GET);
    let err = UreqTransport::new().send(&request).unwrap_err();
    match err.downcast_ref::<WireError>() {
        Some(WireError::HttpTransportError(_)) => {}
        _ => panic!("Expected HttpTransportError"),
    }
}

#[test]
fn test_caching_transport_hits_server_once() {
    let server = MockServer::start();
    let server_mock = server.mock(|when, then| {
        when.method(GET).path("/items");
        then.status(200).body("items");
    });
    let transport = CachingTransport::new(UreqTransport::new());
    let request = Request::new(&server.url("/items"), Method::GET);
    for _ in 0..3 {
        assert_eq!(b"items".to_vec(), transport.send(&request).unwrap().body);
    }
    server_mock.assert_hits(1);
}

#[test]
fn test_caching_transport_flushes_on_put() {
    let server = MockServer::start();
    let items = server.mock(|when, then| {
        when.method(GET).path("/items");
        then.status(200).body("items");
    });
    let save = server.mock(|when, then| {
        when.method(PUT).path("/save/1");
        then.status(204);
    });
    let transport = CachingTransport::with_flush(UreqTransport::new(), "PUT /save/.*").unwrap();
    let get = Request::new(&server.url("/items"), Method::GET);
    transport.send(&get).unwrap();
    transport
        .send(&Request::new(&server.url("/save/1"), Method::PUT))
        .unwrap();
    transport.send(&get).unwrap();
    items.assert_hits(2);
    save.assert_hits(1);
}

#[test]
fn test_etag_transport_revalidates_unchanged_resource() {
    init_logger();
    let server = MockServer::start();
    let plain = server.mock(|when, then| {
        when.method(GET)
            .path("/resource")
            .matches(without_if_none_match);
        then.status(200)
            .header("ETag", "\"3e25\"")
            .body("sample content");
    });
    let conditional = server.mock(|when, then| {
        when.method(GET)
            .path("/resource")
            .header("if-none-match", "\"3e25\"");
        then.status(304);
    });
    let transport = EtagTransport::new(UreqTransport::new());
    let request = Request::new(&server.url("/resource"), Method::GET);
    let first = transport.send(&request).unwrap();
    let second = transport.send(&request).unwrap();
    assert_eq!(200, second.status);
    assert_eq!(b"sample content".to_vec(), second.body);
    assert_eq!(first, second);
    plain.assert_hits(1);
    conditional.assert_hits(1);
}

#[test]
fn test_revalidating_transport_caller_conditional_reaches_server() {
    let server = MockServer::start();
    let conditional = server.mock(|when, then| {
        when.method(GET)
            .path("/resource")
            .header("if-none-match", "\"abc\"");
        then.status(304);
    });
    let transport = RevalidatingTransport::etag(UreqTransport::new());
    let request =
        Request::new(&server.url("/resource"), Method::GET).with_header(IF_NONE_MATCH, "\"abc\"");
    assert_eq!(304, transport.send(&request).unwrap().status);
    conditional.assert_hits(1);
}

#[test]
fn test_last_modified_transport_revalidates_with_date() {
    let date = "Wed, 21 Oct 2015 07:28:00 GMT";
    let server = MockServer::start();
    let plain = server.mock(|when, then| {
        when.method(GET)
            .path("/report")
            .matches(without_if_modified_since);
        then.status(200).header("Last-Modified", date).body("report");
    });
    let conditional = server.mock(|when, then| {
        when.method(GET)
            .path("/report")
            .header("if-modified-since", date);
        then.status(304);
    });
    let transport = RevalidatingTransport::last_modified(UreqTransport::new());
    let request = Request::new(&server.url("/report"), Method::GET);
    transport.send(&request).unwrap();
    let second = transport.send(&request).unwrap();
    assert_eq!(b"report".to_vec(), second.body);
    assert!(!second.headers.contains(IF_MODIFIED_SINCE));
    plain.assert_hits(1);
    conditional.assert_hits(1);
}

#[test]
fn test_file_caching_transport_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    let server_mock = server.mock(|when, then| {
        when.method(GET).path("/users").query_param("page", "2");
        then.status(200)
            .header("content-type", "text/plain; charset=utf-8")
            .body("żółw");
    });
    let request = Request::new(&server.url("/users?page=2"), Method::GET);
    let first = FileCachingTransport::new(UreqTransport::new(), dir.path())
        .send(&request)
        .unwrap();
    let second = FileCachingTransport::new(UreqTransport::new(), dir.path())
        .send(&request)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!("żółw", second.text().unwrap());
    server_mock.assert_hits(1);
}

#[test]
fn test_chain_from_config_over_network() {
    init_logger();
    let server = MockServer::start();
    let server_mock = server.mock(|when, then| {
        when.method(GET).path("/a");
        then.status(200).header("ETag", "\"v1\"").body("a");
    });
    let config = Config::new("chain=caching,etag\netag.idle=1m".as_bytes()).unwrap();
    let chain = build_chain(&Arc::new(config), Box::new(UreqTransport::new())).unwrap();
    let request = Request::new(&server.url("/a"), Method::GET);
    chain.send(&request).unwrap();
    chain.send(&request).unwrap();
    server_mock.assert_hits(1);
}
