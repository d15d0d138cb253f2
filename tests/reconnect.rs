mod support;

use http::Method;
use netpool_client::config::ClientBuilder;
use netpool_client::request::HttpRequest;
use std::rc::Rc;
use std::time::Duration;
use support::{FailingConnector, ScriptedConnector};

#[tokio::test]
async fn retries_are_bounded_by_max_reconnect_then_the_error_surfaces() {
    // Every dial's write fails immediately, a network failure, so it's
    // retried. With `max_reconnect(2)` the client should try a total of
    // three times (the original attempt plus two retries) and no more.
    let connector = FailingConnector::new();
    let client = Rc::new(
        ClientBuilder::new()
            .connector(Rc::clone(&connector))
            .max_reconnect(2)
            .reconnecting_gap(Duration::from_millis(1))
            .finish(),
    );

    let url = url::Url::parse("http://example.test/flaky").unwrap();
    let err = client.response(HttpRequest::new(Method::GET, url)).await.unwrap_err();
    assert!(matches!(err, netpool_client::SendRequestError::ConnectionLost(_)));
    assert_eq!(connector.dial_count.get(), 3);
}

#[tokio::test]
async fn a_protocol_shape_failure_is_not_retried() {
    // An exhausted mock transport's `read_head` fails with a plain parse
    // error, not a network one, so it surfaces on the first attempt with no
    // reconnect at all, even though `max_reconnect` would allow one.
    let connector = ScriptedConnector::new(vec![vec![]]);
    let client = Rc::new(
        ClientBuilder::new()
            .connector(Rc::clone(&connector))
            .max_reconnect(2)
            .reconnecting_gap(Duration::from_millis(1))
            .finish(),
    );

    let url = url::Url::parse("http://example.test/broken").unwrap();
    let err = client.response(HttpRequest::new(Method::GET, url)).await.unwrap_err();
    assert!(matches!(err, netpool_client::SendRequestError::Parse(_)));
    assert_eq!(connector.dial_count(), 1);
}
