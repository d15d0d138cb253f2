mod support;

use http::Method;
use netpool_client::config::ClientBuilder;
use netpool_client::request::HttpRequest;
use std::rc::Rc;
use support::{FailingConnector, ScriptedConnector, ScriptedResponse};

#[tokio::test]
async fn a_released_connection_is_reused_for_the_next_request() {
    let connector = ScriptedConnector::new(vec![vec![
        ScriptedResponse::ok("first"),
        ScriptedResponse::ok("second"),
    ]]);
    let client = Rc::new(ClientBuilder::new().connector(Rc::clone(&connector)).finish());

    let url = url::Url::parse("http://example.test/a").unwrap();
    client.response(HttpRequest::new(Method::GET, url)).await.expect("first request");

    let url = url::Url::parse("http://example.test/b").unwrap();
    client.response(HttpRequest::new(Method::GET, url)).await.expect("second request");

    // Both requests shared the one connection that was dialed; the pool
    // never needed a second dial.
    assert_eq!(connector.dial_count(), 1);
}

#[tokio::test]
async fn admission_is_refused_once_max_connections_is_reached() {
    // Exercise the pool directly rather than through `Client`: holding a
    // connection without releasing it (instead of driving a second request
    // concurrently, which this single-threaded mock setup can't express) is
    // the simplest way to put two connections in `concurrent` against a
    // `max_connections` of one.
    use netpool_client::config::ClientConfig;
    use netpool_client::pool::ConnectionPool;
    use std::time::Duration;

    let connector = ScriptedConnector::new(vec![vec![ScriptedResponse::ok("a")], vec![ScriptedResponse::ok("b")]]);
    let config = ClientConfig { max_connections: 1, ..ClientConfig::default() };
    let key = (
        netpool_client::request::Address { scheme: "http".into(), host: "example.test".into(), port: 80 },
        Duration::ZERO,
    );
    let pool = ConnectionPool::new(key, config, connector, None, std::rc::Weak::new());

    let _held = pool.get_or_create_connection().await.expect("first connection is admitted");
    let err = pool.get_or_create_connection().await.unwrap_err();
    assert!(matches!(err, netpool_client::SendRequestError::TooManyConnections));
}

#[tokio::test]
async fn a_connection_lost_to_a_network_failure_frees_its_pool_slot() {
    // `max_connections(1)` with `max_reconnect(0)` means the first failed
    // request surfaces immediately with no retry, and the only way a second
    // request can get admitted at all is if `connection_lost` actually ran
    // and evicted the dead connection from `concurrent`. If the event never
    // fired, the second call would see `TooManyConnections` instead of
    // dialing again.
    let connector = FailingConnector::new();
    let client = Rc::new(
        ClientBuilder::new()
            .connector(Rc::clone(&connector))
            .max_connections(1)
            .max_reconnect(0)
            .finish(),
    );

    let url = url::Url::parse("http://example.test/a").unwrap();
    let first = client.response(HttpRequest::new(Method::GET, url)).await.unwrap_err();
    assert!(matches!(first, netpool_client::SendRequestError::ConnectionLost(_)));

    let url = url::Url::parse("http://example.test/b").unwrap();
    let second = client.response(HttpRequest::new(Method::GET, url)).await.unwrap_err();
    assert!(matches!(second, netpool_client::SendRequestError::ConnectionLost(_)));
    assert_eq!(connector.dial_count.get(), 2);
}
