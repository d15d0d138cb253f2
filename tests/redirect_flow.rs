mod support;

use http::{Method, StatusCode};
use netpool_client::config::ClientBuilder;
use netpool_client::request::HttpRequest;
use std::rc::Rc;
use support::{ScriptedConnector, ScriptedResponse};

#[tokio::test]
async fn follows_a_303_and_downgrades_to_get() {
    // Both legs of the redirect reuse the same pooled connection, so both
    // canned responses live in a single dial's batch.
    let connector = ScriptedConnector::single(vec![
        ScriptedResponse::redirect(StatusCode::SEE_OTHER, "/done"),
        ScriptedResponse::ok("hello"),
    ]);
    let client = Rc::new(ClientBuilder::new().connector(connector).finish());

    let url = url::Url::parse("http://example.test/start").unwrap();
    let request = HttpRequest::new(Method::POST, url);

    let consumer = client.response(request).await.expect("request should succeed");
    let consumer = consumer.borrow();
    assert_eq!(consumer.response.as_ref().unwrap().status, StatusCode::OK);
    assert_eq!(consumer.request.method, Method::GET);
    assert_eq!(consumer.request.history.len(), 1);
}

#[tokio::test]
async fn too_many_redirects_surfaces_an_error() {
    // All legs share one pooled connection, so every redirect response the
    // test expects to be followed lives in the same dial's batch.
    let responses = (0..4).map(|_| ScriptedResponse::redirect(StatusCode::FOUND, "/again")).collect();
    let connector = ScriptedConnector::single(responses);
    let client = Rc::new(ClientBuilder::new().connector(connector).max_redirects(2).finish());

    let url = url::Url::parse("http://example.test/start").unwrap();
    let request = HttpRequest::new(Method::GET, url);

    let err = client.response(request).await.unwrap_err();
    assert!(matches!(err, netpool_client::SendRequestError::TooManyRedirects(_)));
}
