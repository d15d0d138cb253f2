//! Follows `3xx` redirects by turning `post_request` into an
//! `Outcome::Redispatch`.

use std::cell::RefCell;
use std::rc::Rc;

use http::{Method, StatusCode};

use crate::consumer::{HttpConsumer, POST_REQUEST};
use crate::request::{Outcome, RedispatchParams};

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Binds the redirect handling onto `consumer`. How many redirects are
/// actually allowed is enforced by [`crate::client::Client`] (it owns the
/// history and is what returns `TooManyRedirects`); this plugin only
/// decides whether *this* response is a redirect worth following.
pub fn install(consumer: &Rc<RefCell<HttpConsumer>>) {
    consumer.borrow_mut().bind_event(
        POST_REQUEST,
        Box::new(move |c, _| {
            if !c.request.allow_redirects {
                return None;
            }
            let head = c.response.as_ref()?;
            if !is_redirect(head.status) {
                return None;
            }

            let location = head.headers.get(http::header::LOCATION)?.to_str().ok()?;
            let url = c.request.url.join(location).ok()?;

            // 303 always downgrades to GET. 301/302 downgrade a POST to GET,
            // matching the de facto behavior every mainstream client and
            // this pool's own consumers rely on even though the RFC
            // technically permits preserving the method. 307/308 always
            // preserve both method and body.
            let (method, keep_body) = match head.status {
                StatusCode::SEE_OTHER => (Method::GET, false),
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if c.request.method == Method::POST => {
                    (Method::GET, false)
                }
                _ => (c.request.method.clone(), true),
            };

            c.release_connection = true;
            Some(Outcome::Redispatch(RedispatchParams { method, url, keep_body }))
        }),
    );
}
