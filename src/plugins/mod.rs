//! The five HTTP/WebSocket plugins, each a small set of handlers bound onto
//! a freshly created [`HttpConsumer`]'s event bus.

pub mod continue100;
pub mod cookies;
pub mod redirect;
pub mod tunnel;
pub mod upgrade;

use std::cell::RefCell;
use std::rc::Rc;

use crate::consumer::HttpConsumer;

#[cfg(feature = "cookies")]
use cookies::CookieJar;

/// Bind the standard plugin set onto a new consumer before its exchange
/// starts. Order matters: cookies attaches outgoing `Cookie` headers and
/// records `Set-Cookie` before redirect decides whether to redispatch, so a
/// redirected request carries cookies set by the response that redirected
/// it. How many redirects `Client` will actually follow is governed by
/// `ClientConfig::max_redirects`, not by anything bound here.
///
/// `tunnel` is not bound here: establishing a `CONNECT` tunnel needs real
/// I/O before the request line can be written, so [`crate::connection::Connection`]
/// calls [`tunnel::establish`] directly rather than through the event bus.
///
/// `upgrade` is bound conditionally, only when the request itself is marked
/// as a WebSocket handshake attempt (set by
/// [`crate::client::Client::upgrade`]) — an ordinary request that happens to
/// receive an unexpected `101` should not have its connection pulled from
/// the pool.
pub fn install(
    consumer: &Rc<RefCell<HttpConsumer>>,
    #[cfg(feature = "cookies")] cookie_jar: Option<Rc<RefCell<CookieJar>>>,
) {
    #[cfg(feature = "cookies")]
    if let Some(jar) = cookie_jar {
        cookies::install(consumer, jar);
    }
    continue100::install(consumer);
    redirect::install(consumer);
    if consumer.borrow().request.upgrade {
        upgrade::install(consumer);
    }
}
