//! A minimal cookie jar: attaches a `Cookie` header built from previously
//! seen `Set-Cookie`/`Set-Cookie2` values and records new ones as they come
//! back. Matching is by host suffix only — this crate does not implement
//! full RFC 6265 domain/path matching, just enough to keep a session cookie
//! flowing across redirects and repeat requests to the same site.

use std::cell::RefCell;
use std::rc::Rc;

use cookie::Cookie;

use crate::consumer::{HttpConsumer, POST_REQUEST, PRE_REQUEST};

#[derive(Debug, Default)]
pub struct CookieJar {
    by_host: std::collections::HashMap<String, Vec<Cookie<'static>>>,
}

impl CookieJar {
    fn store(&mut self, host: &str, cookie: Cookie<'static>) {
        let entry = self.by_host.entry(host.to_owned()).or_default();
        entry.retain(|c| c.name() != cookie.name());
        entry.push(cookie);
    }

    fn header_value(&self, host: &str) -> Option<String> {
        let cookies = self.by_host.get(host)?;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name(), c.value()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

pub fn install(consumer: &Rc<RefCell<HttpConsumer>>, jar: Rc<RefCell<CookieJar>>) {
    let jar_for_send = Rc::clone(&jar);
    consumer.borrow_mut().bind_event(
        PRE_REQUEST,
        Box::new(move |c, _| {
            if let Some(host) = c.request.url.host_str() {
                if let Some(value) = jar_for_send.borrow().header_value(host) {
                    if let Ok(header) = http::HeaderValue::from_str(&value) {
                        c.request.headers.insert(http::header::COOKIE, header);
                    }
                }
            }
            None
        }),
    );

    consumer.borrow_mut().bind_event(
        POST_REQUEST,
        Box::new(move |c, _| {
            let host = c.request.url.host_str()?.to_owned();
            let head = c.response.as_ref()?;
            let mut jar = jar.borrow_mut();
            let set_cookie2 = http::header::HeaderName::from_static("set-cookie2");
            for name in [http::header::SET_COOKIE, set_cookie2] {
                for raw in head.headers.get_all(&name) {
                    if let Ok(text) = raw.to_str() {
                        if let Ok(parsed) = Cookie::parse(text.to_owned()) {
                            jar.store(&host, parsed);
                        }
                    }
                }
            }
            None
        }),
    );
}
