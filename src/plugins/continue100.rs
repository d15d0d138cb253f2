//! Handles the `100 Continue` interim response for requests that sent
//! `Expect: 100-continue`.

use std::cell::RefCell;
use std::rc::Rc;

use http::StatusCode;

use crate::consumer::{HttpConsumer, ON_HEADERS};

pub fn install(consumer: &Rc<RefCell<HttpConsumer>>) {
    consumer.borrow_mut().bind_event(
        ON_HEADERS,
        Box::new(|c, _| {
            let is_continue = matches!(&c.response, Some(head) if head.status == StatusCode::CONTINUE);
            if is_continue && c.request.expect_continue {
                c.request_continue_body_write();
            }
            None
        }),
    );
}
