//! The protocol consumer: one per request/response exchange, carrying the
//! lifecycle events that plugins bind onto.

use std::cell::Cell;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use crate::error::ConsumerError;
use crate::event::EventBus;
use crate::request::{HttpRequest, Outcome};
use crate::transport::{ResponseHead, Transport};

/// Where a consumer is in its exchange. Mirrors the phases the original
/// walks through (`new` -> request written -> headers read -> body streamed
/// -> `finished`/`failed`), kept explicit here so plugins and the pool can
/// assert on it instead of inferring it from field presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    New,
    HeadersPending,
    BodyStreaming,
    Finished,
    Failed,
}

pub const PRE_REQUEST: &str = "pre_request";
pub const ON_HEADERS: &str = "on_headers";
pub const POST_REQUEST: &str = "post_request";
pub const FINISH: &str = "finish";

/// One request/response exchange. Holds the request being sent, the
/// response as it is assembled, and the event bus plugins bind lifecycle
/// hooks onto.
///
/// A single `HttpConsumer` can survive a reconnect (it's handed to the new
/// `Connection` unchanged by [`crate::pool::ConnectionPool`]), but a new one
/// is created for every redispatched request — `post_request` and
/// `pre_request` only ever fire once per exchange.
pub struct HttpConsumer {
    pub request: HttpRequest,
    pub response: Option<ResponseHead>,
    pub body: BytesMut,
    pub state: ConsumerState,
    /// Whether the connection that served this exchange should be returned
    /// to the pool afterwards. Plugins (tunnel, upgrade) flip this to
    /// `false` when they take the transport over for something else.
    pub release_connection: bool,
    /// The transport carrying this exchange, set by `Connection` before the
    /// first event fires. Plugins that need to write out-of-band (the
    /// 100-continue body, a tunnel `CONNECT`) use it directly rather than
    /// routing back through the connection.
    pub transport: Option<Rc<dyn Transport>>,
    /// Set by the continue100 plugin while handling an interim `100`
    /// response; the connection checks and clears this right after
    /// `on_headers` fires and performs the actual write, keeping the event
    /// handlers themselves synchronous.
    write_continue_body: Cell<bool>,
    events: EventBus<HttpConsumer, Outcome>,
}

impl HttpConsumer {
    pub fn new(request: HttpRequest) -> Self {
        let mut events = EventBus::new();
        events.register_once(PRE_REQUEST);
        events.register_many(ON_HEADERS);
        events.register_once(POST_REQUEST);
        events.register_once(FINISH);

        HttpConsumer {
            request,
            response: None,
            body: BytesMut::new(),
            state: ConsumerState::New,
            release_connection: true,
            transport: None,
            write_continue_body: Cell::new(false),
            events,
        }
    }

    pub fn request_continue_body_write(&self) {
        self.write_continue_body.set(true);
    }

    pub fn take_continue_body_write(&self) -> bool {
        self.write_continue_body.replace(false)
    }

    pub fn bind_event(
        &mut self,
        name: &'static str,
        handler: crate::event::Handler<HttpConsumer, Outcome>,
    ) {
        let mut events = std::mem::take(&mut self.events);
        events.bind_event(name, self, handler);
        self.events = events;
    }

    pub fn silence_event(&mut self, name: &'static str) {
        self.events.silence_event(name);
    }

    fn fire(&mut self, name: &'static str, err: Option<ConsumerError>) -> Option<Outcome> {
        let mut events = std::mem::take(&mut self.events);
        let result = events.fire_event(name, self, err);
        self.events = events;
        result
    }

    pub fn fire_pre_request(&mut self) -> Option<Outcome> {
        self.fire(PRE_REQUEST, None)
    }

    pub fn fire_on_headers(&mut self, head: ResponseHead) -> Option<Outcome> {
        self.response = Some(head);
        self.state = ConsumerState::HeadersPending;
        self.fire(ON_HEADERS, None)
    }

    pub fn fire_post_request(&mut self) -> Option<Outcome> {
        self.state = ConsumerState::BodyStreaming;
        self.fire(POST_REQUEST, None)
    }

    pub fn fire_finish(&mut self, err: Option<ConsumerError>) {
        self.state = if err.is_some() { ConsumerState::Failed } else { ConsumerState::Finished };
        self.fire(FINISH, err);
    }

    pub fn append_body(&mut self, chunk: Bytes) {
        self.body.extend_from_slice(&chunk);
    }

    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body).freeze()
    }
}
