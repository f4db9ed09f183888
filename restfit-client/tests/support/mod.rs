//! Shared test support: a scripted in-memory transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use restfit_client::{
    Error, RawResponse, Request, ResponseBody, Transport, TransportCall, TransportCallback,
};

type Responder = Box<dyn FnOnce(&Request) -> Result<RawResponse, Error> + Send>;

enum Exchange {
    Respond(Responder),
    /// Never complete; the callback is parked so the exchange stays
    /// pending from the caller's point of view.
    Hang,
}

/// A transport that replays a script of canned exchanges, in order.
///
/// Every created call consumes the next script entry when it runs.
/// Creating a call performs no work, matching real engines; the test can
/// assert on the number of handles created and inspect sent requests.
pub struct MockTransport {
    script: Mutex<VecDeque<Exchange>>,
    sent: Mutex<Vec<Request>>,
    calls: Mutex<Vec<Arc<MockCall>>>,
    created: AtomicUsize,
    timeout: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Script a response with the given status and body.
    pub fn respond(self, status: StatusCode, body: &'static [u8]) -> Self {
        self.respond_with(move |_| {
            Ok(RawResponse {
                status,
                message: status.canonical_reason().unwrap_or("").to_string(),
                headers: HeaderMap::new(),
                body: ResponseBody::from_bytes(None, Bytes::from_static(body)),
            })
        })
    }

    /// Script a response computed from the request.
    pub fn respond_with(
        self,
        f: impl FnOnce(&Request) -> Result<RawResponse, Error> + Send + 'static,
    ) -> Self {
        self.script.lock().push_back(Exchange::Respond(Box::new(f)));
        self
    }

    /// Script an exchange that never completes.
    pub fn hang(self) -> Self {
        self.script.lock().push_back(Exchange::Hang);
        self
    }

    /// Script a transport-level failure.
    pub fn fail(self, kind: io::ErrorKind, message: &'static str) -> Self {
        self.respond_with(move |_| Err(Error::Transport(io::Error::new(kind, message))))
    }

    /// Script a success whose body reader fails mid-read.
    pub fn respond_broken_body(self, status: StatusCode) -> Self {
        self.respond_with(move |_| {
            struct BrokenReader;
            impl io::Read for BrokenReader {
                fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "body reset"))
                }
            }
            Ok(RawResponse {
                status,
                message: status.canonical_reason().unwrap_or("").to_string(),
                headers: HeaderMap::new(),
                body: ResponseBody::new(None, None, Box::new(BrokenReader)),
            })
        })
    }

    /// How many transport calls have been created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// The requests of all created calls, in creation order.
    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Whether the n-th created call was canceled.
    pub fn call_canceled(&self, index: usize) -> bool {
        self.calls.lock()[index].canceled.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn new_call(&self, request: Request) -> Result<Arc<dyn TransportCall>, Error> {
        let exchange = self
            .script
            .lock()
            .pop_front()
            .ok_or_else(|| Error::config("unscripted request"))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(request.clone());
        let call = Arc::new(MockCall {
            request,
            exchange: Mutex::new(Some(exchange)),
            parked: Mutex::new(None),
            canceled: AtomicBool::new(false),
            timeout: self.timeout,
        });
        self.calls.lock().push(call.clone());
        Ok(call)
    }
}

struct MockCall {
    request: Request,
    exchange: Mutex<Option<Exchange>>,
    // Keeps the callback of a hung exchange alive so its channel stays
    // open and the caller's wait-point stays pending.
    parked: Mutex<Option<TransportCallback>>,
    canceled: AtomicBool,
    timeout: Option<Duration>,
}

impl MockCall {
    fn take_exchange(&self) -> Result<Exchange, Error> {
        if self.canceled.load(Ordering::SeqCst) {
            return Err(Error::Canceled);
        }
        self.exchange
            .lock()
            .take()
            .ok_or_else(|| Error::config("transport call executed twice"))
    }
}

impl TransportCall for MockCall {
    fn execute(&self) -> Result<RawResponse, Error> {
        match self.take_exchange()? {
            Exchange::Respond(responder) => responder(&self.request),
            Exchange::Hang => Err(Error::config("hung exchange executed synchronously")),
        }
    }

    fn enqueue(&self, on_complete: TransportCallback) {
        match self.take_exchange() {
            Ok(Exchange::Respond(responder)) => on_complete(responder(&self.request)),
            Ok(Exchange::Hang) => *self.parked.lock() = Some(on_complete),
            Err(e) => on_complete(Err(e)),
        }
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
