//! The call object: a single-use, cancelable, cloneable invocation.
//!
//! A [`Call`] owns one bound request and drives it through the transport at
//! most once, then classifies the raw response into the envelope. The
//! transport handle is created lazily and at most once; canceling before
//! the handle exists never creates it.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use restfit_core::{Error, RawResponse, Request, Response, ResponseBody};

use crate::converter::ResponseConverter;
use crate::transport::{Transport, TransportCall};

/// Completion callback for [`Call::enqueue`]. Exactly one of the two
/// methods is invoked, exactly once.
pub trait Callback: Send {
    fn on_response(self: Box<Self>, response: Response);
    fn on_failure(self: Box<Self>, error: Error);
}

/// One invocation of a compiled endpoint.
pub trait Call: Send + Sync {
    /// Run the exchange on the current thread and classify the result.
    fn execute(&self) -> Result<Response, Error>;

    /// Run the exchange in the background. Transport faults and
    /// classification failures are reported through `on_failure`; they are
    /// never re-raised at the transport.
    fn enqueue(&self, callback: Box<dyn Callback>);

    fn is_executed(&self) -> bool;

    /// Cancel the invocation. Idempotent; never creates the transport
    /// handle.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    /// The bound request this call will send (or sent).
    fn request(&self) -> &Request;

    /// The transport's call-spanning timeout. Creates the transport handle
    /// on demand; returns `None` if the call was already canceled.
    fn timeout(&self) -> Option<Duration>;

    /// A fresh, unexecuted call over the identical bound request. Never
    /// re-runs argument conversion.
    fn clone_call(&self) -> Box<dyn Call>;
}

/// The canonical [`Call`] implementation over a [`Transport`].
pub struct HttpCall {
    transport: Arc<dyn Transport>,
    request: Request,
    response_converter: Arc<dyn ResponseConverter>,
    executed: AtomicBool,
    canceled: AtomicBool,
    raw: Mutex<Option<Arc<dyn TransportCall>>>,
}

impl HttpCall {
    pub fn new(
        transport: Arc<dyn Transport>,
        request: Request,
        response_converter: Arc<dyn ResponseConverter>,
    ) -> Self {
        HttpCall {
            transport,
            request,
            response_converter,
            executed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            raw: Mutex::new(None),
        }
    }

    fn mark_executed(&self) -> Result<(), Error> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(Error::config("call already executed"));
        }
        Ok(())
    }

    /// Get or create the transport handle. Canceled calls never create
    /// one; the check happens under the same lock `cancel` takes, so a
    /// racing cancel either sees the handle or prevents its creation.
    fn raw_call(&self) -> Result<Arc<dyn TransportCall>, Error> {
        let mut slot = self.raw.lock();
        if self.canceled.load(Ordering::SeqCst) {
            return Err(Error::Canceled);
        }
        if let Some(raw) = slot.as_ref() {
            return Ok(raw.clone());
        }
        let raw = self.transport.new_call(self.request.clone())?;
        *slot = Some(raw.clone());
        Ok(raw)
    }
}

impl Call for HttpCall {
    fn execute(&self) -> Result<Response, Error> {
        self.mark_executed()?;
        let raw = self.raw_call()?;
        let raw_response = raw.execute()?;
        if self.canceled.load(Ordering::SeqCst) {
            return Err(Error::Canceled);
        }
        classify(self.response_converter.as_ref(), raw_response)
    }

    fn enqueue(&self, callback: Box<dyn Callback>) {
        if let Err(e) = self.mark_executed() {
            callback.on_failure(e);
            return;
        }
        let raw = match self.raw_call() {
            Ok(raw) => raw,
            Err(e) => {
                callback.on_failure(e);
                return;
            }
        };
        let converter = self.response_converter.clone();
        raw.enqueue(Box::new(move |result| {
            match result.and_then(|raw_response| classify(converter.as_ref(), raw_response)) {
                Ok(response) => callback.on_response(response),
                Err(e) => callback.on_failure(e),
            }
        }));
    }

    fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        if let Some(raw) = self.raw.lock().as_ref() {
            raw.cancel();
        }
    }

    fn is_canceled(&self) -> bool {
        if self.canceled.load(Ordering::SeqCst) {
            return true;
        }
        self.raw
            .lock()
            .as_ref()
            .is_some_and(|raw| raw.is_canceled())
    }

    fn request(&self) -> &Request {
        &self.request
    }

    fn timeout(&self) -> Option<Duration> {
        self.raw_call().ok().and_then(|raw| raw.timeout())
    }

    fn clone_call(&self) -> Box<dyn Call> {
        Box::new(HttpCall::new(
            self.transport.clone(),
            self.request.clone(),
            self.response_converter.clone(),
        ))
    }
}

/// Classify a raw transport response into the envelope.
///
/// Non-2xx responses have their body buffered eagerly so it outlives the
/// connection; 204/205 drop the body without touching the converter; other
/// successes hand the converter a fault-recording body so a read failure
/// underneath a converter error is reported as the transport fault it is.
pub(crate) fn classify(
    converter: &dyn ResponseConverter,
    raw: RawResponse,
) -> Result<Response, Error> {
    let RawResponse {
        status,
        message,
        headers,
        body,
    } = raw;

    if !status.is_success() {
        let buffered = body.read_all().map_err(Error::Transport)?;
        return Response::error(status, message, headers, buffered);
    }

    if status == http::StatusCode::NO_CONTENT || status == http::StatusCode::RESET_CONTENT {
        drop(body);
        return Response::success(status, message, headers, None);
    }

    let fault = Arc::new(Mutex::new(None));
    let recorded = fault.clone();
    let body = body.map_reader(|inner| {
        Box::new(RecordingReader {
            inner,
            fault: recorded,
        })
    });

    match converter.convert(body) {
        Ok(decoded) => Response::success(status, message, headers, decoded),
        Err(e) => {
            // An I/O fault recorded mid-read outranks whatever secondary
            // error the converter produced while handling it.
            if !matches!(e, Error::Transport(_)) {
                if let Some((kind, msg)) = fault.lock().take() {
                    return Err(Error::Transport(io::Error::new(kind, msg)));
                }
            }
            Err(e)
        }
    }
}

/// Records the first read failure so classification can distinguish a
/// transport fault from a converter fault.
struct RecordingReader {
    inner: Box<dyn Read + Send>,
    fault: Arc<Mutex<Option<(io::ErrorKind, String)>>>,
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                let mut slot = self.fault.lock();
                if slot.is_none() {
                    *slot = Some((e.kind(), e.to_string()));
                }
                Err(e)
            }
        }
    }
}
