//! Call object behavior over a scripted transport: single use, lazy
//! handle creation, cancellation, cloning, classification, and callback
//! executor routing.

mod support;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use http::StatusCode;
use parking_lot::Mutex;
use restfit_client::{
    Callback, CallbackExecutor, EndpointDescriptor, EndpointId, Error, Response, RestClient,
    ReturnType,
};
use support::MockTransport;

const PING: EndpointId = EndpointId("ping");

fn client(transport: Arc<MockTransport>) -> RestClient {
    RestClient::builder()
        .shared_transport(transport)
        .base_url("https://api.example.com/v1/")
        .endpoint(
            PING,
            EndpointDescriptor::get("ping").returns(ReturnType::call_of::<String>()),
        )
        .build()
        .unwrap()
}

#[derive(Default)]
struct RecordingCallback {
    responses: Arc<AtomicUsize>,
    failures: Arc<Mutex<Vec<Error>>>,
}

impl Callback for RecordingCallback {
    fn on_response(self: Box<Self>, _response: Response) {
        self.responses.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(self: Box<Self>, error: Error) {
        self.failures.lock().push(error);
    }
}

#[test]
fn test_execute_decodes_success() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::OK, b"pong"));
    let client = client(transport.clone());

    let response = client
        .call::<String>(PING, &[])
        .unwrap()
        .execute()
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.body().unwrap(), "pong");
    assert_eq!(
        transport.sent()[0].url().as_str(),
        "https://api.example.com/v1/ping"
    );
}

#[test]
fn test_double_execute_is_configuration_error() {
    let transport = Arc::new(
        MockTransport::new()
            .respond(StatusCode::OK, b"pong")
            .respond(StatusCode::OK, b"pong"),
    );
    let client = client(transport);

    let call = client.new_call(PING, &[]).unwrap();
    call.execute().unwrap();
    let err = call.execute().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_cancel_before_execute_never_creates_transport_call() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::OK, b"pong"));
    let client = client(transport.clone());

    let call = client.new_call(PING, &[]).unwrap();
    call.cancel();
    assert!(call.is_canceled());

    let err = call.execute().unwrap_err();
    assert!(matches!(err, Error::Canceled));
    assert_eq!(transport.created(), 0);
}

#[test]
fn test_canceled_call_reports_no_timeout_without_a_handle() {
    let transport = Arc::new(
        MockTransport::new()
            .with_timeout(Duration::from_secs(30))
            .respond(StatusCode::OK, b"pong"),
    );
    let client = client(transport.clone());

    let call = client.new_call(PING, &[]).unwrap();
    call.cancel();
    assert_eq!(call.timeout(), None);
    assert_eq!(transport.created(), 0);
}

#[test]
fn test_timeout_delegates_to_transport() {
    let transport = Arc::new(
        MockTransport::new()
            .with_timeout(Duration::from_secs(30))
            .respond(StatusCode::OK, b"pong"),
    );
    let client = client(transport);

    let call = client.new_call(PING, &[]).unwrap();
    assert_eq!(call.timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn test_clone_call_is_fresh_over_identical_request() {
    let transport = Arc::new(
        MockTransport::new()
            .respond(StatusCode::OK, b"one")
            .respond(StatusCode::OK, b"two"),
    );
    let client = client(transport.clone());

    let first = client.new_call(PING, &[]).unwrap();
    first.execute().unwrap();

    let second = first.clone_call();
    assert!(!second.is_executed());
    second.execute().unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].url(), sent[1].url());
}

#[test]
fn test_no_content_strips_body() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::NO_CONTENT, b""));
    let client = client(transport);

    let response = client
        .call::<String>(PING, &[])
        .unwrap()
        .execute()
        .unwrap();
    assert!(response.is_success());
    assert!(response.body().is_none());
}

#[test]
fn test_error_body_is_buffered() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::NOT_FOUND, b"missing"));
    let client = client(transport);

    let response = client
        .call::<String>(PING, &[])
        .unwrap()
        .execute()
        .unwrap();
    assert!(!response.is_success());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.error_body().unwrap().as_ref(), b"missing");
    assert!(response.body().is_none());
}

#[test]
fn test_broken_body_surfaces_transport_fault() {
    let transport = Arc::new(MockTransport::new().respond_broken_body(StatusCode::OK));
    let client = client(transport);

    let err = client
        .call::<String>(PING, &[])
        .unwrap()
        .execute()
        .unwrap_err();
    match err {
        Error::Transport(io_err) => assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[test]
fn test_enqueue_reports_failure_exactly_once() {
    let transport = Arc::new(MockTransport::new().fail(io::ErrorKind::ConnectionReset, "reset"));
    let client = client(transport);

    let responses = Arc::new(AtomicUsize::new(0));
    let failures: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));
    let call = client.new_call(PING, &[]).unwrap();
    call.enqueue(Box::new(RecordingCallback {
        responses: responses.clone(),
        failures: failures.clone(),
    }));

    assert_eq!(responses.load(Ordering::SeqCst), 0);
    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], Error::Transport(_)));
}

/// A callback executor that queues jobs until the test releases them.
#[derive(Clone, Default)]
struct QueueExecutor {
    jobs: Arc<Mutex<Vec<Box<dyn FnOnce() + Send>>>>,
}

impl QueueExecutor {
    fn run_all(&self) {
        let jobs: Vec<_> = std::mem::take(&mut *self.jobs.lock());
        for job in jobs {
            job();
        }
    }

    fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl CallbackExecutor for QueueExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        self.jobs.lock().push(job);
    }
}

#[test]
fn test_callback_executor_reroutes_completion() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::OK, b"pong"));
    let executor = QueueExecutor::default();
    let client = RestClient::builder()
        .shared_transport(transport)
        .base_url("https://api.example.com/v1/")
        .callback_executor(executor.clone())
        .endpoint(
            PING,
            EndpointDescriptor::get("ping").returns(ReturnType::call_of::<String>()),
        )
        .build()
        .unwrap();

    let responses = Arc::new(AtomicUsize::new(0));
    let typed = client.call::<String>(PING, &[]).unwrap();
    typed.enqueue(Box::new(RecordingCallback {
        responses: responses.clone(),
        failures: Arc::new(Mutex::new(Vec::new())),
    }));

    // Delivery is parked on the executor until the test drains it.
    assert_eq!(responses.load(Ordering::SeqCst), 0);
    assert_eq!(executor.len(), 1);
    executor.run_all();
    assert_eq!(responses.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancellation_between_completion_and_delivery_becomes_failure() {
    let transport = Arc::new(MockTransport::new().respond(StatusCode::OK, b"pong"));
    let executor = QueueExecutor::default();
    let client = RestClient::builder()
        .shared_transport(transport)
        .base_url("https://api.example.com/v1/")
        .callback_executor(executor.clone())
        .endpoint(
            PING,
            EndpointDescriptor::get("ping").returns(ReturnType::call_of::<String>()),
        )
        .build()
        .unwrap();

    let responses = Arc::new(AtomicUsize::new(0));
    let failures: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));
    let typed = client.call::<String>(PING, &[]).unwrap();
    typed.enqueue(Box::new(RecordingCallback {
        responses: responses.clone(),
        failures: failures.clone(),
    }));

    // Completed at the transport, not yet delivered. Cancel now.
    typed.cancel();
    executor.run_all();

    assert_eq!(responses.load(Ordering::SeqCst), 0);
    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], Error::Canceled));
}

#[test]
fn test_skip_callback_executor_delivers_inline() {
    const DIRECT: EndpointId = EndpointId("direct");
    let transport = Arc::new(MockTransport::new().respond(StatusCode::OK, b"pong"));
    let executor = QueueExecutor::default();
    let client = RestClient::builder()
        .shared_transport(transport)
        .base_url("https://api.example.com/v1/")
        .callback_executor(executor.clone())
        .endpoint(
            DIRECT,
            EndpointDescriptor::get("ping")
                .skip_callback_executor()
                .returns(ReturnType::call_of::<String>()),
        )
        .build()
        .unwrap();

    let responses = Arc::new(AtomicUsize::new(0));
    let typed = client.call::<String>(DIRECT, &[]).unwrap();
    typed.enqueue(Box::new(RecordingCallback {
        responses: responses.clone(),
        failures: Arc::new(Mutex::new(Vec::new())),
    }));

    assert_eq!(executor.len(), 0);
    assert_eq!(responses.load(Ordering::SeqCst), 1);
}
