//! Dispatcher behaviour against an in-process host.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Response, StatusCode};
use tokio::sync::oneshot::error::TryRecvError;

use http_interceptor::dispatch::{DispatchError, Dispatcher, Transport};
use http_interceptor::events::{Event, Severity};
use http_interceptor::host::{
    request_handler, upgrade_handler, Category, EventServer, HostError, HostServer,
    RequestHandler, UpgradeHandler,
};
use http_interceptor::http::{Responder, UpgradeSocket};
use http_interceptor::routing::BasePathError;

mod common;

use common::{get, Calls};

/// Transport whose setup is an arbitrary closure.
struct Hook<F>(F);

impl<F> Transport for Hook<F>
where
    F: Fn(&Dispatcher) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "hook"
    }

    fn setup(&self, dispatcher: &Dispatcher) -> Result<(), DispatchError> {
        (self.0)(dispatcher)
    }
}

fn hook<F>(setup: F) -> Hook<F>
where
    F: Fn(&Dispatcher) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    Hook(setup)
}

/// Transport with no subscribers at all.
fn bare() -> Hook<impl Fn(&Dispatcher) -> Result<(), DispatchError> + Send + Sync + 'static> {
    hook(|_| Ok(()))
}

fn install<T: Transport>(server: &Arc<EventServer>, transport: T) -> Arc<Dispatcher> {
    Dispatcher::install(server.clone(), "/primus", transport).unwrap()
}

fn ok() -> Response<Body> {
    Response::new(Body::empty())
}

#[test]
fn install_takes_over_the_host() {
    let server = Arc::new(EventServer::new());
    server.on_request(request_handler(|_, _| {})).unwrap();
    server.on_request(request_handler(|_, _| {})).unwrap();
    server.on_upgrade(upgrade_handler(|_, _, _| {})).unwrap();

    let dispatcher = install(&server, bare());

    assert_eq!(dispatcher.previous_request_count(), 2);
    assert_eq!(dispatcher.previous_upgrade_count(), 1);
    assert_eq!(server.listener_count(Category::Request), 1);
    assert_eq!(server.listener_count(Category::Upgrade), 1);
    assert!(dispatcher.server().is_some());
}

#[test]
fn unclaimed_request_runs_previous_handlers_in_order_with_same_arguments() {
    let server = Arc::new(EventServer::new());
    let calls = Calls::default();

    for n in 1..=3 {
        let calls = calls.clone();
        server
            .on_request(request_handler(move |request, response| {
                let sent = response.send(ok());
                calls.push(format!("{n} {:p} sent={sent}", Arc::as_ptr(&request)));
            }))
            .unwrap();
    }

    install(&server, bare());

    let request = get("/other");
    let ptr = Arc::as_ptr(&request);
    let (responder, mut rx) = Responder::channel();
    server.emit_request(request, responder);

    // Only the first handler's send succeeds: they all share one responder.
    assert_eq!(
        calls.take(),
        vec![
            format!("1 {ptr:p} sent=true"),
            format!("2 {ptr:p} sent=false"),
            format!("3 {ptr:p} sent=false"),
        ]
    );
    assert_eq!(rx.try_recv().unwrap().status(), StatusCode::OK);
}

#[test]
fn classification_is_a_plain_prefix_match() {
    let server = Arc::new(EventServer::new());
    let claimed = Calls::default();
    let unknown = Calls::default();

    let c = claimed.clone();
    let dispatcher = install(
        &server,
        hook(move |d| {
            let c = c.clone();
            d.on_request(move |request, _, _| c.push(request.uri().path()));
            Ok(())
        }),
    );
    let u = unknown.clone();
    dispatcher.on_unknown(move |request| u.push(request.uri().path()));

    for target in ["/primus/status", "/other", "/primusish"] {
        let (responder, _rx) = Responder::channel();
        server.emit_request(get(target), responder);
    }

    assert_eq!(claimed.take(), vec!["/primus/status", "/primusish"]);
    assert_eq!(unknown.take(), vec!["/other"]);
}

#[test]
fn test_annotates_the_request() {
    let server = Arc::new(EventServer::new());
    let dispatcher = install(&server, bare());

    let request = get("/primus/spark?sid=7");
    assert!(request.location().is_none());
    assert!(dispatcher.test(&request));

    let location = request.location().unwrap();
    assert_eq!(location.pathname(), "/primus/spark");
    assert_eq!(location.query(), Some("sid=7"));
}

#[test]
fn claimed_request_is_emitted_with_noop_continuation() {
    let server = Arc::new(EventServer::new());
    let calls = Calls::default();
    let c = calls.clone();
    let dispatcher = install(
        &server,
        hook(move |d| {
            let c = c.clone();
            d.on_request(move |request, response, next| {
                next();
                response.send(ok());
                c.push(request.location().unwrap().pathname());
            });
            Ok(())
        }),
    );

    let (responder, mut rx) = Responder::channel();
    dispatcher.request(get("/primus/x"), responder);

    assert_eq!(calls.take(), vec!["/primus/x"]);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn claimed_and_chained_paths_are_exclusive() {
    let server = Arc::new(EventServer::new());
    let calls = Calls::default();

    let c = calls.clone();
    server
        .on_request(request_handler(move |request, _| {
            c.push(format!("previous {}", request.uri().path()))
        }))
        .unwrap();

    let c = calls.clone();
    install(
        &server,
        hook(move |d| {
            let c = c.clone();
            d.on_request(move |request, _, _| c.push(format!("claimed {}", request.uri().path())));
            Ok(())
        }),
    );

    for target in ["/primus/a", "/b"] {
        let (responder, _rx) = Responder::channel();
        server.emit_request(get(target), responder);
    }

    assert_eq!(calls.take(), vec!["claimed /primus/a", "previous /b"]);
}

#[test]
fn upgrade_head_is_copied_before_delivery() {
    let server = Arc::new(EventServer::new());
    let previous: Arc<std::sync::Mutex<Vec<(usize, Vec<u8>)>>> = Default::default();
    let claimed: Arc<std::sync::Mutex<Vec<Bytes>>> = Default::default();

    let p = previous.clone();
    server
        .on_upgrade(upgrade_handler(move |_, _, head| {
            p.lock().unwrap().push((head.as_ptr() as usize, head.to_vec()));
        }))
        .unwrap();

    let c = claimed.clone();
    install(
        &server,
        hook(move |d| {
            let c = c.clone();
            d.on_upgrade(move |_, _, head, _| c.lock().unwrap().push(head.clone()));
            Ok(())
        }),
    );

    let mut head = vec![0x01, 0x02, 0x03];
    server.emit_upgrade(get("/elsewhere"), UpgradeSocket::detached(), &head);
    server.emit_upgrade(get("/primus/ws"), UpgradeSocket::detached(), &head);
    let original = head.as_ptr() as usize;
    head[0] = 0xff;
    head[2] = 0xee;

    let previous = previous.lock().unwrap();
    assert_eq!(previous.len(), 1);
    assert_ne!(previous[0].0, original);
    assert_eq!(previous[0].1, vec![0x01, 0x02, 0x03]);

    let claimed = claimed.lock().unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(&claimed[0][..], &[0x01, 0x02, 0x03]);
    assert_ne!(claimed[0].as_ptr() as usize, original);
}

#[test]
fn unclaimed_upgrade_chains_with_same_socket() {
    let server = Arc::new(EventServer::new());
    let calls = Calls::default();

    for n in 1..=2 {
        let calls = calls.clone();
        server
            .on_upgrade(upgrade_handler(move |_, socket, head| {
                let sent = socket.respond(ok());
                calls.push(format!("{n} len={} sent={sent}", head.len()));
            }))
            .unwrap();
    }

    let dispatcher = install(&server, bare());
    let unknown = Calls::default();
    let u = unknown.clone();
    dispatcher.on_unknown(move |request| u.push(request.uri().path()));

    let (responder, mut rx) = Responder::channel();
    let socket = UpgradeSocket::new(None, responder, None);
    server.emit_upgrade(get("/legacy/ws"), socket, b"abcd");

    assert_eq!(calls.take(), vec!["1 len=4 sent=true", "2 len=4 sent=false"]);
    assert_eq!(unknown.take(), vec!["/legacy/ws"]);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn unclaimed_request_without_handlers_is_dropped_silently() {
    let server = Arc::new(EventServer::new());
    let dispatcher = install(&server, bare());
    let events = Calls::default();

    for name in ["request", "upgrade", "unknown", "log"] {
        let events = events.clone();
        dispatcher
            .events()
            .on(name, move |event: &Event| events.push(event.name()));
    }

    // Nobody cares about requests, so the dispatcher never attached.
    assert_eq!(server.listener_count(Category::Request), 0);
    let (responder, mut rx) = Responder::channel();
    assert!(!server.emit_request(get("/other"), responder));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));

    // Driving the dispatcher directly: only `unknown` is emitted.
    let (responder, mut rx) = Responder::channel();
    dispatcher.request(get("/other"), responder);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    assert_eq!(events.take(), vec!["unknown"]);
}

#[test]
fn log_fans_out_to_every_subscriber_in_order() {
    let server = Arc::new(EventServer::new());
    let dispatcher = install(&server, bare());
    let calls = Calls::default();

    for n in 1..=3 {
        let calls = calls.clone();
        dispatcher.on_log(move |record| {
            let severity = record.severity.map(|s| s.as_str()).unwrap_or("-");
            calls.push(format!("{n} {severity} {}", record.message));
        });
    }

    dispatcher.logger().error("x");
    assert_eq!(calls.take(), vec!["1 error x", "2 error x", "3 error x"]);

    dispatcher.logger().plain("y");
    assert_eq!(calls.take(), vec!["1 - y", "2 - y", "3 - y"]);
}

#[test]
fn logger_severities() {
    let server = Arc::new(EventServer::new());
    let dispatcher = install(&server, bare());
    let seen: Arc<std::sync::Mutex<Vec<Option<Severity>>>> = Default::default();

    let s = seen.clone();
    let id = dispatcher.on_log(move |record| s.lock().unwrap().push(record.severity));

    let logger = dispatcher.logger();
    logger.error("e");
    logger.warn("w");
    logger.info("i");
    logger.debug("d");
    logger.plain("p");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Some(Severity::Error),
            Some(Severity::Warn),
            Some(Severity::Info),
            Some(Severity::Debug),
            None
        ]
    );

    assert!(dispatcher.off("log", id));
    logger.error("after");
    assert_eq!(seen.lock().unwrap().len(), 5);
}

#[test]
fn upgrade_category_is_skipped_when_unused() {
    let server = Arc::new(EventServer::new());
    install(
        &server,
        hook(|d| {
            d.on_request(|_, _, _| {});
            Ok(())
        }),
    );

    assert_eq!(server.listener_count(Category::Request), 1);
    assert_eq!(server.listener_count(Category::Upgrade), 0);
}

#[test]
fn setup_runs_before_handlers_are_captured() {
    let server = Arc::new(EventServer::new());
    let dispatcher = install(
        &server,
        hook(|d| {
            let host = d.server().expect("host alive during setup");
            host.on_upgrade(upgrade_handler(|_, _, _| {}))?;
            Ok(())
        }),
    );

    assert_eq!(dispatcher.previous_upgrade_count(), 1);
    assert_eq!(server.listener_count(Category::Upgrade), 1);
}

#[test]
fn failed_setup_leaves_host_untouched() {
    let server = Arc::new(EventServer::new());
    server.on_request(request_handler(|_, _| {})).unwrap();

    let err = Dispatcher::install(
        server.clone(),
        "/primus",
        hook(|_| {
            Err(DispatchError::Setup {
                transport: "hook",
                reason: "no engine".into(),
            })
        }),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "transport `hook` setup failed: no engine");
    assert_eq!(server.listener_count(Category::Request), 1);
}

/// Host that refuses one operation on one category.
struct Flaky {
    inner: EventServer,
    fail_remove: Option<Category>,
    fail_upgrade_attach: bool,
}

impl Flaky {
    fn new() -> Self {
        Self {
            inner: EventServer::new(),
            fail_remove: None,
            fail_upgrade_attach: false,
        }
    }
}

impl HostServer for Flaky {
    fn request_listeners(&self) -> Result<Vec<RequestHandler>, HostError> {
        self.inner.request_listeners()
    }

    fn upgrade_listeners(&self) -> Result<Vec<UpgradeHandler>, HostError> {
        self.inner.upgrade_listeners()
    }

    fn remove_all_listeners(&self, category: Category) -> Result<(), HostError> {
        if self.fail_remove == Some(category) {
            return Err(HostError::Unsupported(category));
        }
        self.inner.remove_all_listeners(category)
    }

    fn on_request(&self, handler: RequestHandler) -> Result<(), HostError> {
        self.inner.on_request(handler)
    }

    fn on_upgrade(&self, handler: UpgradeHandler) -> Result<(), HostError> {
        if self.fail_upgrade_attach {
            return Err(HostError::Unsupported(Category::Upgrade));
        }
        self.inner.on_upgrade(handler)
    }
}

#[test]
fn failed_removal_restores_host_handlers() {
    let calls = Calls::default();
    let mut host = Flaky::new();
    host.fail_remove = Some(Category::Upgrade);

    let c = calls.clone();
    host.inner
        .on_request(request_handler(move |request, _| c.push(request.uri().path())))
        .unwrap();
    let server = Arc::new(host);

    let err = Dispatcher::install(server.clone(), "/primus", bare()).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Host(HostError::Unsupported(Category::Upgrade))
    ));

    assert_eq!(server.inner.listener_count(Category::Request), 1);
    let (responder, _rx) = Responder::channel();
    assert!(server.inner.emit_request(get("/primus/x"), responder));
    assert_eq!(calls.take(), vec!["/primus/x"]);
}

#[test]
fn failed_attach_restores_both_categories() {
    let calls = Calls::default();
    let mut host = Flaky::new();

    let c = calls.clone();
    host.inner
        .on_request(request_handler(move |_, _| c.push("request")))
        .unwrap();
    let c = calls.clone();
    host.inner
        .on_upgrade(upgrade_handler(move |_, _, _| c.push("upgrade")))
        .unwrap();
    host.fail_upgrade_attach = true;
    let server = Arc::new(host);

    let err = Dispatcher::install(server.clone(), "/primus", bare()).unwrap_err();
    assert!(matches!(err, DispatchError::Host(HostError::Unsupported(_))));

    assert_eq!(server.inner.listener_count(Category::Request), 1);
    assert_eq!(server.inner.listener_count(Category::Upgrade), 1);

    let (responder, _rx) = Responder::channel();
    server.inner.emit_request(get("/primus/x"), responder);
    let (responder, _rx) = Responder::channel();
    let socket = UpgradeSocket::new(None, responder, None);
    server.inner.emit_upgrade(get("/primus/ws"), socket, b"");
    assert_eq!(calls.take(), vec!["request", "upgrade"]);
}

#[test]
fn invalid_base_path_is_fatal() {
    let server = Arc::new(EventServer::new());
    let err = Dispatcher::install(server.clone(), "", bare()).unwrap_err();
    assert!(matches!(err, DispatchError::BasePath(BasePathError::Empty)));
}

#[test]
fn closed_host_is_fatal() {
    let server = Arc::new(EventServer::new());
    server.close();
    let err = Dispatcher::install(server.clone(), "/primus", bare()).unwrap_err();
    assert!(matches!(err, DispatchError::Host(HostError::Closed)));
}

#[test]
fn stacked_dispatchers_chain_to_each_other() {
    let server = Arc::new(EventServer::new());
    let calls = Calls::default();

    for base in ["/alpha", "/beta"] {
        let c = calls.clone();
        Dispatcher::install(
            server.clone(),
            base,
            hook(move |d| {
                let c = c.clone();
                let base = d.base_path().to_string();
                d.on_request(move |request, _, _| {
                    c.push(format!("{base} {}", request.uri().path()))
                });
                Ok(())
            }),
        )
        .unwrap();
    }

    assert_eq!(server.listener_count(Category::Request), 1);

    for target in ["/alpha/1", "/beta/2", "/gamma/3"] {
        let (responder, _rx) = Responder::channel();
        server.emit_request(get(target), responder);
    }

    assert_eq!(calls.take(), vec!["/alpha /alpha/1", "/beta /beta/2"]);
}

#[test]
#[should_panic(expected = "subscriber failed")]
fn subscriber_panics_propagate() {
    let server = Arc::new(EventServer::new());
    install(
        &server,
        hook(|d| {
            d.on_request(|_, _, _| panic!("subscriber failed"));
            Ok(())
        }),
    );

    let (responder, _rx) = Responder::channel();
    server.emit_request(get("/primus"), responder);
}
