//! Tests for the request context and its pool.
//!
//! # Test Coverage
//!
//! - Request id stability within a request and uniqueness across requests
//! - Inbound correlation headers and injected generators
//! - Typed values, ambient values and logger injection
//! - Cancellation after dispatch, no data leaking between pooled requests
//! - Emission primitives outside an active request

use std::sync::Arc;

use brrtchain::context::{ContextServices, Values};
use brrtchain::ids::RequestIdSource;
use brrtchain::log::{Logger, SharedLogger, WriterLogger};
use brrtchain::server::Recorder;
use brrtchain::{App, AppConfig, CancelSignal, Context, ContextPool, Error};
use http::HeaderName;
use parking_lot::Mutex;

mod common;
use common::capture::SharedBuffer;
use common::requests::{get, with_headers};

#[derive(Debug, PartialEq)]
struct Tenant(&'static str);

#[derive(Debug, PartialEq)]
struct Region(&'static str);

#[test]
fn test_request_id_is_stable_within_request() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    let sink = Arc::clone(&seen);
    app.get(
        "/",
        move |ctx| {
            let first = ctx.request_id().to_string();
            let second = ctx.request_id().to_string();
            sink.lock().push((first, second));
            Ok(())
        },
        &[],
    );

    app.serve(get("/"), Recorder::new());
    app.serve(get("/"), Recorder::new());

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, seen[0].1);
    assert_eq!(seen[1].0, seen[1].1);
    assert_ne!(seen[0].0, seen[1].0);
}

#[test]
fn test_request_id_from_configured_header() {
    let config = AppConfig {
        id_source: RequestIdSource::AppEngine,
        ..AppConfig::default()
    };
    let mut app = App::with_config(config);
    app.get("/", |ctx| {
        let id = ctx.request_id().to_string();
        Ok(ctx.text(200, &id)?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(
        with_headers(
            http::Method::GET,
            "/",
            &[
                ("x-request-id", "ignored"),
                ("x-appengine-request-log-id", "gae-42"),
            ],
        ),
        rec.clone(),
    );

    assert_eq!(rec.body_string(), "gae-42");
}

#[test]
fn test_request_id_custom_header_source() {
    let config = AppConfig {
        id_source: RequestIdSource::Header(HeaderName::from_static("x-correlation-id")),
        ..AppConfig::default()
    };
    let mut app = App::with_config(config);
    app.get("/", |ctx| {
        let id = ctx.request_id().to_string();
        Ok(ctx.text(200, &id)?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(
        with_headers(http::Method::GET, "/", &[("x-correlation-id", "corr-1")]),
        rec.clone(),
    );

    assert_eq!(rec.body_string(), "corr-1");
}

#[test]
fn test_injected_id_generator() {
    let config = AppConfig::default().with_id_generator(Arc::new(|ctx: &Context| {
        format!("gen-{}", ctx.path().trim_start_matches('/'))
    }));
    let mut app = App::with_config(config);
    app.get("/:any", |ctx| {
        let id = ctx.request_id().to_string();
        Ok(ctx.text(200, &id)?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(get("/orders"), rec.clone());

    assert_eq!(rec.body_string(), "gen-orders");
}

#[test]
fn test_empty_generated_id_falls_back_to_ulid() {
    let config = AppConfig::default().with_id_generator(Arc::new(|_: &Context| String::new()));
    let mut app = App::with_config(config);
    app.get("/", |ctx| {
        let id = ctx.request_id().to_string();
        Ok(ctx.text(200, &id)?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(get("/"), rec.clone());

    assert_eq!(rec.body_string().len(), 26);
}

#[test]
fn test_values_local_then_ambient() {
    let mut ambient = Values::new();
    ambient.insert(Tenant("ambient"));
    ambient.insert(Region("eu-west"));
    let config = AppConfig {
        ambient,
        ..AppConfig::default()
    };
    let mut app = App::with_config(config);
    app.get("/", |ctx| {
        ctx.insert(Tenant("local"));
        let tenant = ctx.get::<Tenant>().map(|t| t.0).unwrap_or("-");
        let region = ctx.get::<Region>().map(|r| r.0).unwrap_or("-");
        let body = format!("{tenant}/{region}");
        Ok(ctx.text(200, &body)?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(get("/"), rec.clone());

    assert_eq!(rec.body_string(), "local/eu-west");
}

#[test]
fn test_values_do_not_leak_between_requests() {
    let mut app = App::new();
    app.get("/set", |ctx| {
        ctx.insert(Tenant("left-over"));
        Ok(ctx.no_content(204)?)
    }, &[]);
    app.get("/read", |ctx| {
        let seen = ctx.get::<Tenant>().is_some();
        let id_cached = ctx.cached_request_id().is_some();
        Ok(ctx.text(200, &format!("{seen} {id_cached}"))?)
    }, &[]);

    for _ in 0..3 {
        app.serve(get("/set"), Recorder::new());
        let rec = Recorder::new();
        app.serve(get("/read"), rec.clone());
        assert_eq!(rec.body_string(), "false false");
    }
    let stats = app.dispatcher().pool().stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.idle, 1);
}

#[test]
fn test_logger_injected_through_config() {
    let out = SharedBuffer::new();
    let log: SharedLogger = Arc::new(WriterLogger::new().with_out(out.clone()));
    let mut app = App::with_config(AppConfig::default().with_logger(log));
    app.get("/", |ctx| {
        let logger = ctx.logger();
        logger.info(ctx, format_args!("Test"));
        Ok(())
    }, &[]);

    app.serve(get("/"), Recorder::new());

    assert_eq!(out.contents(), "[INFO] Test\n");
}

#[test]
fn test_logger_levels_split_streams() {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let log: SharedLogger = Arc::new(
        WriterLogger::new()
            .with_out(out.clone())
            .with_err(err.clone()),
    );
    let mut app = App::with_config(AppConfig::default().with_logger(log));
    app.get("/", |ctx| {
        let logger = ctx.logger();
        logger.debug(ctx, format_args!("d"));
        logger.warn(ctx, format_args!("w"));
        logger.fatal(ctx, format_args!("f"));
        Ok(())
    }, &[]);

    app.serve(get("/"), Recorder::new());

    assert_eq!(out.contents(), "[DEBUG] d\n");
    assert_eq!(err.contents(), "[WARN] w\n[FATAL] f\n");
}

#[test]
fn test_cancel_fires_after_dispatch() {
    let held: Arc<Mutex<Option<CancelSignal>>> = Arc::new(Mutex::new(None));
    let mut app = App::new();
    let slot = Arc::clone(&held);
    app.get("/", move |ctx| {
        assert!(!ctx.is_cancelled());
        *slot.lock() = Some(ctx.cancel_signal());
        Ok(())
    }, &[]);

    app.serve(get("/"), Recorder::new());

    let signal = held.lock().take().unwrap();
    assert!(signal.is_cancelled());
    assert!(!signal.cancel());
}

#[test]
fn test_cancel_is_one_shot() {
    let mut app = App::new();
    app.get("/", |ctx| {
        let first = ctx.cancel();
        let second = ctx.cancel();
        Ok(ctx.text(200, &format!("{first} {second} {}", ctx.is_cancelled()))?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(get("/"), rec.clone());

    assert_eq!(rec.body_string(), "true false true");
}

#[test]
fn test_pooled_context_gets_fresh_signal() {
    let mut app = App::new();
    app.get("/", |ctx| Ok(ctx.text(200, &ctx.is_cancelled().to_string())?), &[]);

    for _ in 0..2 {
        let rec = Recorder::new();
        app.serve(get("/"), rec.clone());
        assert_eq!(rec.body_string(), "false");
    }
}

#[test]
fn test_inactive_context_reports_no_active_context() {
    let mut ctx = Context::new(ContextServices::default());

    assert!(!ctx.is_active());
    assert!(matches!(ctx.request(), Err(Error::NoActiveContext)));
    assert!(matches!(ctx.text(200, "x"), Err(Error::NoActiveContext)));
    assert!(matches!(ctx.no_content(204), Err(Error::NoActiveContext)));
    assert!(matches!(ctx.redirect(302, "/"), Err(Error::NoActiveContext)));
    assert!(ctx.param("id").is_none());
    assert_eq!(ctx.path(), "");
}

#[test]
fn test_inactive_context_does_not_mint_request_id() {
    let pool = ContextPool::new(ContextServices::default(), 1);
    let mut ctx = pool.checkout();

    assert_eq!(ctx.request_id(), "");
    assert!(ctx.cached_request_id().is_none());

    ctx.reset(Box::new(Recorder::new()), get("/"), Default::default());
    let id = ctx.request_id().to_string();
    assert_eq!(id.len(), 26);
    assert_eq!(ctx.cached_request_id(), Some(id.as_str()));
}

#[test]
fn test_released_context_is_cleared() {
    let pool = ContextPool::new(ContextServices::default(), 4);
    let mut ctx = pool.acquire();
    ctx.reset(Box::new(Recorder::new()), get("/x"), Default::default());
    ctx.insert(Tenant("t"));
    let _ = ctx.request_id();
    pool.release(ctx);

    let ctx = pool.acquire();
    assert!(!ctx.is_active());
    assert!(ctx.get::<Tenant>().is_none());
    assert!(ctx.cached_request_id().is_none());
    assert!(!ctx.response().is_bound());
    assert_eq!(pool.stats().reused, 1);
}

#[test]
fn test_pool_drops_beyond_capacity() {
    let pool = ContextPool::new(ContextServices::default(), 1);
    let a = pool.acquire();
    let b = pool.acquire();
    pool.release(a);
    pool.release(b);

    let stats = pool.stats();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.idle, 1);
}

#[test]
fn test_json_serialization_failure_writes_nothing() {
    struct Unserializable;
    impl serde::Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not today"))
        }
    }

    let pool = ContextPool::new(ContextServices::default(), 1);
    let rec = Recorder::new();
    let mut ctx = pool.checkout();
    ctx.reset(Box::new(rec.clone()), get("/"), Default::default());

    let err = ctx.json(200, &Unserializable).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
    assert!(!ctx.response().committed());
    assert_eq!(rec.status(), None);
    assert!(rec.body().is_empty());
}

#[test]
fn test_deadline_round_trip() {
    let mut app = App::new();
    app.get("/", |ctx| {
        let at = std::time::Instant::now() + std::time::Duration::from_secs(5);
        ctx.set_deadline(at);
        let ok = ctx.deadline() == Some(at);
        Ok(ctx.text(200, &ok.to_string())?)
    }, &[]);

    let rec = Recorder::new();
    app.serve(get("/"), rec.clone());

    assert_eq!(rec.body_string(), "true");
}
