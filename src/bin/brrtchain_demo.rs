use std::sync::Arc;

use anyhow::Context as _;
use brrtchain::middleware::{logger, recover, request_id_header, tracing_span, Metrics};
use brrtchain::otel::{init_logging_with_config, LogConfig, LogFormat};
use brrtchain::runtime_config::RuntimeConfig;
use brrtchain::{App, AppConfig, HttpError};
use clap::Parser;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "brrtchain-demo")]
#[command(about = "Demo service for the brrtchain request lifecycle", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BRRTR_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,

    /// Log level (trace/debug/info/warn/error)
    #[arg(long, env = "BRRTR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Pretty logs instead of JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// HTML bodies for 404/405 responses
    #[arg(long, default_value_t = false)]
    html_errors: bool,
}

#[derive(Serialize)]
struct User<'a> {
    user: &'a str,
}

#[derive(Serialize)]
struct Stats {
    requests: usize,
    errors: usize,
    average_latency_us: u128,
}

fn build_app(config: AppConfig, metrics: &Arc<Metrics>) -> App {
    let mut app = App::with_config(config);
    app.use_middleware(recover());
    app.use_middleware(tracing_span());
    app.use_middleware(logger());
    app.use_middleware(request_id_header());
    app.use_middleware(metrics.middleware());

    app.get("/", |ctx| Ok(ctx.text(200, "Hello World!")?), &[]);
    app.get(
        "/users/:name",
        |ctx| {
            let name = ctx
                .param("name")
                .ok_or_else(|| HttpError::bad_request("missing name"))?
                .to_string();
            Ok(ctx.json(200, &User { user: &name })?)
        },
        &[],
    );
    app.get(
        "/old",
        |ctx| Ok(ctx.redirect(301, "/")?),
        &[],
    );
    app.get(
        "/teapot",
        |_| Err(HttpError::new(418, "I'm a teapot").into()),
        &[],
    );
    let stats = Arc::clone(metrics);
    app.get(
        "/stats",
        move |ctx| {
            let body = Stats {
                requests: stats.request_count(),
                errors: stats.error_count(),
                average_latency_us: stats.average_latency().as_micros(),
            };
            Ok(ctx.json(200, &body)?)
        },
        &[],
    );
    app
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    log_config.log_level = cli.log_level.clone();
    if cli.pretty {
        log_config.format = LogFormat::Pretty;
    }
    init_logging_with_config(&log_config)?;

    let runtime = RuntimeConfig::from_env();
    runtime.apply();

    let mut config = AppConfig::from_runtime(&runtime);
    if cli.html_errors {
        config = config.with_html_fallbacks();
    }
    let metrics = Arc::new(Metrics::new());
    let app = Arc::new(build_app(config, &metrics));

    tracing::info!(addr = %cli.addr, routes = app.route_count(), "Starting brrtchain demo");
    app.listen_and_serve(cli.addr.as_str())
        .with_context(|| format!("server on {} failed", cli.addr))?;
    Ok(())
}
