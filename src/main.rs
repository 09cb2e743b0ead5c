use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc};

use pressroom::{
    application::{
        error::AppError,
        pool::{PoolConfig, SessionPool},
        render::{RenderConfig, RenderService},
    },
    config,
    infra::{
        chromium::ChromiumLauncher,
        error::InfraError,
        http::{self, HttpState},
        registry::load_registry,
        shutdown, telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Renderers(_) => run_list_renderers(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let registry = load_registry(&settings.render.registry_path).await?;
    if registry.is_empty() {
        warn!(
            target = "pressroom::main",
            path = %settings.render.registry_path.display(),
            "renderer registry is empty; every render request will be rejected"
        );
    }

    let launcher = Arc::new(ChromiumLauncher::new(&settings.browser));
    let pool = Arc::new(SessionPool::new(
        launcher,
        PoolConfig::from(&settings.browser),
    ));
    let render = RenderService::new(
        pool.clone(),
        Arc::new(registry),
        RenderConfig::from(&settings.render),
    );

    let state = HttpState::from_settings(render, &settings);
    let result = serve_http(&settings, state).await;

    pool.engine().shutdown(settings.browser.close_timeout).await;
    info!(target = "pressroom::main", "shutdown complete");
    result
}

async fn run_list_renderers(settings: config::Settings) -> Result<(), AppError> {
    let registry = load_registry(&settings.render.registry_path).await?;

    for (name, summary) in registry.summary() {
        let access = if summary.requires_key {
            format!("{} key(s)", summary.key_count)
        } else {
            "open".to_string()
        };
        println!("{name}\t{}\t{access}", summary.url);
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pressroom::main",
        addr = %settings.server.addr,
        environment = settings.server.environment.as_str(),
        "listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown::signal().await;
        let _ = signalled_tx.send(());
    })
    .into_future();

    let drain_timeout = settings.server.shutdown_timeout;
    let drain_deadline = async move {
        if signalled_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline => {
            warn!(
                target = "pressroom::main",
                timeout_secs = drain_timeout.as_secs(),
                "in-flight requests did not drain in time"
            );
        }
    }

    Ok(())
}
