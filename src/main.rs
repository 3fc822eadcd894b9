use std::{future::IntoFuture, path::Path, process, sync::Arc};

use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vellum::{
    application::{
        content::{ContentCache, ContentConfig, ContentService},
        error::AppError,
    },
    cache::CacheConfig,
    config,
    domain::fallback::FallbackDataset,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        remote::RestContentSource,
        telemetry,
        transport::ReqwestTransport,
    },
    network::{
        CacheRegistry, CachingTransport, FsPartitions, MemoryPartitions, NetworkConfig,
        PartitionStore, StrategyRules, Transport, spawn_control, spawn_eviction_sweep,
    },
};

const CONTROL_BUFFER: usize = 32;

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Network(args) => run_network(settings, args.command).await,
        config::Command::Fallback(args) => match args.command {
            config::FallbackCommand::Check => run_fallback_check(&settings).await,
        },
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let remote = settings.remote.clone().ok_or_else(|| {
        InfraError::configuration("remote.base_url must be set to serve content")
    })?;
    let fallback = Arc::new(load_fallback(settings.fallback.path.as_deref()).await?);

    let transport = build_network(&settings)?;
    let installed = transport.install().await;
    let deleted = transport.activate().await.map_err(InfraError::from)?;
    info!(
        version = transport.registry().version(),
        precached = installed.stored,
        precache_failed = installed.failed,
        stale_partitions = deleted.len(),
        "network cache ready"
    );

    let sweep = spawn_eviction_sweep(
        transport.registry().clone(),
        transport.registry().config().eviction_interval,
    );
    let (control, control_worker) = spawn_control(transport.clone(), CONTROL_BUFFER);

    let source = RestContentSource::new(
        Arc::new(transport.clone()),
        &remote.base_url,
        &remote.table,
        remote.api_key.clone(),
    )?;
    let cache = Arc::new(ContentCache::new(CacheConfig::from(&settings.cache)));
    let content = Arc::new(ContentService::new(
        Arc::new(source),
        cache,
        fallback,
        ContentConfig::from(&settings),
    ));

    if settings.server.admin_token.is_none() {
        warn!("server.admin_token is not set; mutation and maintenance routes are open");
    }

    let state = HttpState {
        content,
        registry: transport.registry().clone(),
        control,
        admin_token: settings.server.admin_token.as_deref().map(Arc::from),
    };

    let result = serve_http(&settings, http::build_router(state)).await;

    sweep.abort();
    let _ = sweep.await;
    control_worker.abort();
    let _ = control_worker.await;

    result
}

/// One-shot maintenance of the persisted partitions.
async fn run_network(
    settings: config::Settings,
    command: config::NetworkCommand,
) -> Result<(), AppError> {
    if settings.network.storage_dir.is_none() {
        warn!("network.storage_dir is not set; operating on an empty in-memory store");
    }

    let transport = build_network(&settings)?;
    match command {
        config::NetworkCommand::Activate => {
            let deleted = transport.activate().await.map_err(InfraError::from)?;
            info!(deleted = ?deleted, "activation complete");
        }
        config::NetworkCommand::Clear => {
            transport
                .registry()
                .clear_all()
                .await
                .map_err(InfraError::from)?;
        }
        config::NetworkCommand::Populate { urls } => {
            let report = transport.populate(&urls).await;
            if report.failed > 0 {
                return Err(AppError::unexpected(format!(
                    "{} of {} URLs could not be stored",
                    report.failed,
                    urls.len()
                )));
            }
        }
    }

    let stats = transport
        .registry()
        .stats()
        .await
        .map_err(InfraError::from)?;
    for partition in stats.partitions {
        info!(partition = %partition.name, entries = partition.entries, "partition");
    }
    Ok(())
}

async fn run_fallback_check(settings: &config::Settings) -> Result<(), AppError> {
    let dataset = load_fallback(settings.fallback.path.as_deref()).await?;
    let categories: Vec<&str> = dataset.category_ids().collect();
    info!(
        version = dataset.version(),
        items = dataset.len(),
        featured = dataset.featured().len(),
        categories = ?categories,
        "fallback dataset is valid"
    );
    Ok(())
}

async fn load_fallback(path: Option<&Path>) -> Result<FallbackDataset, AppError> {
    let dataset = match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(InfraError::from)?;
            FallbackDataset::from_toml(&raw)?
        }
        None => FallbackDataset::embedded()?,
    };
    Ok(dataset)
}

fn build_network(settings: &config::Settings) -> Result<CachingTransport, AppError> {
    let network = NetworkConfig::from(&settings.network);
    let store: Arc<dyn PartitionStore> = match network.storage_dir.as_ref() {
        Some(dir) => Arc::new(FsPartitions::new(dir.clone())),
        None => Arc::new(MemoryPartitions::new()),
    };
    let registry = Arc::new(CacheRegistry::new(store, network));
    let inner: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(settings.timeouts.request)?);
    Ok(CachingTransport::new(
        inner,
        registry,
        StrategyRules::standard(),
    ))
}

async fn serve_http(settings: &config::Settings, router: axum::Router) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let (stop, stopped) = oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => return flatten_server(joined),
        () = shutdown_signal() => {}
    }

    info!("shutdown requested; draining connections");
    let _ = stop.send(());
    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server(joined),
        Err(_) => {
            warn!(
                after_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
