use std::sync::Arc;

use brandwatch_worker::clustering::KMeansClusterer;
use brandwatch_worker::config::WorkerConfig;
use brandwatch_worker::consumer::QueueConsumer;
use brandwatch_worker::embeddings::build_embedding_adapter;
use brandwatch_worker::http;
use brandwatch_worker::llm::adapter::build_llm_adapter;
use brandwatch_worker::processor::ChunkProcessor;
use brandwatch_worker::result_storage::ResultStorage;
use brandwatch_worker::service::{ReadinessFlag, WorkerService};
use brandwatch_worker::spike::SpikeDetector;
use brandwatch_worker::store::StoreClient;
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() {
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level.as_tracing_level().into()),
        )
        .init();

    tracing::info!(worker_id = %config.worker_id, "brand-mention worker starting");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder");

    let store = match StoreClient::connect(
        &config.redis_url,
        &config.redis_queue_prefix,
        &config.redis_result_prefix,
        &config.redis_failed_prefix,
        &config.redis_spike_prefix,
        config.spike_history_ttl_sec,
        config.max_retries,
        config.retry_backoff_base,
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to the shared store — refusing to start");
            std::process::exit(1);
        }
    };

    let consumer = QueueConsumer::new(
        Arc::clone(&store),
        config.worker_id.clone(),
        config.blpop_timeout_sec,
        config.metrics_wait_log_interval_sec,
    );

    let embedding_adapter = build_embedding_adapter(config.embeddings_provider, config.worker_id.clone());

    let llm_adapter = match build_llm_adapter(&config) {
        Ok(adapter) => adapter,
        Err(err) => {
            tracing::error!(error = %err, "failed to build LLM adapter — refusing to start");
            std::process::exit(1);
        }
    };

    let spike_detector = SpikeDetector::new(Arc::clone(&store) as Arc<dyn brandwatch_worker::spike::SpikeHistoryStore>);

    let processor = ChunkProcessor::new(
        config.worker_id.clone(),
        embedding_adapter,
        llm_adapter,
        Box::new(KMeansClusterer::new()),
        spike_detector,
        config.preprocessing_examples,
    );

    let result_storage = ResultStorage::new(Arc::clone(&store), config.worker_id.clone());

    let service = Arc::new(WorkerService::new(&config, Arc::clone(&store), consumer, processor, result_storage));

    if let Err(err) = service.start().await {
        tracing::error!(error = %err, "failed to start worker service");
        std::process::exit(1);
    }

    let readiness = ReadinessFlag::new();
    readiness.set_ready();

    let health_app = http::health_router(readiness);
    let (health_listener, bound_http_port) = match http::bind_with_fallback(config.http_port).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind health HTTP surface");
            std::process::exit(1);
        }
    };
    tracing::info!(port = bound_http_port, "health surface listening (/healthz, /readyz)");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(health_listener, health_app).await {
            tracing::error!(error = %err, "health HTTP server exited with error");
        }
    });

    let metrics_app = http::metrics_router(metrics_handle);
    let metrics_listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.prometheus_port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port = config.prometheus_port, "failed to bind Prometheus metrics surface");
            std::process::exit(1);
        }
    };
    tracing::info!(port = config.prometheus_port, "metrics surface listening (/metrics)");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app).await {
            tracing::error!(error = %err, "metrics HTTP server exited with error");
        }
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping worker service");
    service.stop().await;
    tracing::info!("worker service stopped, exiting");
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
