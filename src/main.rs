use anyhow::Result;
use aws_config::BehaviorVersion;
use clap::Parser;
use kinesis_getrecords::monitoring::{MetricsAggregator, MonitoringConfig};
use kinesis_getrecords::{ConsumerConfig, GetRecordsConsumer, OrderProcessor};
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Poll every shard of a Kinesis stream from the trim horizon and log the
/// orders found in it
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Name of the Kinesis stream to consume
    stream_name: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Args { stream_name } = Args::parse();
    info!("Starting GetRecords consumer");

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = aws_sdk_kinesis::Client::new(&sdk_config);

    let config = ConsumerConfig {
        monitoring: MonitoringConfig {
            enabled: true,
            ..Default::default()
        },
        ..ConsumerConfig::new(stream_name)
    };
    let metrics_interval = config.monitoring.metrics_interval;

    let (consumer, monitoring_rx) = GetRecordsConsumer::new(config, OrderProcessor::new(), client)?;
    let metrics_task = monitoring_rx
        .map(|rx| tokio::spawn(MetricsAggregator::new(metrics_interval, rx).run()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down program");
        let _ = shutdown_tx.send(true);
    });

    let result = consumer.run(shutdown_rx).await;

    // Releases the shared Kinesis client and closes the monitoring channel
    drop(consumer);
    info!("Kinesis client closed");

    if let Some(task) = metrics_task {
        if tokio::time::timeout(METRICS_FLUSH_TIMEOUT, task).await.is_err() {
            warn!("Timed out flushing final metrics");
        }
    }

    Ok(result?)
}

const METRICS_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
