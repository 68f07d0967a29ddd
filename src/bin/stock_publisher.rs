use std::process::ExitCode;
use std::sync::Arc;
use stock_stream::lifecycle::{shutdown_signal, Lifecycle};
use stock_stream::pipeline::StockPublisher;
use stock_stream::rabbitmq::RabbitMQPublisher;
use stock_stream::PipelineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_stream=info,stock_publisher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "🚀 Starting stock publisher for {:?} every {}ms",
        config.symbols,
        config.ticker_interval_ms
    );

    let mut lifecycle = Lifecycle::new();
    let mut connections = Vec::new();

    for (symbol, queue) in config.publisher_routes() {
        // One connection per publisher
        let connection = Arc::new(RabbitMQPublisher::new(config.rabbitmq.clone()));
        if let Err(e) = connection.connect().await {
            tracing::error!("❌ Failed to connect publisher for {}: {}", symbol, e);
            return ExitCode::FAILURE;
        }
        connections.push((symbol.clone(), connection.clone()));

        let mut publisher = StockPublisher::new(symbol.clone(), queue, connection)
            .with_tick_interval(config.ticker_interval())
            .with_publish_timeout(config.rabbitmq.publish_timeout());

        lifecycle.spawn_publisher(symbol, move |token| async move { publisher.run(token).await });
    }

    let summary = lifecycle.run_until(shutdown_signal()).await;

    for (symbol, connection) in connections {
        let stats = connection.stats();
        tracing::info!(
            "📊 {}: {} published, {} failed",
            symbol,
            stats.messages_published,
            stats.messages_failed
        );
        if let Err(e) = connection.disconnect().await {
            tracing::warn!("Failed to close connection for {}: {}", symbol, e);
        }
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
