use std::process::ExitCode;
use std::sync::Arc;
use stock_stream::database::MongoSink;
use stock_stream::lifecycle::{shutdown_signal, Lifecycle};
use stock_stream::pipeline::StockConsumer;
use stock_stream::rabbitmq::RabbitMQSubscriber;
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
                .unwrap_or_else(|_| "stock_stream=info,stock_consumer=info".into()),
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

    if config.consumer_queues.is_empty() {
        tracing::error!("❌ No queues to consume");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        "🚀 Starting stock consumer for queues {:?} ({:?})",
        config.consumer_queues,
        config.rabbitmq.ack_mode
    );

    let mut lifecycle = Lifecycle::new();

    for queue in &config.consumer_queues {
        // Every consumer gets its own store connection and its own subscription
        let sink = match MongoSink::connect(&config.mongo).await {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("❌ Failed to connect to MongoDB for '{}': {}", queue, e);
                return ExitCode::FAILURE;
            }
        };
        tracing::info!("🗄️  Queue '{}' persists into {}", queue, sink.collection_name());

        let subscriber = match RabbitMQSubscriber::connect(&config.rabbitmq, queue).await {
            Ok(subscriber) => subscriber,
            Err(e) => {
                tracing::error!("❌ Failed to subscribe to '{}': {}", queue, e);
                return ExitCode::FAILURE;
            }
        };

        let mut consumer = StockConsumer::new(queue.clone(), subscriber, Arc::new(sink))
            .with_ack_mode(config.rabbitmq.ack_mode)
            .with_requeue_delay(config.rabbitmq.requeue_delay());

        lifecycle.spawn_consumer(queue.clone(), move |token| async move {
            let result = consumer.run(token).await;
            consumer.into_receiver().close().await;
            result
        });
    }

    let summary = lifecycle.run_until(shutdown_signal()).await;

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
