// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::application::actuation_service::ActuationChannelManager;
use crate::application::classifier_port::ClassifierPort;
use crate::application::frame_loop::FrameControlLoop;
use crate::application::pilot_service::PilotService;
use crate::infrastructure::config::load_pilot_config;
use crate::infrastructure::remote_classifier::RemoteClassifier;
use crate::infrastructure::serial_link::SerialConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_pilot_config()?;

    // Classifier (infrastructure layer); a missing model disables actuation, not the service
    let classifier = Arc::new(RemoteClassifier::new(
        config.classifier.endpoint.clone(),
        config.classifier.request_timeout(),
    )?);
    let model = match classifier.load_model(&config.classifier.model_path).await {
        Ok(model) => Some(model),
        Err(e) => {
            tracing::error!(
                "Could not load model {}: {}; frames will not be classified",
                config.classifier.model_path.display(),
                e
            );
            None
        }
    };

    // Vehicle link (infrastructure layer)
    let connector = Arc::new(SerialConnector::new(
        config.link.port.clone(),
        config.link.open_timeout(),
        config.link.write_timeout(),
    ));
    let actuation = ActuationChannelManager::new(
        connector,
        config.link.baud_rate,
        config.link.speed_multiplier,
    );

    // Control loop (application layer)
    let control_loop = FrameControlLoop::new(
        classifier,
        model,
        config.classifier.labels_path.clone(),
        config.mapper()?,
    );
    let (pilot, worker) = PilotService::spawn(control_loop, actuation, config.server.frame_queue);

    // Build router (presentation layer)
    let shutdown_pilot = pilot.clone();
    let router = build_router(Arc::new(AppState { pilot }));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("Starting thirdeye-pilot on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends the status streams too, so open SSE clients do not hold the server up
            shutdown_pilot.shutdown();
        })
        .await?;

    // The worker stops the vehicle before exiting
    worker.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
