use tokenwarden::configuration::get_configuration;
use tokenwarden::startup::Application;
use tokenwarden::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    tracing::info!("Configuration loaded successfully");

    let application = Application::build(configuration).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Startup error")
    })?;

    application.run_until_stopped().await
}
