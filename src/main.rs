use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use userhub::auth::SessionManager;
use userhub::configuration::get_configuration;
use userhub::startup::run;
use userhub::store::{PgIdentityRepository, PgSessionStore};
use userhub::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let checked = configuration
        .jwt
        .validate()
        .and_then(|_| configuration.session.validate())
        .and_then(|_| configuration.password.validate());
    if let Err(e) = checked {
        tracing::error!("Invalid configuration: {}", e);
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let manager = SessionManager::new(
        Arc::new(PgIdentityRepository::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool)),
        configuration.jwt.clone(),
        configuration.session.clone(),
        &configuration.password,
    );

    let address = format!("127.0.0.1:{}", configuration.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, manager)?;
    server.await
}
