#[macro_use]
extern crate rocket;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

use mongodb::Client;
use rocket::figment::Figment;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::data::{DynStore, HealthDb, MongoStore};
use crate::error::{BackendError, ConfigurationError};
use crate::route::mount_api;
use crate::security::Security;

pub mod config;
pub mod data;
pub mod error;
pub mod middleware;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

/// Sets up logging, loads configuration and security material, connects to
/// MongoDB and builds the server.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    tracing::info!("Loading security material...");
    let security = Security::load()?;

    tracing::info!("Connecting to MongoDB...");
    let client = Client::with_uri_str(c.database_url.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", c.database_name);
    let store = MongoStore::new(client, c.database_name.as_str());

    if let Err(e) = store.ping().await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(e.into());
    }
    data::ensure_indexes(&store).await?;

    build(c, security, Box::new(store))
}

/// Assembles the server around an already connected store.
pub fn build(c: Config, security: Security, store: DynStore) -> Result<Rocket<Build>, BackendError> {
    let figment: Figment = rocket::Config::figment()
        .merge(("port", c.port))
        .merge(("secret_key", security.cookie_key()));

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::custom(figment).manage(c).manage(security).manage(store);

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![
            Method::Get,
            Method::Put,
            Method::Post,
            Method::Delete,
            Method::Patch,
        ]
        .into_iter()
        .map(From::from)
        .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}
