use mongodb::{options::ClientOptions, Client, Database};
use std::env;

use crate::utils::error::{AppError, AppResult};

pub async fn init_db(mongo_uri: &str) -> AppResult<Database> {
    let db_name = env::var("DB_NAME").unwrap_or_else(|_| "polling".to_string());

    let mut client_options = ClientOptions::parse(mongo_uri)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse MongoDB URI: {}", e)))?;

    client_options.app_name = Some("PollingApp".to_string());

    let client = Client::with_options(client_options).map_err(|e| {
        AppError::DatabaseError(format!("Failed to initialize MongoDB client: {}", e))
    })?;

    tracing::info!(db = %db_name, "database connection configured");

    Ok(client.database(&db_name))
}
