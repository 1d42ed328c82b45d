use anyhow::Result;
use sqlx::{
    PgPool, Postgres,
    migrate::MigrateDatabase,
    postgres::PgPoolOptions,
};

use crate::config::Config;

pub mod models;
pub mod repositories;
pub mod transaction;
pub mod utils;

pub async fn init_database(config: &Config) -> Result<PgPool> {
    if !Postgres::database_exists(&config.database_url)
        .await
        .unwrap_or(false)
    {
        log::info!("Creating database");
        Postgres::create_database(&config.database_url).await?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations completed successfully");

    Ok(pool)
}
