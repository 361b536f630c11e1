#[macro_use]
extern crate rocket;

mod api;
mod commands;
mod db;
mod env;
mod error;
mod models;
mod query;
mod telemetry;
#[cfg(test)]
mod test;

use std::str::FromStr;

use api::{
    api_add_user_to_procedure, api_get_procedure_users, api_get_procedures, api_get_users,
    api_remove_user_from_procedure, health,
};
use env::{AppEnv, load_environment};
use error::AppError;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment()?;
    let app_env = AppEnv::from_env();
    init_tracing(&app_env)?;

    info!(profile = %app_env.profile, "Starting plan procedures service");

    let pool = connect(&app_env.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    init_rocket(pool).launch().await?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub fn init_rocket(pool: Pool<Sqlite>) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .mount(
            "/",
            routes![
                api_get_procedures,
                api_get_procedure_users,
                api_get_users,
                api_add_user_to_procedure,
                api_remove_user_from_procedure,
                health,
            ],
        )
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
}
