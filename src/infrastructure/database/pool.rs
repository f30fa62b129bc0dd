use crate::shared::config::DatabaseConfig;
use crate::shared::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Builds the sqlite pool for the configured database, creating the file
/// (and its parent directory) on first run.
pub async fn connect(config: &DatabaseConfig) -> Result<Pool<Sqlite>> {
    if let Some(file) = config.url.strip_prefix("sqlite:") {
        if !file.is_empty() && file != ":memory:" {
            if let Some(dir) = Path::new(file).parent() {
                if !dir.as_os_str().is_empty() && !dir.exists() {
                    std::fs::create_dir_all(dir)?;
                    tracing::info!(target: "docs::db", dir = %dir.display(), "created data directory");
                }
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|err| AppError::ConfigurationError(err.to_string()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_the_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}/nested/drafts.db", dir.path().display()),
            max_connections: 1,
            connection_timeout: 5,
        };

        let pool = connect(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert!(dir.path().join("nested/drafts.db").exists());
    }
}
