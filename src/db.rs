use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Opens (creating if needed) the SQLite database and applies migrations
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Fresh database in a temporary directory; the directory must outlive the pool
#[cfg(test)]
pub(crate) async fn connect_temporary() -> Result<(tempfile::TempDir, SqlitePool), sqlx::Error>
{
    let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
    let url = format!("sqlite://{}", dir.path().join("test.sqlite3").display());
    let pool = connect(&url).await?;
    Ok((dir, pool))
}
