use tracing::info;

use crate::{database::PostgresConnection, server::DatabaseOptions};

/// Apply any migrations the database has not seen yet.
pub async fn run_migrations(opts: &DatabaseOptions) -> anyhow::Result<()> {
    let db = PostgresConnection::connect(opts).await?;

    sqlx::migrate!("./migrations-sqlx").run(&*db).await?;
    info!("Database migrations are up to date.");

    Ok(())
}
