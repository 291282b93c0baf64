use dotenvy::dotenv;
use glob::glob;
use std::fs;
use std::path::Path;
use tokio_postgres::NoTls;

use flights_posting_api::database::MIGRATIONS;

/// Migration files from `migrations/`, falling back to the copies built into the binary
fn load_migrations() -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    let mut files: Vec<String> = glob("migrations/V*.sql")?
        .filter_map(Result::ok)
        .map(|path| path.to_string_lossy().to_string())
        .collect();

    if files.is_empty() {
        log::info!("No migrations/ directory here, using bundled migrations");
        return Ok(MIGRATIONS
            .iter()
            .map(|(name, sql)| (name.to_string(), sql.to_string()))
            .collect());
    }

    // Flyway-style names sort into apply order
    files.sort();

    let mut migrations = Vec::with_capacity(files.len());
    for file in files {
        let name = Path::new(&file)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&file)
            .to_string();
        let sql = fs::read_to_string(&file)?;
        migrations.push((name, sql));
    }
    Ok(migrations)
}

/// `V2__posts.sql` -> `posts`
fn describe(name: &str) -> String {
    name.trim_end_matches(".sql")
        .split_once("__")
        .map(|(_, rest)| rest.replace('_', " "))
        .unwrap_or_else(|| name.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set in environment")?;

    let (mut client, connection) = tokio_postgres::connect(&database_url, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("connection error: {}", e);
        }
    });

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version VARCHAR(100) PRIMARY KEY,
                description TEXT,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let migrations = load_migrations()?;
    if migrations.is_empty() {
        log::info!("No migration files found");
        return Ok(());
    }

    for (name, sql) in migrations {
        let applied = client
            .query_opt("SELECT version FROM schema_migrations WHERE version = $1", &[&name])
            .await?;

        if applied.is_some() {
            log::info!("Skipping already-applied migration: {}", name);
            continue;
        }

        log::info!("Applying migration: {}", name);

        // One transaction per file
        let txn = client.transaction().await?;
        txn.batch_execute(&sql).await?;
        txn.execute(
            "INSERT INTO schema_migrations (version, description) VALUES ($1, $2)",
            &[&name, &describe(&name)],
        )
        .await?;
        txn.commit().await?;

        log::info!("Applied: {}", name);
    }

    log::info!("Migrations complete");
    Ok(())
}
