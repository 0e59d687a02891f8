// Bulk loader: imports the restaurant spreadsheet export into the directory schema.

use std::{fs::File, io::BufReader, path::PathBuf, time::Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use place_directory::database_ops::{
    db::{ensure_database, Db, PoolSettings},
    loader::{read_sheet, LoadSummary, Loader, TxMode},
    schema,
};
use place_directory::logging;
use place_directory::util::env as env_util;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "load_directory",
    version,
    about = "Import the restaurant spreadsheet into the directory database"
)]
struct Cli {
    /// Spreadsheet exported as delimited text, with its Spanish column headers
    #[arg(default_value = "full.csv")]
    path: PathBuf,
    /// Field separator used by the export
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Commit each row on its own, or the whole file at once
    #[arg(long, value_enum, default_value_t = TxMode::PerRow)]
    mode: TxMode,
    /// Validate the file and report, without touching the database
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Skip CREATE DATABASE (for servers where the loader lacks that privilege)
    #[arg(long = "no-create-database", action = ArgAction::SetTrue)]
    no_create_database: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_util::init_env();
    logging::init_tracing(logging::DEFAULT_FILTER)?;

    let delimiter = u8::try_from(cli.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow!("delimiter must be a single ASCII character"))?;

    let started = Instant::now();
    let file = File::open(&cli.path)
        .with_context(|| format!("failed to open {}", cli.path.display()))?;
    let rows = read_sheet(BufReader::new(file), delimiter)
        .with_context(|| format!("failed to read {}", cli.path.display()))?;
    info!(path = %cli.path.display(), rows = rows.len(), "spreadsheet read");

    if cli.dry_run {
        for parsed in &rows {
            if let Err(err) = &parsed.record {
                warn!(row = parsed.row, error = %err, "row rejected");
            }
        }
        let summary = LoadSummary::validated(&rows);
        info!(?summary, "dry run finished; database untouched");
        return Ok(());
    }

    env_util::preflight_check(
        "load_directory",
        &[],
        &[
            "DATABASE_URL",
            "DB_HOST",
            "DB_PORT",
            "DB_USERNAME",
            "DB_PASSWORD",
            "DB_DATABASE",
            "DB_MAINTENANCE_DATABASE",
        ],
    )?;
    let database_url = env_util::db_url()?;

    if !cli.no_create_database {
        let maintenance_db =
            env_util::env_opt("DB_MAINTENANCE_DATABASE").unwrap_or_else(|| "postgres".into());
        ensure_database(&database_url, &maintenance_db).await?;
    }

    let db = Db::connect(&database_url, PoolSettings::from_env()).await?;
    {
        let mut conn = db.pool.acquire().await?;
        schema::create_tables(&mut conn).await?;
    }

    let summary = Loader::new(db, cli.mode).run(rows).await?;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        rows_read = summary.rows_read,
        inserted = summary.inserted,
        rejected = summary.rejected,
        failed = summary.failed,
        categories_created = summary.categories_created,
        subcategories_created = summary.subcategories_created,
        "import complete"
    );

    if summary.failed > 0 {
        bail!("{} rows failed to load; see log for details", summary.failed);
    }
    Ok(())
}
