use clap::Parser;
use nfcsec_lib::SqliteAuditStore;
use std::error::Error;
use std::path::PathBuf;

/// Show the newest entries of the audit trail
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database written by the gateway
    #[arg(short, long, default_value = "uids.db")]
    database: PathBuf,
    /// Number of rows to show
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,
    /// One JSON object per line instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if !cli.database.exists() {
        return Err(format!("no audit database at {:?}", cli.database).into());
    }
    let store = SqliteAuditStore::open(&cli.database)?;
    let rows = store.recent(cli.limit)?;

    if cli.json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    println!("{} of {} records", rows.len(), store.count()?);
    println!(
        "{:>6}  {:<24}  {:<20}  {:<6}  {:<6}  {:<20}  {:<5}  {}",
        "id", "timestamp", "device", "auth", "topic", "uid", "valid", "error"
    );
    for row in &rows {
        let r = &row.record;
        println!(
            "{:>6}  {:<24}  {:<20}  {:<6}  {:<6}  {:<20}  {:<5}  {}",
            row.id,
            r.timestamp,
            r.username,
            r.auth_state,
            r.topic,
            r.uid_tag.as_deref().unwrap_or("-"),
            r.tag_state,
            r.error.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
