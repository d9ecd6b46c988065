//! turret-ingest: bulk event ingestion
//!
//! Reads newline-delimited JSON payloads from stdin and stores each one
//! under the given project, printing the assigned id (or the rejection)
//! per line.
//!
//! ## Usage
//! ```text
//! turret-ingest <project_id> [config.yaml] < events.jsonl
//! ```
//!
//! ## Configuration
//! - TURRET_CONFIG: Path to a YAML config file (optional)
//! - TURRET__STORAGE__TYPE, TURRET__STORAGE__SQLITE__PATH, ...: overrides
//! - TURRET_LOG: Log filter (default: info)

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use turret::config::Config;
use turret::utils::bootstrap::init_tracing;
use turret::{init_storage, EventService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let project_id: i64 = args
        .next()
        .ok_or("usage: turret-ingest <project_id> [config.yaml]")?
        .parse()?;
    let config_path = args.next();

    let config = Config::load(config_path.as_deref())?;
    let store = init_storage(&config.storage).await?;
    let service = EventService::new(store, config.limits.clone());

    info!(project_id, "turret-ingest started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut stored, mut rejected) = (0u64, 0u64);
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match service.ingest(project_id, line.as_bytes()).await {
            Ok(receipt) => {
                stored += 1;
                println!("{}", receipt.id);
            }
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, status = %e.status_code(), error = %e, "Rejected event");
                println!("error: {}", e);
            }
        }
    }

    info!(stored, rejected, "turret-ingest finished");
    Ok(())
}
