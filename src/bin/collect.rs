use chrono::{Local, Utc};
use tracing::error;
use tracing_subscriber::EnvFilter;

use odds_tracker::config::Config;
use odds_tracker::db;
use odds_tracker::jobs::{run_collection, EXIT_FAILURE};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    std::process::exit(run(cfg).await);
}

async fn run(cfg: Config) -> i32 {
    let pool = match db::connect(&cfg.db_path).await {
        Ok(p) => p,
        Err(e) => {
            error!("[COLLECT] cannot open store: {e}");
            return EXIT_FAILURE;
        }
    };

    let today = Local::now().date_naive();
    let code = match run_collection(&cfg, &pool, today, Utc::now()).await {
        Ok(summary) => {
            summary.log();
            summary.exit_code()
        }
        Err(e) => {
            error!("[COLLECT] {today}: {e}");
            e.exit_code()
        }
    };
    pool.close().await;
    code
}
