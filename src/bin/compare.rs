use chrono::Local;
use tracing::error;
use tracing_subscriber::EnvFilter;

use odds_tracker::config::Config;
use odds_tracker::db::{self, SnapshotLoader};
use odds_tracker::jobs::{run_comparison, EXIT_FAILURE, EXIT_OK};
use odds_tracker::notify::build_registry;

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
    let notifiers = match build_registry(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!("[COMPARE] cannot set up notifications: {e}");
            return EXIT_FAILURE;
        }
    };
    let pool = match db::connect(&cfg.db_path).await {
        Ok(p) => p,
        Err(e) => {
            error!("[COMPARE] cannot open store: {e}");
            return EXIT_FAILURE;
        }
    };
    let loader = SnapshotLoader::new(pool.clone());

    let code = match run_comparison(&cfg, &loader, &notifiers, Local::now().date_naive()).await {
        Ok(summary) => {
            summary.log();
            EXIT_OK
        }
        Err(e) => {
            error!("[COMPARE] {e}");
            e.exit_code()
        }
    };
    pool.close().await;
    code
}
