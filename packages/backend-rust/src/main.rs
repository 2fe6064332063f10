use std::sync::Arc;

use tokio::io::BufReader;

use kapian_backend::config::Config;
use kapian_backend::logging::init_tracing;
use kapian_backend::services::replay::run_replay;
use kapian_backend::services::study_session::StudySession;
use kapian_backend::store::MemoryStudyRecordStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    tracing::info!(
        mode = %config.study_mode,
        request_retention = config.fsrs.request_retention,
        maximum_interval = config.fsrs.maximum_interval,
        enable_fuzz = config.fsrs.enable_fuzz,
        "replay starting"
    );

    let store = Arc::new(MemoryStudyRecordStore::new());
    let session = StudySession::from_config(Arc::clone(&store), &config);

    let reader = BufReader::new(tokio::io::stdin());
    match run_replay(&session, reader, tokio::io::stdout()).await {
        Ok(summary) => {
            tracing::info!(
                reviewed = summary.tally.reviewed,
                correct = summary.tally.correct,
                accuracy = summary.tally.accuracy(),
                skipped = summary.skipped,
                records = store.len(),
                "replay complete"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "replay aborted");
            std::process::exit(1);
        }
    }
}
