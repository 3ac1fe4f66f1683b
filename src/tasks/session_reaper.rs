use crate::state::AppState;
use chrono::{Duration, Utc};
use log::info;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::interval;

const CHECK_INTERVAL_SECONDS: u64 = 60;

/// Drops sessions nobody has touched for `session_ttl_minutes`. Rounds they
/// already saved stay in the results file.
pub async fn reap_idle_sessions_task(state: Arc<AppState>) {
    let ttl = Duration::minutes(state.config.session_ttl_minutes);
    info!(
        "Starting background task to drop sessions idle for more than {} minute(s)",
        ttl.num_minutes()
    );
    let mut interval = interval(StdDuration::from_secs(CHECK_INTERVAL_SECONDS));

    loop {
        interval.tick().await;
        let removed = state.sessions.remove_idle(Utc::now(), ttl).await;
        if removed > 0 {
            info!("Dropped {} idle survey session(s)", removed);
        }
    }
}
