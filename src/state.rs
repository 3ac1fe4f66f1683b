use crate::config::SurveyConfig;
use crate::session::SessionRegistry;
use crate::store::ResultsStore;

/// Shared by every interaction handler and background task.
pub struct AppState {
    pub config: SurveyConfig,
    pub store: ResultsStore,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: SurveyConfig) -> Self {
        let store = ResultsStore::open(config.results_file.clone());
        Self {
            config,
            store,
            sessions: SessionRegistry::new(),
        }
    }
}
