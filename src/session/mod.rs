use crate::error::SurveyError;
use crate::models::{Category, RoundRecord};
use crate::store::ResultsStore;
use crate::survey::{CompletedRound, GroupedFolders, RoundState, final_scores, images_for_round};
use chrono::{DateTime, Duration, Local, Utc};
use log::info;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FinalReport {
    pub scores: BTreeMap<Category, u32>,
    pub snapshot: PathBuf,
}

#[derive(Debug)]
enum Phase {
    Ranking(RoundState),
    /// Every round is recorded but the snapshot is not written yet.
    /// Next on `last_round` retries it.
    Finalizing { last_round: u32 },
    Finished(FinalReport),
}

#[derive(Debug)]
pub enum Advance {
    NextRound(u32),
    Finished(FinalReport),
}

/// One evaluator's run through the survey.
#[derive(Debug)]
pub struct SurveySession {
    id: Uuid,
    user_id: String,
    total_rounds: u32,
    folders: GroupedFolders,
    phase: Phase,
    completed: Vec<CompletedRound>,
    last_activity: DateTime<Utc>,
}

impl SurveySession {
    pub fn start<R: Rng + ?Sized>(
        user_id: impl Into<String>,
        folders: GroupedFolders,
        total_rounds: u32,
        rng: &mut R,
    ) -> Result<Self, SurveyError> {
        let first =
            Self::next_round_from(&folders, total_rounds, 1, rng).ok_or(SurveyError::NoImages)?;
        let session = Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            total_rounds,
            folders,
            phase: Phase::Ranking(first),
            completed: Vec::new(),
            last_activity: Utc::now(),
        };
        info!(
            "Started survey session {} for user {}",
            session.id, session.user_id
        );
        Ok(session)
    }

    /// First round at or after `from` that has at least one image.
    fn next_round_from<R: Rng + ?Sized>(
        folders: &GroupedFolders,
        total_rounds: u32,
        from: u32,
        rng: &mut R,
    ) -> Option<RoundState> {
        (from..=total_rounds).find_map(|round| {
            let images = images_for_round(folders, round, rng);
            if images.is_empty() {
                info!("Round {} has no images, skipping", round);
                None
            } else {
                Some(RoundState::new(round, images))
            }
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn completed_rounds(&self) -> usize {
        self.completed.len()
    }

    pub fn current_round(&self) -> Option<&RoundState> {
        match &self.phase {
            Phase::Ranking(state) => Some(state),
            _ => None,
        }
    }

    pub fn current_round_mut(&mut self) -> Option<&mut RoundState> {
        match &mut self.phase {
            Phase::Ranking(state) => Some(state),
            _ => None,
        }
    }

    /// Last recorded round while the final snapshot is still unwritten.
    pub fn finalizing_round(&self) -> Option<u32> {
        match &self.phase {
            Phase::Finalizing { last_round } => Some(*last_round),
            _ => None,
        }
    }

    /// Round whose buttons are live: the one being ranked, or the last one
    /// while finalization is pending.
    pub fn active_round(&self) -> Option<u32> {
        self.current_round()
            .map(|state| state.round())
            .or_else(|| self.finalizing_round())
    }

    pub fn final_report(&self) -> Option<&FinalReport> {
        match &self.phase {
            Phase::Finished(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Records the current round and moves on. A failed write leaves the
    /// session where it was.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        store: &ResultsStore,
        rng: &mut R,
    ) -> Result<Advance, SurveyError> {
        self.advance_at(store, rng, Local::now())
    }

    /// `advance` with the snapshot timestamp supplied by the caller.
    pub fn advance_at<R: Rng + ?Sized>(
        &mut self,
        store: &ResultsStore,
        rng: &mut R,
        at: DateTime<Local>,
    ) -> Result<Advance, SurveyError> {
        if let Phase::Ranking(state) = &self.phase {
            let ranking = state.validate()?;
            let round = state.round();
            store.record_round(RoundRecord {
                round,
                ranking: ranking.clone(),
            })?;
            info!("Session {} ({}) recorded round {}", self.id, self.user_id, round);

            self.completed.push(CompletedRound {
                round,
                images: state.images().to_vec(),
                ranking,
            });
            match Self::next_round_from(&self.folders, self.total_rounds, round + 1, rng) {
                Some(next) => {
                    let number = next.round();
                    self.phase = Phase::Ranking(next);
                    return Ok(Advance::NextRound(number));
                }
                None => self.phase = Phase::Finalizing { last_round: round },
            }
        }

        match &self.phase {
            Phase::Finalizing { .. } => {
                let scores = final_scores(&self.completed);
                let snapshot = store.finalize(&scores, at)?;
                let report = FinalReport { scores, snapshot };
                info!("Session {} complete: {:?}", self.id, report.scores);
                self.phase = Phase::Finished(report.clone());
                Ok(Advance::Finished(report))
            }
            _ => Err(SurveyError::AlreadyComplete),
        }
    }
}

/// In-memory sessions keyed by Discord user id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SurveySession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, SurveySession>> {
        self.sessions.lock().await
    }

    /// Drops sessions idle for longer than `ttl`. Returns how many were removed.
    pub async fn remove_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity() <= ttl);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::group_folders;
    use chrono::TimeZone;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn make_images(base: &Path, rounds: &[u32]) {
        for round in rounds {
            for category in Category::ALL {
                let dir = base.join(format!("{}_{}", category, round));
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join("img.png"), b"img").unwrap();
            }
        }
    }

    fn rank_all(session: &mut SurveySession) {
        let state = session.current_round_mut().unwrap();
        for i in 0..state.images().len() {
            state.click(i);
        }
    }

    #[test]
    fn walks_all_rounds_and_finalizes_once() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        make_images(&images, &[1, 2, 3]);
        let store = ResultsStore::open(tmp.path().join("ranking_results.json"));
        let folders = group_folders(&images, 3).unwrap();
        let mut rng = rand::rng();

        let mut session = SurveySession::start("user-1", folders, 3, &mut rng).unwrap();
        assert_eq!(session.current_round().unwrap().round(), 1);

        for expected_next in [2, 3] {
            rank_all(&mut session);
            match session.advance(&store, &mut rng).unwrap() {
                Advance::NextRound(n) => assert_eq!(n, expected_next),
                other => panic!("unexpected {other:?}"),
            }
        }
        rank_all(&mut session);
        let report = match session.advance(&store, &mut rng).unwrap() {
            Advance::Finished(report) => report,
            other => panic!("unexpected {other:?}"),
        };

        assert!(session.is_finished());
        assert_eq!(report.scores.values().sum::<u32>(), 3 * (4 + 3 + 2 + 1));
        assert!(report.snapshot.exists());
        assert_eq!(store.results().rounds.len(), 3);
        assert_eq!(store.results().final_scores.len(), 4);
        assert!(matches!(
            session.advance(&store, &mut rng),
            Err(SurveyError::AlreadyComplete)
        ));
    }

    #[test]
    fn incomplete_round_does_not_advance() {
        let tmp = TempDir::new().unwrap();
        make_images(tmp.path(), &[1, 2]);
        let store = ResultsStore::open(tmp.path().join("out.json"));
        let folders = group_folders(tmp.path(), 10).unwrap();
        let mut rng = rand::rng();
        let mut session = SurveySession::start("user-1", folders, 10, &mut rng).unwrap();

        session.current_round_mut().unwrap().click(0);
        assert!(matches!(
            session.advance(&store, &mut rng),
            Err(SurveyError::Ranking(_))
        ));
        assert_eq!(session.current_round().unwrap().round(), 1);
        assert!(store.results().rounds.is_empty());
    }

    #[test]
    fn empty_rounds_are_skipped() {
        let tmp = TempDir::new().unwrap();
        make_images(tmp.path(), &[2, 5]);
        let store = ResultsStore::open(tmp.path().join("out.json"));
        let folders = group_folders(tmp.path(), 10).unwrap();
        let mut rng = rand::rng();
        let mut session = SurveySession::start("user-1", folders, 10, &mut rng).unwrap();

        assert_eq!(session.current_round().unwrap().round(), 2);
        rank_all(&mut session);
        assert!(matches!(
            session.advance(&store, &mut rng).unwrap(),
            Advance::NextRound(5)
        ));
        rank_all(&mut session);
        assert!(matches!(
            session.advance(&store, &mut rng).unwrap(),
            Advance::Finished(_)
        ));
    }

    #[test]
    fn failed_snapshot_is_retried_without_recording_twice() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        make_images(&images, &[1]);
        let store = ResultsStore::open(tmp.path().join("ranking_results.json"));
        let folders = group_folders(&images, 1).unwrap();
        let mut rng = rand::rng();
        let at = Local.with_ymd_and_hms(2026, 10, 16, 19, 57, 36).unwrap();

        // A directory where the snapshot's temp file goes makes the write fail.
        let blocker = tmp.path().join("ranking_results_20261016_195736.tmp");
        fs::create_dir(&blocker).unwrap();

        let mut session = SurveySession::start("user-1", folders, 1, &mut rng).unwrap();
        rank_all(&mut session);
        assert!(matches!(
            session.advance_at(&store, &mut rng, at),
            Err(SurveyError::WriteResults { .. })
        ));
        assert!(session.current_round().is_none());
        assert!(!session.is_finished());
        assert_eq!(session.finalizing_round(), Some(1));
        assert_eq!(session.active_round(), Some(1));
        assert_eq!(store.results().rounds.len(), 1);

        fs::remove_dir(&blocker).unwrap();
        let report = match session.advance_at(&store, &mut rng, at).unwrap() {
            Advance::Finished(report) => report,
            other => panic!("unexpected {other:?}"),
        };
        assert!(report.snapshot.exists());
        assert!(session.is_finished());
        assert_eq!(session.active_round(), None);
        assert_eq!(store.results().rounds.len(), 1);
    }

    #[test]
    fn no_images_at_all_is_an_error() {
        let mut rng = rand::rng();
        let err = SurveySession::start("user-1", GroupedFolders::new(), 10, &mut rng).unwrap_err();
        assert!(matches!(err, SurveyError::NoImages));
    }

    #[tokio::test]
    async fn idle_sessions_are_reaped() {
        let tmp = TempDir::new().unwrap();
        make_images(tmp.path(), &[1]);
        let folders = group_folders(tmp.path(), 10).unwrap();
        let registry = SessionRegistry::new();
        let now = Utc::now();
        {
            let mut rng = rand::rng();
            let mut stale = SurveySession::start("old", folders.clone(), 10, &mut rng).unwrap();
            stale.touch(now - Duration::minutes(90));
            let fresh = SurveySession::start("new", folders, 10, &mut rng).unwrap();
            let mut sessions = registry.lock().await;
            sessions.insert("old".to_string(), stale);
            sessions.insert("new".to_string(), fresh);
        }

        let removed = registry.remove_idle(now, Duration::minutes(60)).await;
        assert_eq!(removed, 1);
        assert!(registry.lock().await.contains_key("new"));
    }
}
