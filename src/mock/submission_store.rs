//! Repository of mocked submissions
//!
//! One store is shared by all facades of a [`MockBackend`]. A single lock
//! guards every access; the mock serves test traffic only.
//!
//! [`MockBackend`]: crate::mock::facade::MockBackend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::mock::error::{FacadeError, FacadeResult};
use crate::mock::settings::MockSettings;
use crate::mock::state::SubmissionState;
use crate::mock::submission::{Submission, SubmissionContent};
use crate::mock::task::Task;

#[derive(Debug, Default)]
struct Inner {
    next_submission_id: u64,
    submissions: HashMap<u64, Submission>,
    settings: Arc<MockSettings>,
}

impl Inner {
    fn submission(&mut self, submission_id: u64) -> FacadeResult<&mut Submission> {
        self.submissions
            .get_mut(&submission_id)
            .ok_or(FacadeError::SubmissionNotFound(submission_id))
    }
}

#[derive(Debug, Default)]
pub struct SubmissionStore {
    inner: Mutex<Inner>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        SubmissionStore::default()
    }

    /// Replace the settings used for new submissions and new replays
    pub fn apply_settings(&self, settings: Arc<MockSettings>) {
        debug!("Applying mock settings: {:?}", settings);
        self.lock().settings = settings;
    }

    pub fn settings(&self) -> Arc<MockSettings> {
        Arc::clone(&self.lock().settings)
    }

    /// Create a submission, returning its id
    pub fn add_submission(&self, subject: &str, contents: Vec<SubmissionContent>) -> u64 {
        let mut inner = self.lock();
        let submission = Submission::new(subject, contents, &inner.settings);
        let id = inner.next_submission_id;
        inner.next_submission_id += 1;
        debug!(
            "Created submission {} with {} tasks.",
            id,
            submission.tasks().len()
        );
        inner.submissions.insert(id, submission);
        id
    }

    pub fn cancel_submission(&self, submission_id: u64) -> FacadeResult<()> {
        let mut inner = self.lock();
        inner.submission(submission_id)?.cancel();
        debug!("Cancelled submission {}.", submission_id);
        Ok(())
    }

    /// Reported state of a submission, advancing its replay if any
    pub fn submission_state(&self, submission_id: u64) -> FacadeResult<SubmissionState> {
        let mut inner = self.lock();
        let settings = Arc::clone(&inner.settings);
        let submission = inner.submission(submission_id)?;
        Ok(submission.state(settings.submission_states()))
    }

    pub fn completed_tasks(&self, submission_id: u64) -> FacadeResult<Vec<Arc<Task>>> {
        let mut inner = self.lock();
        Ok(inner.submission(submission_id)?.completed_tasks())
    }

    pub fn cancelled_tasks(&self, submission_id: u64) -> FacadeResult<Vec<Arc<Task>>> {
        let mut inner = self.lock();
        Ok(inner.submission(submission_id)?.cancelled_tasks())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::state::TaskState;
    use crate::mock::submission_states::MockSubmissionStates;
    use serde_json::json;
    use std::thread;

    fn contents(locales: &[&str]) -> Vec<SubmissionContent> {
        vec![SubmissionContent {
            file_id: "file".to_string(),
            content: "<xliff/>".to_string(),
            target_locales: locales.iter().map(|l| l.parse().unwrap()).collect(),
        }]
    }

    fn immediate_store() -> SubmissionStore {
        let store = SubmissionStore::new();
        store.apply_settings(Arc::new(MockSettings::new(0, 0).unwrap()));
        store
    }

    // ========== Identity Tests ==========

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let store = SubmissionStore::new();
        assert_eq!(store.add_submission("", contents(&["de"])), 0);
        assert_eq!(store.add_submission("", contents(&["de"])), 1);
    }

    #[test]
    fn test_unknown_id() {
        let store = SubmissionStore::new();
        assert_eq!(
            store.submission_state(99),
            Err(FacadeError::SubmissionNotFound(99))
        );
        assert!(store.cancel_submission(99).is_err());
        assert!(store.completed_tasks(99).is_err());
        assert!(store.cancelled_tasks(99).is_err());
    }

    // ========== State Tests ==========

    #[test]
    fn test_default_settings_keep_submission_started() {
        let store = SubmissionStore::new();
        let id = store.add_submission("", contents(&["de"]));
        assert_eq!(store.submission_state(id), Ok(SubmissionState::Started));
        assert!(store.completed_tasks(id).unwrap().is_empty());
    }

    #[test]
    fn test_huge_configured_delay_keeps_submission_started() {
        let store = SubmissionStore::new();
        let settings = MockSettings::from_mock_config(&json!({
            "stateChangeDelaySeconds": u64::MAX,
            "stateChangeDelayOffsetPercentage": 100
        }))
        .unwrap();
        store.apply_settings(Arc::new(settings));
        let id = store.add_submission("states: other, completed", contents(&["de"]));
        assert_eq!(store.submission_state(id), Ok(SubmissionState::Started));
        let other = store.add_submission("", contents(&["de"]));
        assert_eq!(store.submission_state(other), Ok(SubmissionState::Started));
    }

    #[test]
    fn test_zero_delay_completes_immediately() {
        let store = immediate_store();
        let id = store.add_submission("", contents(&["de", "fr"]));
        assert_eq!(store.submission_state(id), Ok(SubmissionState::Completed));
        assert_eq!(store.completed_tasks(id).unwrap().len(), 2);
    }

    #[test]
    fn test_cancel() {
        let store = immediate_store();
        let id = store.add_submission("", contents(&["de"]));
        store.cancel_submission(id).unwrap();
        assert_eq!(store.submission_state(id), Ok(SubmissionState::Cancelled));
        let cancelled = store.cancelled_tasks(id).unwrap();
        assert_eq!(cancelled.len(), 1);
        cancelled[0].mark_cancellation_confirmed();
        assert_eq!(
            store.submission_state(id),
            Ok(SubmissionState::CancellationConfirmed)
        );
    }

    // ========== Settings Tests ==========

    #[test]
    fn test_settings_not_retroactive() {
        let store = SubmissionStore::new();
        let slow = store.add_submission("", contents(&["de"]));
        store.apply_settings(Arc::new(MockSettings::new(0, 0).unwrap()));
        let fast = store.add_submission("", contents(&["de"]));
        assert_eq!(store.submission_state(slow), Ok(SubmissionState::Started));
        assert_eq!(store.submission_state(fast), Ok(SubmissionState::Completed));
    }

    #[test]
    fn test_pointcuts_of_current_settings() {
        let store = immediate_store();
        let id = store.add_submission("", contents(&["de"]));
        let states = MockSubmissionStates::from_config(&json!({
            "COMPLETED": { "override": "REVIEW" }
        }));
        store.apply_settings(Arc::new(
            MockSettings::new(0, 0).unwrap().with_submission_states(states),
        ));
        assert_eq!(store.submission_state(id), Ok(SubmissionState::Review));
    }

    // ========== Concurrency Tests ==========

    #[test]
    fn test_concurrent_submissions_get_distinct_ids() {
        let store = Arc::new(immediate_store());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..10)
                        .map(|_| store.add_submission("", contents(&["de"])))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 80);
        for id in ids {
            let tasks = store.completed_tasks(id).unwrap();
            assert_eq!(tasks[0].state(), TaskState::Completed);
        }
    }
}
