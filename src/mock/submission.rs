//! Mocked submissions
//!
//! A submission bundles the tasks for all contents and target locales sent
//! to the backend in one request. Its state is derived from the states of
//! its tasks on every read (see [`aggregate_state`]); the only thing a
//! submission remembers on its own is an active state replay.
//!
//! The subject of a submission may control the task timelines: a subject
//! starting with `states:` followed by comma-separated task states (see
//! [`parse_task_states_csv`]) makes every task step through exactly these
//! states instead of just completing after some delay.
//!
//! ```ignore
//! // Every task becomes CANCELLED after the second delay.
//! let subject = "states: other, cancelled";
//! ```

use std::sync::Arc;
use std::time::Instant;

use icu_locale::Locale;
use tracing::{debug, trace};

use crate::mock::settings::MockSettings;
use crate::mock::state::{SubmissionState, TaskState, parse_task_states_csv};
use crate::mock::submission_states::{MockSubmissionStates, ReplayScenario};
use crate::mock::task::{Task, Timeline};

const STATES_DIRECTIVE: &str = "states:";

/// A content which is part of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContent {
    pub file_id: String,
    pub content: String,
    pub target_locales: Vec<Locale>,
}

/// Task states requested by the subject, if any
pub fn parse_subject_directive(subject: &str) -> Vec<TaskState> {
    let subject = subject.trim().to_lowercase();
    match subject.strip_prefix(STATES_DIRECTIVE) {
        Some(states) => parse_task_states_csv(states),
        None => Vec::new(),
    }
}

/// Aggregate task states to a submission state
///
/// The first matching rule wins:
///
/// 1. some task CANCELLATION_CONFIRMED, all others DELIVERED or
///    CANCELLATION_CONFIRMED: CANCELLATION_CONFIRMED
/// 2. any task CANCELLED: CANCELLED
/// 3. all tasks DELIVERED: DELIVERED
/// 4. all tasks COMPLETED or DELIVERED: COMPLETED
/// 5. otherwise: STARTED
///
/// Rule 1 must come before rule 2, as a confirmed cancellation would
/// otherwise be reported as a plain cancellation.
pub fn aggregate_state(states: &[TaskState]) -> SubmissionState {
    let any = |wanted: TaskState| states.iter().any(|s| *s == wanted);
    let all = |accept: &dyn Fn(TaskState) -> bool| states.iter().all(|s| accept(*s));

    if any(TaskState::CancellationConfirmed)
        && all(&|s| matches!(s, TaskState::Delivered | TaskState::CancellationConfirmed))
    {
        SubmissionState::CancellationConfirmed
    } else if any(TaskState::Cancelled) {
        SubmissionState::Cancelled
    } else if all(&|s| s == TaskState::Delivered) {
        SubmissionState::Delivered
    } else if all(&|s| matches!(s, TaskState::Completed | TaskState::Delivered)) {
        SubmissionState::Completed
    } else {
        SubmissionState::Started
    }
}

#[derive(Debug)]
pub struct Submission {
    tasks: Vec<Arc<Task>>,
    /// Replay in progress. `None` means: not yet checked whether the next
    /// reported state has a pointcut.
    active_replay: Option<ReplayScenario>,
}

impl Submission {
    /// Create a submission with one task per content and target locale
    ///
    /// Delay and jitter of the task timelines are taken from `settings`.
    pub fn new(subject: &str, contents: Vec<SubmissionContent>, settings: &MockSettings) -> Self {
        Submission::new_at(subject, contents, settings, Instant::now())
    }

    pub fn new_at(
        subject: &str,
        contents: Vec<SubmissionContent>,
        settings: &MockSettings,
        start: Instant,
    ) -> Self {
        let states = parse_subject_directive(subject);
        if !states.is_empty() {
            debug!("Subject requests task states: {:?}", states);
        }
        let mut tasks = Vec::new();
        for content in contents {
            for locale in content.target_locales {
                let timeline = Timeline::new(
                    &states,
                    settings.state_change_delay_seconds(),
                    settings.state_change_delay_offset_percentage(),
                    start,
                );
                tasks.push(Arc::new(Task::new(content.content.clone(), locale, timeline)));
            }
        }
        Submission {
            tasks,
            active_replay: None,
        }
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn has_active_replay(&self) -> bool {
        self.active_replay.is_some()
    }

    /// Task-derived state, without any replay applied
    pub fn aggregated_state_at(&self, now: Instant) -> SubmissionState {
        let states: Vec<TaskState> = self.tasks.iter().map(|t| t.state_at(now)).collect();
        aggregate_state(&states)
    }

    /// Reported state: the aggregated state, possibly replaced by a replay
    pub fn state(&mut self, submission_states: &MockSubmissionStates) -> SubmissionState {
        self.state_at(submission_states, Instant::now())
    }

    pub fn state_at(
        &mut self,
        submission_states: &MockSubmissionStates,
        now: Instant,
    ) -> SubmissionState {
        let aggregated = self.aggregated_state_at(now);
        if self.active_replay.is_some() {
            debug!("Query existing replay scenario for state override of {}.", aggregated);
            return self.next_replayed_state().unwrap_or(aggregated);
        }
        self.active_replay = submission_states.replay_scenario(aggregated);
        if self.active_replay.is_some() {
            debug!("Query new replay scenario for state override of {}.", aggregated);
            return self.next_replayed_state().unwrap_or(aggregated);
        }
        trace!("No replay scenario for state override of {}.", aggregated);
        aggregated
    }

    fn next_replayed_state(&mut self) -> Option<SubmissionState> {
        let replay = self.active_replay.as_mut()?;
        let next = replay.next_state();
        match next {
            Some(state) => debug!("Replay scenario (left: {}): {}", replay.len(), state),
            None => {
                trace!("Replay scenario exhausted. Resetting.");
                self.active_replay = None;
            }
        }
        next
    }

    /// Cancel all tasks which are not delivered yet
    pub fn cancel(&self) {
        self.tasks.iter().for_each(|t| t.mark_cancelled());
    }

    pub fn completed_tasks(&self) -> Vec<Arc<Task>> {
        self.tasks_in_state(TaskState::Completed)
    }

    pub fn cancelled_tasks(&self) -> Vec<Arc<Task>> {
        self.tasks_in_state(TaskState::Cancelled)
    }

    fn tasks_in_state(&self, state: TaskState) -> Vec<Arc<Task>> {
        self.tasks
            .iter()
            .filter(|t| t.state() == state)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn locale(tag: &str) -> Locale {
        tag.parse().unwrap()
    }

    fn settings(delay_seconds: u64) -> MockSettings {
        MockSettings::new(delay_seconds, 0).unwrap()
    }

    fn contents(locales: &[&str]) -> Vec<SubmissionContent> {
        vec![SubmissionContent {
            file_id: "file".to_string(),
            content: "<xliff/>".to_string(),
            target_locales: locales.iter().map(|l| locale(l)).collect(),
        }]
    }

    // ========== Directive Tests ==========

    #[test]
    fn test_subject_directive() {
        assert_eq!(
            parse_subject_directive("  States: review, completed"),
            vec![TaskState::Other, TaskState::Completed]
        );
        assert!(parse_subject_directive("My translation").is_empty());
        assert!(parse_subject_directive("").is_empty());
    }

    // ========== Aggregation Tests ==========

    #[test]
    fn test_confirmed_cancellation_wins_over_delivered() {
        use TaskState::*;
        assert_eq!(
            aggregate_state(&[CancellationConfirmed, Delivered, Delivered]),
            SubmissionState::CancellationConfirmed
        );
        assert_eq!(
            aggregate_state(&[CancellationConfirmed, CancellationConfirmed]),
            SubmissionState::CancellationConfirmed
        );
    }

    #[test]
    fn test_any_cancelled() {
        use TaskState::*;
        assert_eq!(
            aggregate_state(&[CancellationConfirmed, Cancelled]),
            SubmissionState::Cancelled
        );
        assert_eq!(
            aggregate_state(&[Delivered, Cancelled, Completed]),
            SubmissionState::Cancelled
        );
    }

    #[test]
    fn test_confirmed_with_pending_task_is_started() {
        use TaskState::*;
        assert_eq!(
            aggregate_state(&[CancellationConfirmed, Other]),
            SubmissionState::Started
        );
    }

    #[test]
    fn test_delivered_and_completed() {
        use TaskState::*;
        assert_eq!(aggregate_state(&[Delivered, Delivered]), SubmissionState::Delivered);
        assert_eq!(aggregate_state(&[Delivered, Completed]), SubmissionState::Completed);
        assert_eq!(aggregate_state(&[Completed]), SubmissionState::Completed);
        assert_eq!(aggregate_state(&[Completed, Other]), SubmissionState::Started);
    }

    // ========== Submission Tests ==========

    #[test]
    fn test_one_task_per_locale() {
        let submission = Submission::new("subject", contents(&["de", "fr", "ja"]), &settings(1));
        let locales: Vec<String> = submission
            .tasks()
            .iter()
            .map(|t| t.target_locale().to_string())
            .collect();
        assert_eq!(locales, vec!["de", "fr", "ja"]);
    }

    #[test]
    fn test_states_directive_progression() {
        let start = Instant::now();
        let mut submission = Submission::new_at(
            "states: review, completed",
            contents(&["de"]),
            &settings(2),
            start,
        );
        let none = MockSubmissionStates::default();
        let at = |millis: u64| start + Duration::from_millis(millis);
        assert_eq!(submission.state_at(&none, at(1000)), SubmissionState::Started);
        assert_eq!(submission.state_at(&none, at(2500)), SubmissionState::Started);
        assert_eq!(submission.state_at(&none, at(4000)), SubmissionState::Completed);
    }

    #[test]
    fn test_cancel_skips_delivered_tasks() {
        let submission = Submission::new("", contents(&["de", "fr"]), &settings(0));
        submission.tasks()[0].mark_delivered();
        submission.cancel();
        assert_eq!(submission.tasks()[0].state(), TaskState::Delivered);
        assert_eq!(submission.tasks()[1].state(), TaskState::Cancelled);
        assert_eq!(submission.cancelled_tasks().len(), 1);
    }

    #[test]
    fn test_completed_tasks() {
        let submission = Submission::new("", contents(&["de", "fr"]), &settings(0));
        assert_eq!(submission.completed_tasks().len(), 2);
        submission.tasks()[1].mark_delivered();
        let completed = submission.completed_tasks();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id(), submission.tasks()[0].id());
    }

    // ========== Replay Tests ==========

    #[test]
    fn test_replay_then_fallback() {
        let states = MockSubmissionStates::from_config(&json!({
            "COMPLETED": { "before": "REVIEW" }
        }));
        let mut submission = Submission::new("", contents(&["de"]), &settings(0));
        assert_eq!(submission.state(&states), SubmissionState::Review);
        assert_eq!(submission.state(&states), SubmissionState::Completed);
        // Exhausted: reported as aggregated, the replay gets reset.
        assert_eq!(submission.state(&states), SubmissionState::Completed);
        assert!(!submission.has_active_replay());
        // Not active anymore, so the pointcut triggers again.
        assert_eq!(submission.state(&states), SubmissionState::Review);
    }

    #[test]
    fn test_final_replay_freezes() {
        let states = MockSubmissionStates::from_config(&json!({
            "COMPLETED": { "after": ["REDELIVERED"], "final": true }
        }));
        let mut submission = Submission::new("", contents(&["de"]), &settings(0));
        assert_eq!(submission.state(&states), SubmissionState::Completed);
        for task in submission.tasks() {
            task.mark_delivered();
        }
        for _ in 0..5 {
            assert_eq!(submission.state(&states), SubmissionState::Redelivered);
        }
    }
}
