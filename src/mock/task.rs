//! Mocked translation tasks
//!
//! A task is the translation of one content into one target locale. Its
//! state is never stored as such: it is computed on every read from three
//! sticky flags (set by explicit client actions) and a [`Timeline`] of
//! state transitions scheduled when the task got created.
//!
//! By default, the timeline contains just one transition to
//! [`TaskState::Completed`] after some (jittered) delay. Submissions may
//! request explicit state sequences instead, see [`Timeline::new`].

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use icu_locale::Locale;
use rand::Rng;
use tracing::trace;

use crate::mock::state::TaskState;

/// Task ids are unique within the process. Seeding from the wall clock keeps
/// them from repeating across restarts within the same run of a test suite.
static TASK_ID_FACTORY: LazyLock<AtomicU64> = LazyLock::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    AtomicU64::new(seed)
});

/// Upper bound of a base delay, 100 years
pub const MAX_DELAY_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

fn next_task_id() -> u64 {
    TASK_ID_FACTORY.fetch_add(1, Ordering::Relaxed) + 1
}

/// Compute a delay from a base and a symmetric random offset
///
/// The offset is drawn uniformly from `[-jitter_percentage, +jitter_percentage]`
/// percent of the base. A jitter of 0 returns exactly the base.
///
/// # Example
///
/// ```ignore
/// let delay = jittered_delay(10, 20);
/// assert!(delay >= Duration::from_secs(8) && delay <= Duration::from_secs(12));
/// ```
pub fn jittered_delay(delay_base_seconds: u64, jitter_percentage: u8) -> Duration {
    let base_ms = i128::from(delay_base_seconds.min(MAX_DELAY_SECONDS)) * 1000;
    if jitter_percentage == 0 || base_ms == 0 {
        return Duration::from_millis(base_ms as u64);
    }
    let jitter = i64::from(jitter_percentage.min(100));
    let offset = i128::from(rand::thread_rng().gen_range(-jitter..=jitter));
    let delay_ms = base_ms + base_ms * offset / 100;
    Duration::from_millis(delay_ms.clamp(0, i128::from(u64::MAX)) as u64)
}

fn later(at: Instant, delay: Duration) -> Instant {
    at.checked_add(delay).unwrap_or(at)
}

/// Sticky task flags that may be latched from the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFlag {
    Delivered,
    Cancelled,
    CancellationConfirmed,
}

/// Outcome of evaluating a timeline at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub state: TaskState,
    /// Flag to persist, if the resolved state has a sticky counterpart
    pub latch: Option<TaskFlag>,
}

/// Scheduled state transitions of a task, ordered by instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    entries: Vec<(Instant, TaskState)>,
}

impl Timeline {
    /// Schedule the given states, starting at `start`
    ///
    /// Without explicit states, the task completes once after a jittered
    /// delay. Otherwise each state gets its own instant, every one of them
    /// a freshly jittered delay after its predecessor.
    pub fn new(
        states: &[TaskState],
        delay_base_seconds: u64,
        jitter_percentage: u8,
        start: Instant,
    ) -> Self {
        if states.is_empty() {
            let at = later(start, jittered_delay(delay_base_seconds, jitter_percentage));
            return Timeline::from_entries(vec![(at, TaskState::Completed)]);
        }
        let mut at = start;
        let mut entries = Vec::with_capacity(states.len());
        for state in states {
            at = later(at, jittered_delay(delay_base_seconds, jitter_percentage));
            entries.push((at, *state));
        }
        Timeline::from_entries(entries)
    }

    /// Build a timeline from arbitrary entries. Entries sharing an instant
    /// keep their relative order.
    pub fn from_entries(mut entries: Vec<(Instant, TaskState)>) -> Self {
        entries.sort_by_key(|(at, _)| *at);
        Timeline { entries }
    }

    pub fn entries(&self) -> &[(Instant, TaskState)] {
        &self.entries
    }

    /// Evaluate the timeline at `now`
    ///
    /// The latest entry not after `now` wins; for equal instants the one
    /// inserted last. Before the first entry the state is
    /// [`TaskState::Other`].
    ///
    /// Only DELIVERED, CANCELLED and CANCELLATION_CONFIRMED have sticky
    /// flags, so only they are latched. COMPLETED stays time-derived.
    pub fn resolve_at(&self, now: Instant) -> Resolution {
        let state = self
            .entries
            .iter()
            .take_while(|(at, _)| *at <= now)
            .last()
            .map(|(_, state)| *state)
            .unwrap_or(TaskState::Other);
        let latch = match state {
            TaskState::Delivered => Some(TaskFlag::Delivered),
            TaskState::Cancelled => Some(TaskFlag::Cancelled),
            TaskState::CancellationConfirmed => Some(TaskFlag::CancellationConfirmed),
            TaskState::Completed | TaskState::Other => None,
        };
        Resolution { state, latch }
    }
}

/// A single translation task
#[derive(Debug)]
pub struct Task {
    id: u64,
    content: String,
    target_locale: Locale,
    timeline: Timeline,
    delivered: AtomicBool,
    cancelled: AtomicBool,
    cancellation_confirmed: AtomicBool,
}

impl Task {
    pub fn new(content: String, target_locale: Locale, timeline: Timeline) -> Self {
        Task {
            id: next_task_id(),
            content,
            target_locale,
            timeline,
            delivered: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancellation_confirmed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn target_locale(&self) -> &Locale {
        &self.target_locale
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Current state of the task
    pub fn state(&self) -> TaskState {
        self.state_at(Instant::now())
    }

    /// State of the task as of `now`
    ///
    /// Flags take precedence in the order cancellation confirmed, cancelled,
    /// delivered. Without flags, the timeline decides; sticky states found
    /// there are latched into their flag as a side effect.
    pub fn state_at(&self, now: Instant) -> TaskState {
        if self.cancellation_confirmed.load(Ordering::Acquire) {
            return TaskState::CancellationConfirmed;
        }
        if self.cancelled.load(Ordering::Acquire) {
            return TaskState::Cancelled;
        }
        if self.delivered.load(Ordering::Acquire) {
            return TaskState::Delivered;
        }
        let resolution = self.timeline.resolve_at(now);
        if let Some(flag) = resolution.latch {
            trace!("Task {}: latching {:?} from timeline.", self.id, flag);
            self.apply(flag);
        }
        resolution.state
    }

    fn apply(&self, flag: TaskFlag) {
        match flag {
            TaskFlag::Delivered => self.mark_delivered(),
            TaskFlag::Cancelled => self.mark_cancelled(),
            TaskFlag::CancellationConfirmed => self.mark_cancellation_confirmed(),
        }
    }

    pub fn mark_delivered(&self) {
        self.delivered.store(true, Ordering::Release);
    }

    /// No-op for delivered tasks
    pub fn mark_cancelled(&self) {
        if !self.delivered.load(Ordering::Acquire) {
            self.cancelled.store(true, Ordering::Release);
        }
    }

    /// No-op for delivered tasks
    pub fn mark_cancellation_confirmed(&self) {
        if !self.delivered.load(Ordering::Acquire) {
            self.cancellation_confirmed.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Locale {
        "und".parse().unwrap()
    }

    fn task_with(entries: Vec<(Instant, TaskState)>) -> Task {
        Task::new(
            "content".to_string(),
            root(),
            Timeline::from_entries(entries),
        )
    }

    // ========== Delay Tests ==========

    #[test]
    fn test_delay_without_jitter_is_exact() {
        assert_eq!(jittered_delay(2, 0), Duration::from_secs(2));
        assert_eq!(jittered_delay(0, 50), Duration::ZERO);
    }

    #[test]
    fn test_delay_stays_within_jitter_bounds() {
        for _ in 0..200 {
            let delay = jittered_delay(10, 20);
            assert!(delay >= Duration::from_secs(8), "{:?}", delay);
            assert!(delay <= Duration::from_secs(12), "{:?}", delay);
        }
    }

    #[test]
    fn test_full_jitter_never_negative() {
        for _ in 0..200 {
            assert!(jittered_delay(1, 100) <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_huge_delay_is_capped() {
        for (seconds, jitter) in [
            (100_000_000_000_000, 100),
            (10_000_000_000_000_000, 10),
            (u64::MAX, 100),
        ] {
            let delay = jittered_delay(seconds, jitter);
            assert!(delay <= Duration::from_secs(MAX_DELAY_SECONDS * 2), "{:?}", delay);
        }
        assert_eq!(jittered_delay(u64::MAX, 0), Duration::from_secs(MAX_DELAY_SECONDS));
    }

    #[test]
    fn test_huge_delay_timeline_stays_other() {
        let start = Instant::now();
        let states = [TaskState::Completed, TaskState::Delivered];
        let timeline = Timeline::new(&states, u64::MAX, 100, start);
        assert_eq!(timeline.entries().len(), 2);
        assert_eq!(timeline.resolve_at(start).state, TaskState::Other);
    }

    // ========== Timeline Tests ==========

    #[test]
    fn test_default_timeline_single_completion() {
        let start = Instant::now();
        let timeline = Timeline::new(&[], 2, 0, start);
        assert_eq!(
            timeline.entries(),
            &[(start + Duration::from_secs(2), TaskState::Completed)]
        );
    }

    #[test]
    fn test_default_timeline_other_then_completed() {
        let start = Instant::now();
        let timeline = Timeline::new(&[], 2, 0, start);
        assert_eq!(timeline.resolve_at(start).state, TaskState::Other);
        assert_eq!(
            timeline.resolve_at(start + Duration::from_millis(1999)).state,
            TaskState::Other
        );
        assert_eq!(
            timeline.resolve_at(start + Duration::from_secs(2)).state,
            TaskState::Completed
        );
    }

    #[test]
    fn test_default_timeline_not_completed_before_minimum_delay() {
        let start = Instant::now();
        for _ in 0..50 {
            let timeline = Timeline::new(&[], 10, 30, start);
            let earliest = start + Duration::from_secs(7);
            let just_before = earliest - Duration::from_millis(1);
            assert_eq!(timeline.resolve_at(just_before).state, TaskState::Other);
        }
    }

    #[test]
    fn test_explicit_states_are_spaced() {
        let start = Instant::now();
        let timeline = Timeline::new(&[TaskState::Other, TaskState::Completed], 2, 0, start);
        assert_eq!(
            timeline.entries(),
            &[
                (start + Duration::from_secs(2), TaskState::Other),
                (start + Duration::from_secs(4), TaskState::Completed),
            ]
        );
        assert_eq!(
            timeline.resolve_at(start + Duration::from_secs(3)).state,
            TaskState::Other
        );
        assert_eq!(
            timeline.resolve_at(start + Duration::from_secs(5)).state,
            TaskState::Completed
        );
    }

    #[test]
    fn test_same_instant_later_entry_wins() {
        let at = Instant::now();
        let timeline =
            Timeline::from_entries(vec![(at, TaskState::Completed), (at, TaskState::Cancelled)]);
        assert_eq!(timeline.resolve_at(at).state, TaskState::Cancelled);
    }

    #[test]
    fn test_entries_sorted_by_instant() {
        let at = Instant::now();
        let later = at + Duration::from_secs(1);
        let timeline =
            Timeline::from_entries(vec![(later, TaskState::Completed), (at, TaskState::Other)]);
        assert_eq!(timeline.resolve_at(later).state, TaskState::Completed);
        assert_eq!(timeline.resolve_at(at).state, TaskState::Other);
    }

    #[test]
    fn test_resolution_latches_only_sticky_states() {
        let at = Instant::now();
        let latch = |state| Timeline::from_entries(vec![(at, state)]).resolve_at(at).latch;
        assert_eq!(latch(TaskState::Delivered), Some(TaskFlag::Delivered));
        assert_eq!(latch(TaskState::Cancelled), Some(TaskFlag::Cancelled));
        assert_eq!(
            latch(TaskState::CancellationConfirmed),
            Some(TaskFlag::CancellationConfirmed)
        );
        // No flag exists for COMPLETED, so it is never latched.
        assert_eq!(latch(TaskState::Completed), None);
        assert_eq!(latch(TaskState::Other), None);
    }

    // ========== Task Tests ==========

    #[test]
    fn test_task_ids_increase() {
        let a = task_with(vec![]);
        let b = task_with(vec![]);
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_task_without_entries_is_other() {
        assert_eq!(task_with(vec![]).state(), TaskState::Other);
    }

    #[test]
    fn test_flag_priority() {
        let task = task_with(vec![]);
        task.mark_cancelled();
        assert_eq!(task.state(), TaskState::Cancelled);
        task.mark_cancellation_confirmed();
        assert_eq!(task.state(), TaskState::CancellationConfirmed);
    }

    #[test]
    fn test_delivered_task_cannot_be_cancelled() {
        let task = task_with(vec![]);
        task.mark_delivered();
        task.mark_cancelled();
        task.mark_cancellation_confirmed();
        assert_eq!(task.state(), TaskState::Delivered);
    }

    #[test]
    fn test_marks_are_idempotent() {
        let task = task_with(vec![]);
        task.mark_delivered();
        task.mark_delivered();
        assert_eq!(task.state(), TaskState::Delivered);
    }

    #[test]
    fn test_timeline_cancellation_is_latched() {
        let start = Instant::now();
        let cancel_at = start + Duration::from_secs(1);
        let complete_at = start + Duration::from_secs(2);
        let task = task_with(vec![
            (cancel_at, TaskState::Cancelled),
            (complete_at, TaskState::Completed),
        ]);
        assert_eq!(task.state_at(cancel_at), TaskState::Cancelled);
        // Latched: a later timeline entry no longer matters.
        assert_eq!(task.state_at(complete_at), TaskState::Cancelled);
    }

    #[test]
    fn test_timeline_completion_is_not_latched() {
        let start = Instant::now();
        let complete_at = start + Duration::from_secs(1);
        let task = task_with(vec![(complete_at, TaskState::Completed)]);
        assert_eq!(task.state_at(complete_at), TaskState::Completed);
        // Asymmetric on purpose: reading COMPLETED persists nothing.
        assert_eq!(task.state_at(start), TaskState::Other);
    }
}
