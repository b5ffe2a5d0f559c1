//! Task and submission state vocabularies
//!
//! The mock distinguishes two levels of state. A [`TaskState`] is the very
//! small state model of a single task (content translated into one locale).
//! A [`SubmissionState`] is what the backend reports for a whole submission;
//! it is derived from the task states, but may also be any other state the
//! real backend knows of when replayed or injected by a scenario.

use std::fmt;

use serde::Serialize;

/// Simple task state model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Anything we do not care about. Initial state of every task.
    Other,
    /// Task got cancelled.
    Cancelled,
    /// Cancellation of the task got confirmed by the client.
    CancellationConfirmed,
    /// Translation is available (reached automatically).
    Completed,
    /// Translation was delivered to the client (reached manually).
    Delivered,
}

impl TaskState {
    pub const ALL: [TaskState; 5] = [
        TaskState::Other,
        TaskState::Cancelled,
        TaskState::CancellationConfirmed,
        TaskState::Completed,
        TaskState::Delivered,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Other => "OTHER",
            TaskState::Cancelled => "CANCELLED",
            TaskState::CancellationConfirmed => "CANCELLATION_CONFIRMED",
            TaskState::Completed => "COMPLETED",
            TaskState::Delivered => "DELIVERED",
        }
    }

    /// Parse a single state name, ignoring case. Unknown names map to
    /// [`TaskState::Other`].
    pub fn parse(name: &str) -> TaskState {
        TaskState::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .unwrap_or(TaskState::Other)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse comma-separated task states
///
/// Entries are trimmed and empty entries dropped. For convenience, spaces
/// and dashes are accepted as word separators in place of underscores.
///
/// # Example
///
/// ```ignore
/// let states = parse_task_states_csv("other, cancellation-confirmed");
/// assert_eq!(states, vec![TaskState::Other, TaskState::CancellationConfirmed]);
/// ```
pub fn parse_task_states_csv(csv: &str) -> Vec<TaskState> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.replace([' ', '-'], "_"))
        .map(|s| TaskState::parse(&s))
        .collect()
}

/// Submission states as reported by the translation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    InPreProcess,
    Started,
    Analyzed,
    AwaitingApproval,
    AwaitingQuoteApproval,
    Translate,
    Review,
    Completed,
    /// Completed submission that got redelivered through other channels
    /// (for example by email) without the backend providing the files.
    Redelivered,
    Delivered,
    Cancelled,
    /// A cancelled submission whose tasks are all either cancellation
    /// confirmed or delivered.
    CancellationConfirmed,
    /// Any state we do not know of.
    Other,
}

impl SubmissionState {
    pub const ALL: [SubmissionState; 13] = [
        SubmissionState::InPreProcess,
        SubmissionState::Started,
        SubmissionState::Analyzed,
        SubmissionState::AwaitingApproval,
        SubmissionState::AwaitingQuoteApproval,
        SubmissionState::Translate,
        SubmissionState::Review,
        SubmissionState::Completed,
        SubmissionState::Redelivered,
        SubmissionState::Delivered,
        SubmissionState::Cancelled,
        SubmissionState::CancellationConfirmed,
        SubmissionState::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::InPreProcess => "IN_PRE_PROCESS",
            SubmissionState::Started => "STARTED",
            SubmissionState::Analyzed => "ANALYZED",
            SubmissionState::AwaitingApproval => "AWAITING_APPROVAL",
            SubmissionState::AwaitingQuoteApproval => "AWAITING_QUOTE_APPROVAL",
            SubmissionState::Translate => "TRANSLATE",
            SubmissionState::Review => "REVIEW",
            SubmissionState::Completed => "COMPLETED",
            SubmissionState::Redelivered => "REDELIVERED",
            SubmissionState::Delivered => "DELIVERED",
            SubmissionState::Cancelled => "CANCELLED",
            SubmissionState::CancellationConfirmed => "CANCELLATION_CONFIRMED",
            SubmissionState::Other => "OTHER",
        }
    }

    /// Look up a state by its name, ignoring case
    pub fn find_by_name(name: &str) -> Option<SubmissionState> {
        let name = name.trim();
        SubmissionState::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
