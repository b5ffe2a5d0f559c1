/// Mocked translation backend
///
/// This module provides an in-memory stand-in for an asynchronous translation
/// backend. Contents get "translated" after a configurable delay, submission
/// states are derived from the states of their tasks, and failures of the
/// backend can be simulated on demand.
///
/// # Overview
///
/// 1. **Tasks** - One content in one target locale, following a timeline of
///    scheduled state changes
/// 2. **Submissions** - Bundles of tasks whose state is aggregated from
///    their tasks on every read
/// 3. **Stores** - Staged contents and submissions, shared by all facades of
///    one [`MockBackend`]
/// 4. **Scenarios & Replay** - Injected faults and scripted state sequences
/// 5. **Pseudo-Translation** - Look-alike characters in place of real
///    translations
///
/// # Example
///
/// ```ignore
/// use translation_mock::mock::{MockBackend, MockSettings, TranslationFacade};
/// use serde_json::json;
///
/// let settings = MockSettings::from_global_link_config(&json!({
///     "mock": { "stateChangeDelaySeconds": 1, "scenario": "submission-error" }
/// }))?;
/// let facade = MockBackend::new().facade(settings);
/// let submission = facade.get_submission(id).await?;
/// assert!(submission.error);
/// ```
pub mod content_store;
pub mod error;
pub mod facade;
pub mod pseudo_translation;
pub mod scenarios;
pub mod settings;
pub mod state;
pub mod submission;
pub mod submission_states;
pub mod submission_store;
pub mod task;


pub use content_store::ContentStore;
pub use error::{FacadeError, FacadeResult};
pub use facade::{
    MockBackend, MockedExchangeFacade, SubmissionModel, SubmissionRequest, TaskConsumer,
    TaskModel, TranslationFacade,
};
pub use pseudo_translation::{pseudo_translate_text, translate_xliff};
pub use scenarios::Scenario;
pub use settings::{ForcedError, MockSettings};
pub use state::{SubmissionState, TaskState};
pub use submission::{Submission, SubmissionContent, aggregate_state};
pub use submission_states::{MockSubmissionStates, ReplayScenario, StatePointcut};
pub use submission_store::SubmissionStore;
pub use task::{Task, Timeline};
