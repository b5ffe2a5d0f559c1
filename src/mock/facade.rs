//! Client surface of the translation backend and its mocked implementation
//!
//! The workflow talks to the backend through [`TranslationFacade`]: upload
//! contents, bundle them into a submission, poll the submission and finally
//! download and confirm the translations.
//!
//! # Example
//!
//! ```ignore
//! use translation_mock::mock::{MockBackend, MockSettings, SubmissionRequest, TranslationFacade};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MockBackend::new();
//!     let facade = backend.facade(MockSettings::new(0, 0)?);
//!
//!     let handle = facade.upload_content("a.xlf", xliff.as_bytes(), &en).await?;
//!     let request = SubmissionRequest::new(en).with_content(handle, vec![de]);
//!     let id = facade.submit_submission(&request).await?;
//!
//!     let submission = facade.get_submission(id).await?;
//!     println!("{}", submission.state); // COMPLETED
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icu_locale::Locale;
use serde::Serialize;
use tracing::{debug, info};

use crate::mock::content_store::ContentStore;
use crate::mock::error::{FacadeError, FacadeResult};
use crate::mock::pseudo_translation::translate_xliff;
use crate::mock::scenarios::{Scenario, TranslateInvalidXliff};
use crate::mock::settings::{ForcedError, MockSettings};
use crate::mock::state::SubmissionState;
use crate::mock::submission::SubmissionContent;
use crate::mock::submission_store::SubmissionStore;

/// HTTP status reported for a successful cancellation
pub const CANCEL_OK: u16 = 200;
/// HTTP status reported for a forced cancellation failure
pub const CANCEL_NOT_FOUND: u16 = 404;

/// A submission as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionModel {
    pub submission_id: u64,
    /// Ids of the submission on the backend's side
    pub external_ids: Vec<String>,
    pub state: SubmissionState,
    /// Set if the backend reports an error for the submission
    pub error: bool,
}

impl SubmissionModel {
    pub fn new(submission_id: u64, state: SubmissionState) -> Self {
        SubmissionModel {
            submission_id,
            external_ids: vec![submission_id.to_string()],
            state,
            error: false,
        }
    }
}

/// A downloaded task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskModel {
    pub task_id: u64,
    pub locale: Locale,
}

/// Everything needed to create a submission
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub subject: Option<String>,
    pub comment: Option<String>,
    pub due_date: DateTime<Utc>,
    pub workflow: Option<String>,
    pub submitter: Option<String>,
    pub source_locale: Locale,
    /// Target locales by content handle
    pub contents: BTreeMap<String, Vec<Locale>>,
}

impl SubmissionRequest {
    /// A request without contents, due in a week
    pub fn new(source_locale: Locale) -> Self {
        SubmissionRequest {
            subject: None,
            comment: None,
            due_date: Utc::now() + chrono::Duration::days(7),
            workflow: None,
            submitter: None,
            source_locale,
            contents: BTreeMap::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_content(mut self, handle: impl Into<String>, target_locales: Vec<Locale>) -> Self {
        self.contents.insert(handle.into(), target_locales);
        self
    }
}

/// Consumer of downloaded translations. Returns `true` if the translation
/// got accepted, which marks the task as delivered.
pub type TaskConsumer<'a> = dyn FnMut(&str, &TaskModel) -> bool + Send + 'a;

/// Client of an asynchronous translation backend
///
/// All operations fail with [`FacadeError::SubmissionNotFound`] for
/// submission ids the backend never handed out, and may fail with
/// [`FacadeError::Communication`] if the backend is not reachable.
#[async_trait]
pub trait TranslationFacade: Send + Sync {
    /// Upload content to translate, returning a handle to submit it with
    ///
    /// # Arguments
    ///
    /// * `file_name` - Name of the uploaded file, for logging
    /// * `content` - UTF-8 encoded XLIFF
    /// * `source_locale` - Locale of the content
    async fn upload_content(
        &self,
        file_name: &str,
        content: &[u8],
        source_locale: &Locale,
    ) -> FacadeResult<String>;

    /// Submit uploaded contents for translation, returning the submission id
    ///
    /// Every handle in the request is consumed.
    async fn submit_submission(&self, request: &SubmissionRequest) -> FacadeResult<u64>;

    /// Cancel a submission, returning an HTTP status code
    async fn cancel_submission(&self, submission_id: u64) -> FacadeResult<u16>;

    /// Pass every completed task to `consumer`
    async fn download_completed_tasks(
        &self,
        submission_id: u64,
        consumer: &mut TaskConsumer<'_>,
    ) -> FacadeResult<()>;

    /// Mark all completed tasks as delivered, adding their locales to
    /// `completed_locales`
    async fn confirm_completed_tasks(
        &self,
        submission_id: u64,
        completed_locales: &mut HashSet<Locale>,
    ) -> FacadeResult<()>;

    /// Confirm the cancellation of all cancelled tasks
    async fn confirm_cancelled_tasks(&self, submission_id: u64) -> FacadeResult<()>;

    /// Current state of a submission
    async fn get_submission(&self, submission_id: u64) -> FacadeResult<SubmissionModel>;

    /// Name of the backend, for logging
    fn provider_name(&self) -> &str;
}

/// Owner of the stores shared by all mocked facades
///
/// Submissions created through one facade are visible to all facades of
/// the same backend.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    content_store: Arc<ContentStore>,
    submission_store: Arc<SubmissionStore>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    /// Create a facade with the given settings
    ///
    /// The settings replace those of the submission store, so they apply
    /// to all submissions created afterwards, whichever facade creates them.
    pub fn facade(&self, settings: MockSettings) -> MockedExchangeFacade {
        let settings = Arc::new(settings);
        self.submission_store.apply_settings(Arc::clone(&settings));
        MockedExchangeFacade {
            content_store: Arc::clone(&self.content_store),
            submission_store: Arc::clone(&self.submission_store),
            settings,
        }
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content_store
    }

    pub fn submission_store(&self) -> &SubmissionStore {
        &self.submission_store
    }
}

/// Facade answering from the in-memory stores of a [`MockBackend`]
///
/// Before every operation, the forced error of the settings is checked
/// first, then the active scenario.
#[derive(Debug, Clone)]
pub struct MockedExchangeFacade {
    content_store: Arc<ContentStore>,
    submission_store: Arc<SubmissionStore>,
    settings: Arc<MockSettings>,
}

impl MockedExchangeFacade {
    pub fn settings(&self) -> &MockSettings {
        &self.settings
    }

    fn forced(&self, error: ForcedError) -> bool {
        self.settings.error() == Some(error)
    }

    fn scenario(&self) -> &dyn Scenario {
        self.settings.scenario().as_ref()
    }

    /// Hooks to post-process downloaded translations with
    fn translation_hooks(&self) -> &dyn Scenario {
        if self.forced(ForcedError::DownloadXliff) {
            &TranslateInvalidXliff
        } else {
            self.scenario()
        }
    }
}

fn forced_communication_error(operation: &str) -> FacadeError {
    FacadeError::Communication(format!(
        "Exception to test {} communication errors with translation service.",
        operation
    ))
}

#[async_trait]
impl TranslationFacade for MockedExchangeFacade {
    async fn upload_content(
        &self,
        file_name: &str,
        content: &[u8],
        source_locale: &Locale,
    ) -> FacadeResult<String> {
        if self.forced(ForcedError::UploadCommunication) {
            return Err(forced_communication_error("upload"));
        }
        self.scenario().start_upload()?;
        let content = String::from_utf8(content.to_vec())
            .map_err(|e| FacadeError::Io(format!("Failed to read {}: {}", file_name, e)))?;
        let handle = self.content_store.add(content);
        debug!("Uploaded {} ({}) as {}.", file_name, source_locale, handle);
        Ok(handle)
    }

    async fn submit_submission(&self, request: &SubmissionRequest) -> FacadeResult<u64> {
        let subject = request.subject.as_deref().unwrap_or_default().trim();
        let staged = self
            .content_store
            .remove_all(request.contents.keys().map(String::as_str))?;
        let contents = request
            .contents
            .iter()
            .zip(staged)
            .map(|((handle, target_locales), content)| SubmissionContent {
                file_id: handle.clone(),
                content,
                target_locales: target_locales.clone(),
            })
            .collect();
        let id = self.submission_store.add_submission(subject, contents);
        info!(
            "Created submission {} for {} contents in {}, due {}.",
            id,
            request.contents.len(),
            request.source_locale,
            request.due_date
        );
        Ok(id)
    }

    async fn cancel_submission(&self, submission_id: u64) -> FacadeResult<u16> {
        if self.forced(ForcedError::CancelCommunication) {
            return Err(forced_communication_error("cancel"));
        }
        if self.forced(ForcedError::CancelResult) {
            return Ok(CANCEL_NOT_FOUND);
        }
        if let Some(code) = self.scenario().start_cancellation()? {
            return Ok(code);
        }
        self.submission_store.cancel_submission(submission_id)?;
        Ok(CANCEL_OK)
    }

    async fn download_completed_tasks(
        &self,
        submission_id: u64,
        consumer: &mut TaskConsumer<'_>,
    ) -> FacadeResult<()> {
        if self.forced(ForcedError::DownloadCommunication) {
            return Err(forced_communication_error("download"));
        }
        self.scenario().start_download()?;
        let hooks = self.translation_hooks();
        for task in self.submission_store.completed_tasks(submission_id)? {
            let translated = translate_xliff(task.content(), hooks);
            let model = TaskModel {
                task_id: task.id(),
                locale: task.target_locale().clone(),
            };
            if consumer(&translated, &model) {
                task.mark_delivered();
            } else {
                debug!("Task {} not accepted, keeping it completed.", task.id());
            }
        }
        Ok(())
    }

    async fn confirm_completed_tasks(
        &self,
        submission_id: u64,
        completed_locales: &mut HashSet<Locale>,
    ) -> FacadeResult<()> {
        for task in self.submission_store.completed_tasks(submission_id)? {
            completed_locales.insert(task.target_locale().clone());
            task.mark_delivered();
        }
        Ok(())
    }

    async fn confirm_cancelled_tasks(&self, submission_id: u64) -> FacadeResult<()> {
        let mut cancelled = self.submission_store.cancelled_tasks(submission_id)?;
        if cancelled.is_empty() {
            info!(
                "Submission {}: no cancelled tasks to confirm, cancelling the submission first.",
                submission_id
            );
            self.submission_store.cancel_submission(submission_id)?;
            cancelled = self.submission_store.cancelled_tasks(submission_id)?;
        }
        cancelled.iter().for_each(|t| t.mark_cancellation_confirmed());
        Ok(())
    }

    async fn get_submission(&self, submission_id: u64) -> FacadeResult<SubmissionModel> {
        let state = self.submission_store.submission_state(submission_id)?;
        let mut model = SubmissionModel::new(submission_id, state);
        if self.forced(ForcedError::SubmissionError) {
            model.error = true;
        }
        Ok(self.scenario().intercept_submission(model))
    }

    fn provider_name(&self) -> &str {
        "Mock Translation Backend"
    }
}
