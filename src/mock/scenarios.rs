//! Scenarios for negative-path testing
//!
//! A scenario hooks into the checkpoints of the mocked backend: upload,
//! cancellation and download may fail, translated content may be broken on
//! purpose, and reported submissions may be altered. Scenarios are selected
//! by id (see [`from_id`]); the default is [`NoOperation`].
//!
//! Stateful scenarios remember submissions by id. They are shared by all
//! facades built from the same settings.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use regex::{Captures, Regex};
use tracing::info;

use crate::mock::error::{FacadeError, FacadeResult};
use crate::mock::facade::SubmissionModel;
use crate::mock::state::SubmissionState;

/// Hooks of the mocked backend. Every hook defaults to doing nothing.
pub trait Scenario: Send + Sync + fmt::Debug {
    /// Id used to select the scenario, compared ignoring case
    fn id(&self) -> &'static str;

    /// Called before content gets uploaded
    fn start_upload(&self) -> FacadeResult<()> {
        Ok(())
    }

    /// Called before a submission gets cancelled
    ///
    /// Returning a result code skips the actual cancellation and reports
    /// that code instead.
    fn start_cancellation(&self) -> FacadeResult<Option<u16>> {
        Ok(None)
    }

    /// Called before any completed task gets downloaded
    fn start_download(&self) -> FacadeResult<()> {
        Ok(())
    }

    /// Post-process the pseudo-translated text of a single trans-unit
    fn post_translate_unit(&self, target: String) -> String {
        target
    }

    /// Post-process the whole pseudo-translated document
    fn post_translate_document(&self, document: String) -> String {
        document
    }

    /// Alter a submission before it is reported to the client
    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        base
    }
}

pub const NO_OPERATION: &str = "no-operation";
pub const GCC_OUTAGE_ON_UPLOAD: &str = "gcc-outage-on-upload";
pub const GCC_OUTAGE_ON_DOWNLOAD: &str = "gcc-outage-on-download";
pub const GCC_OUTAGE_ON_CANCELATION: &str = "gcc-outage-on-cancelation";
pub const CANCELATION_NOT_FOUND: &str = "cancelation-not-found";
pub const SUBMISSION_ERROR: &str = "submission-error";
pub const SUBMISSION_CANCELED_BY_GLOBALLINK: &str = "submission-canceled-by-globallink";
pub const SUBMISSION_REDELIVERED: &str = "submission-redelivered";
pub const FULL_REGULAR_APPROVAL_STATE_FLOW: &str = "full-regular-approval-state-flow";
pub const TRANSLATE_INVALID_XLIFF: &str = "translate-invalid-xliff";
pub const TRANSLATE_STRING_TOO_LONG: &str = "translate-string-too-long";
pub const TRANSLATE_EMPTY_TRANSUNIT_TARGET: &str = "translate-empty-transunit-target";
pub const TRANSLATE_INVALID_CONTENT_ID: &str = "translate-invalid-content-id";
pub const TRANSLATE_DOES_NOT_EXIST: &str = "translate-does-not-exist";

/// Ids of all available scenarios
pub const SCENARIO_IDS: [&str; 14] = [
    NO_OPERATION,
    GCC_OUTAGE_ON_UPLOAD,
    GCC_OUTAGE_ON_DOWNLOAD,
    GCC_OUTAGE_ON_CANCELATION,
    CANCELATION_NOT_FOUND,
    SUBMISSION_ERROR,
    SUBMISSION_CANCELED_BY_GLOBALLINK,
    SUBMISSION_REDELIVERED,
    FULL_REGULAR_APPROVAL_STATE_FLOW,
    TRANSLATE_INVALID_XLIFF,
    TRANSLATE_STRING_TOO_LONG,
    TRANSLATE_EMPTY_TRANSUNIT_TARGET,
    TRANSLATE_INVALID_CONTENT_ID,
    TRANSLATE_DOES_NOT_EXIST,
];

/// Look up a scenario by id, ignoring case
///
/// Returns `None` for blank or unknown ids.
///
/// # Example
///
/// ```ignore
/// let scenario = from_id("GCC-Outage-On-Upload").unwrap();
/// assert!(scenario.start_upload().is_err());
/// ```
pub fn from_id(id: &str) -> Option<Arc<dyn Scenario>> {
    let id = id.trim().to_lowercase();
    let scenario: Arc<dyn Scenario> = match id.as_str() {
        NO_OPERATION => Arc::new(NoOperation),
        GCC_OUTAGE_ON_UPLOAD => Arc::new(GccOutageOnUpload),
        GCC_OUTAGE_ON_DOWNLOAD => Arc::new(GccOutageOnDownload),
        GCC_OUTAGE_ON_CANCELATION => Arc::new(GccOutageOnCancelation),
        CANCELATION_NOT_FOUND => Arc::new(CancelationNotFound),
        SUBMISSION_ERROR => Arc::new(SubmissionError),
        SUBMISSION_CANCELED_BY_GLOBALLINK => Arc::new(SubmissionCanceledByGlobalLink),
        SUBMISSION_REDELIVERED => Arc::new(SubmissionRedelivered::default()),
        FULL_REGULAR_APPROVAL_STATE_FLOW => Arc::new(FullRegularApprovalStateFlow::default()),
        TRANSLATE_INVALID_XLIFF => Arc::new(TranslateInvalidXliff),
        TRANSLATE_STRING_TOO_LONG => Arc::new(TranslateStringTooLong),
        TRANSLATE_EMPTY_TRANSUNIT_TARGET => Arc::new(TranslateEmptyTransunitTarget),
        TRANSLATE_INVALID_CONTENT_ID => Arc::new(TranslateInvalidContentId),
        TRANSLATE_DOES_NOT_EXIST => Arc::new(TranslateDoesNotExist),
        _ => return None,
    };
    Some(scenario)
}

fn communication_error(operation: &str) -> FacadeError {
    FacadeError::Communication(format!(
        "Exception to test {} communication errors with translation service.",
        operation
    ))
}

/// States in which a real backend would refuse a cancellation
fn blocks_cancellation(state: SubmissionState) -> bool {
    matches!(
        state,
        SubmissionState::Cancelled
            | SubmissionState::CancellationConfirmed
            | SubmissionState::Completed
            | SubmissionState::Delivered
            | SubmissionState::Redelivered
    )
}

/// Keep a submission cancellable by reporting TRANSLATE instead
fn mask_as_translate(base: SubmissionModel) -> SubmissionModel {
    if blocks_cancellation(base.state) {
        SubmissionModel {
            state: SubmissionState::Translate,
            ..base
        }
    } else {
        base
    }
}

#[derive(Debug, Default)]
pub struct NoOperation;

impl Scenario for NoOperation {
    fn id(&self) -> &'static str {
        NO_OPERATION
    }
}

// ========== Outages ==========

#[derive(Debug, Default)]
pub struct GccOutageOnUpload;

impl Scenario for GccOutageOnUpload {
    fn id(&self) -> &'static str {
        GCC_OUTAGE_ON_UPLOAD
    }

    fn start_upload(&self) -> FacadeResult<()> {
        info!("Mock scenario '{}' simulates an upload outage.", self.id());
        Err(communication_error("upload"))
    }
}

#[derive(Debug, Default)]
pub struct GccOutageOnDownload;

impl Scenario for GccOutageOnDownload {
    fn id(&self) -> &'static str {
        GCC_OUTAGE_ON_DOWNLOAD
    }

    fn start_download(&self) -> FacadeResult<()> {
        info!("Mock scenario '{}' simulates a download outage.", self.id());
        Err(communication_error("download"))
    }
}

#[derive(Debug, Default)]
pub struct GccOutageOnCancelation;

impl Scenario for GccOutageOnCancelation {
    fn id(&self) -> &'static str {
        GCC_OUTAGE_ON_CANCELATION
    }

    fn start_cancellation(&self) -> FacadeResult<Option<u16>> {
        info!("Mock scenario '{}' simulates a cancellation outage.", self.id());
        Err(communication_error("cancel"))
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        mask_as_translate(base)
    }
}

#[derive(Debug, Default)]
pub struct CancelationNotFound;

impl Scenario for CancelationNotFound {
    fn id(&self) -> &'static str {
        CANCELATION_NOT_FOUND
    }

    fn start_cancellation(&self) -> FacadeResult<Option<u16>> {
        info!(
            "Mock scenario '{}' simulates cancellation of a non-existing submission, returning 404.",
            self.id()
        );
        Ok(Some(404))
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        mask_as_translate(base)
    }
}

// ========== Submission Interceptors ==========

#[derive(Debug, Default)]
pub struct SubmissionError;

impl Scenario for SubmissionError {
    fn id(&self) -> &'static str {
        SUBMISSION_ERROR
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        SubmissionModel {
            error: true,
            ..base
        }
    }
}

#[derive(Debug, Default)]
pub struct SubmissionCanceledByGlobalLink;

impl Scenario for SubmissionCanceledByGlobalLink {
    fn id(&self) -> &'static str {
        SUBMISSION_CANCELED_BY_GLOBALLINK
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        match base.state {
            SubmissionState::Completed | SubmissionState::Delivered => SubmissionModel {
                state: SubmissionState::Cancelled,
                ..base
            },
            _ => base,
        }
    }
}

/// Breaks the first download and reports the submission as redelivered
/// on the next completed observation
#[derive(Debug, Default)]
pub struct SubmissionRedelivered {
    completed: Mutex<HashSet<u64>>,
}

impl Scenario for SubmissionRedelivered {
    fn id(&self) -> &'static str {
        SUBMISSION_REDELIVERED
    }

    fn post_translate_document(&self, document: String) -> String {
        TranslateInvalidXliff.post_translate_document(document)
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        if base.state != SubmissionState::Completed {
            return base;
        }
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        if completed.insert(base.submission_id) {
            return base;
        }
        info!(
            "Submission {} was already completed once (with a broken download), now simulating redelivery.",
            base.submission_id
        );
        SubmissionModel {
            state: SubmissionState::Redelivered,
            ..base
        }
    }
}

const ENFORCED_STATE_FLOW: [SubmissionState; 8] = [
    SubmissionState::InPreProcess,
    SubmissionState::Started,
    SubmissionState::Analyzed,
    // The order of the approval states is not documented; any order will do.
    SubmissionState::AwaitingApproval,
    SubmissionState::AwaitingQuoteApproval,
    SubmissionState::Translate,
    SubmissionState::Review,
    SubmissionState::Completed,
];

#[derive(Debug, Default)]
struct StateFlow {
    seeded: bool,
    pending: VecDeque<SubmissionState>,
}

impl StateFlow {
    fn replay(&mut self, actual: SubmissionState) -> SubmissionState {
        if matches!(
            actual,
            SubmissionState::Cancelled | SubmissionState::CancellationConfirmed
        ) {
            self.pending.clear();
            return actual;
        }
        if actual == SubmissionState::Started && !self.seeded {
            self.seeded = true;
            self.pending.extend(ENFORCED_STATE_FLOW);
        }
        self.pending.pop_front().unwrap_or(actual)
    }
}

/// Reports all states of a regular approval flow, starting with the first
/// STARTED observation of a submission. Cancellation interrupts the flow.
#[derive(Debug, Default)]
pub struct FullRegularApprovalStateFlow {
    flows: Mutex<HashMap<u64, StateFlow>>,
}

impl Scenario for FullRegularApprovalStateFlow {
    fn id(&self) -> &'static str {
        FULL_REGULAR_APPROVAL_STATE_FLOW
    }

    fn intercept_submission(&self, base: SubmissionModel) -> SubmissionModel {
        let mut flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        let flow = flows.entry(base.submission_id).or_default();
        let replayed = flow.replay(base.state);
        if replayed == base.state {
            return base;
        }
        info!(
            "Submission {}: Replaying state {} instead of actual state {} (replay done? {}).",
            base.submission_id,
            replayed,
            base.state,
            flow.pending.is_empty()
        );
        SubmissionModel {
            state: replayed,
            ..base
        }
    }
}

// ========== Translation Interceptors ==========

/// Appends an element of a foreign namespace, which XLIFF schema
/// validation must reject.
#[derive(Debug, Default)]
pub struct TranslateInvalidXliff;

impl Scenario for TranslateInvalidXliff {
    fn id(&self) -> &'static str {
        TRANSLATE_INVALID_XLIFF
    }

    fn post_translate_document(&self, document: String) -> String {
        const INVALID: &str = r#"<invalid xmlns="intentionally"/>"#;
        match document.rfind("</") {
            Some(close) => {
                let mut broken = document;
                broken.insert_str(close, INVALID);
                broken
            }
            None => document + INVALID,
        }
    }
}

const LENGTH_CHALLENGE: usize = 2048;

const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipisici elit, sed eiusmod \
tempor incidunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
exercitation ullamco laboris nisi ut aliquid ex ea commodi consequat. Quis aute iure \
reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint \
obcaecat cupiditat non proident, sunt in culpa qui officia deserunt mollit anim id est laborum. \
Duis autem vel eum iriure dolor in hendrerit in vulputate velit esse molestie consequat, vel \
illum dolore eu feugiat nulla facilisis at vero eros et accumsan et iusto odio dignissim qui \
blandit praesent luptatum zzril delenit augue duis dolore te feugait nulla facilisi.";

/// Lorem ipsum text of exactly `length` characters
pub fn lorem_ipsum(length: usize) -> String {
    LOREM_IPSUM.chars().cycle().take(length).collect()
}

#[derive(Debug, Default)]
pub struct TranslateStringTooLong;

impl Scenario for TranslateStringTooLong {
    fn id(&self) -> &'static str {
        TRANSLATE_STRING_TOO_LONG
    }

    fn post_translate_unit(&self, target: String) -> String {
        let missing = LENGTH_CHALLENGE.saturating_sub(target.chars().count());
        target + &lorem_ipsum(missing)
    }
}

#[derive(Debug, Default)]
pub struct TranslateEmptyTransunitTarget;

impl Scenario for TranslateEmptyTransunitTarget {
    fn id(&self) -> &'static str {
        TRANSLATE_EMPTY_TRANSUNIT_TARGET
    }

    fn post_translate_unit(&self, _target: String) -> String {
        String::new()
    }
}

const CONTENT_ID_PREFIX: &str = "coremedia:///cap/content/";

static FILE_TARGET_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<file\b[^>]*?\bcmxliff:target=")([^"]*)(")"#)
        .expect("valid file target pattern")
});

/// Rewrite the content ids referenced by `<file cmxliff:target="...">`
///
/// `replacement` gets the index of the file element and the number of
/// content ids replaced so far; it is only called for content ids.
fn replace_content_ids(
    document: &str,
    mut replacement: impl FnMut(usize, usize) -> String,
) -> String {
    let mut index = 0;
    let mut replaced = 0;
    FILE_TARGET_ATTRIBUTE
        .replace_all(document, |caps: &Captures| {
            let file_index = index;
            index += 1;
            if !caps[2].starts_with(CONTENT_ID_PREFIX) {
                return caps[0].to_string();
            }
            let id = replacement(file_index, replaced);
            replaced += 1;
            format!("{}{}{}", &caps[1], id, &caps[3])
        })
        .into_owned()
}

/// Replaces content ids with ids of an unexpected format
#[derive(Debug, Default)]
pub struct TranslateInvalidContentId;

impl Scenario for TranslateInvalidContentId {
    fn id(&self) -> &'static str {
        TRANSLATE_INVALID_CONTENT_ID
    }

    fn post_translate_document(&self, document: String) -> String {
        replace_content_ids(&document, |file_index, _| format!("invalid:{}", file_index))
    }
}

/// Replaces content ids with ids of contents which do not exist
#[derive(Debug, Default)]
pub struct TranslateDoesNotExist;

impl Scenario for TranslateDoesNotExist {
    fn id(&self) -> &'static str {
        TRANSLATE_DOES_NOT_EXIST
    }

    fn post_translate_document(&self, document: String) -> String {
        replace_content_ids(&document, |_, replaced| {
            format!("{}{}", CONTENT_ID_PREFIX, 999_998 - 2 * replaced)
        })
    }
}
