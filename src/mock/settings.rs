//! Settings of the mocked backend
//!
//! Settings are read from the backend configuration, a JSON tree whose
//! `mock` entry configures the mock:
//!
//! ```json
//! { "mock": {
//!     "stateChangeDelaySeconds": 2,
//!     "stateChangeDelayOffsetPercentage": 20,
//!     "error": "upload_communication",
//!     "scenario": "submission-redelivered",
//!     "submissionStates": { "COMPLETED": { "after": "REDELIVERED", "final": true } }
//! } }
//! ```
//!
//! Every key is optional. Values of the wrong type fall back to the
//! defaults; only an out-of-range offset percentage is rejected.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::mock::error::{FacadeError, FacadeResult};
use crate::mock::scenarios::{self, NoOperation, Scenario};
use crate::mock::submission_states::MockSubmissionStates;

pub const CONFIG_MOCK: &str = "mock";
pub const CONFIG_STATE_CHANGE_DELAY_SECONDS: &str = "stateChangeDelaySeconds";
pub const CONFIG_STATE_CHANGE_DELAY_OFFSET_PERCENTAGE: &str = "stateChangeDelayOffsetPercentage";
/// Superseded by [`CONFIG_STATE_CHANGE_DELAY_SECONDS`]
pub const LEGACY_CONFIG_DELAY_SECONDS: &str = "mockDelaySeconds";
/// Superseded by [`CONFIG_STATE_CHANGE_DELAY_OFFSET_PERCENTAGE`]
pub const LEGACY_CONFIG_DELAY_OFFSET_PERCENTAGE: &str = "mockDelayOffsetPercentage";
pub const CONFIG_ERROR: &str = "error";
pub const CONFIG_SCENARIO: &str = "scenario";
pub const CONFIG_SUBMISSION_STATES: &str = "submissionStates";

pub const DEFAULT_STATE_CHANGE_DELAY_SECONDS: u64 = 120;
pub const DEFAULT_STATE_CHANGE_DELAY_OFFSET_PERCENTAGE: u8 = 50;

/// Errors to force at the checkpoints of the mocked backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForcedError {
    /// Cancellation fails with a communication error
    CancelCommunication,
    /// Cancellation is skipped and reports 404
    CancelResult,
    /// Download fails with a communication error
    DownloadCommunication,
    /// Downloaded XLIFF is invalid
    DownloadXliff,
    /// Submissions are reported with their error flag set
    SubmissionError,
    /// Upload fails with a communication error
    UploadCommunication,
}

impl ForcedError {
    pub const ALL: [ForcedError; 6] = [
        ForcedError::CancelCommunication,
        ForcedError::CancelResult,
        ForcedError::DownloadCommunication,
        ForcedError::DownloadXliff,
        ForcedError::SubmissionError,
        ForcedError::UploadCommunication,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ForcedError::CancelCommunication => "CANCEL_COMMUNICATION",
            ForcedError::CancelResult => "CANCEL_RESULT",
            ForcedError::DownloadCommunication => "DOWNLOAD_COMMUNICATION",
            ForcedError::DownloadXliff => "DOWNLOAD_XLIFF",
            ForcedError::SubmissionError => "SUBMISSION_ERROR",
            ForcedError::UploadCommunication => "UPLOAD_COMMUNICATION",
        }
    }

    /// Parse a name, ignoring case. Empty and unknown names give `None`.
    pub fn try_parse(name: &str) -> Option<ForcedError> {
        let name = name.trim();
        ForcedError::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ForcedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct MockSettings {
    state_change_delay_seconds: u64,
    state_change_delay_offset_percentage: u8,
    error: Option<ForcedError>,
    scenario: Arc<dyn Scenario>,
    submission_states: MockSubmissionStates,
}

impl Default for MockSettings {
    fn default() -> Self {
        MockSettings {
            state_change_delay_seconds: DEFAULT_STATE_CHANGE_DELAY_SECONDS,
            state_change_delay_offset_percentage: DEFAULT_STATE_CHANGE_DELAY_OFFSET_PERCENTAGE,
            error: None,
            scenario: Arc::new(NoOperation),
            submission_states: MockSubmissionStates::default(),
        }
    }
}

impl MockSettings {
    /// Settings with the given timing and everything else at default
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Config`] if the offset percentage exceeds 100.
    pub fn new(
        state_change_delay_seconds: u64,
        state_change_delay_offset_percentage: u8,
    ) -> FacadeResult<Self> {
        validate_offset_percentage(i64::from(state_change_delay_offset_percentage))?;
        Ok(MockSettings {
            state_change_delay_seconds,
            state_change_delay_offset_percentage,
            ..Default::default()
        })
    }

    pub fn with_error(mut self, error: Option<ForcedError>) -> Self {
        self.error = error;
        self
    }

    pub fn with_scenario(mut self, scenario: Arc<dyn Scenario>) -> Self {
        info!("Active scenario: {}", scenario.id());
        self.scenario = scenario;
        self
    }

    pub fn with_submission_states(mut self, submission_states: MockSubmissionStates) -> Self {
        self.submission_states = submission_states;
        self
    }

    pub fn state_change_delay_seconds(&self) -> u64 {
        self.state_change_delay_seconds
    }

    pub fn state_change_delay_offset_percentage(&self) -> u8 {
        self.state_change_delay_offset_percentage
    }

    pub fn error(&self) -> Option<ForcedError> {
        self.error
    }

    pub fn scenario(&self) -> &Arc<dyn Scenario> {
        &self.scenario
    }

    pub fn submission_states(&self) -> &MockSubmissionStates {
        &self.submission_states
    }

    /// Read the settings from the `mock` entry of the backend configuration
    ///
    /// A missing or non-object `mock` entry gives the defaults.
    pub fn from_global_link_config(config: &Value) -> FacadeResult<Self> {
        match config.get(CONFIG_MOCK) {
            Some(mock) if mock.is_object() => MockSettings::from_mock_config(mock),
            Some(mock) => {
                warn!("Ignoring invalid mock configuration: {}", mock);
                Ok(MockSettings::default())
            }
            None => Ok(MockSettings::default()),
        }
    }

    /// Read the settings from the mock configuration object
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Config`] if the offset percentage is outside
    /// of `[0, 100]`.
    pub fn from_mock_config(config: &Value) -> FacadeResult<Self> {
        let Some(map) = config.as_object().filter(|m| !m.is_empty()) else {
            return Ok(MockSettings::default());
        };
        let lookup = |key: &str, legacy: &str| map.get(key).or_else(|| map.get(legacy));

        let mut settings = MockSettings::default();

        if let Some(value) = lookup(
            CONFIG_STATE_CHANGE_DELAY_SECONDS,
            LEGACY_CONFIG_DELAY_SECONDS,
        ) {
            let seconds = value.as_u64().or_else(|| {
                value
                    .as_f64()
                    .filter(|s| *s >= 0.0)
                    .map(|s| s.trunc() as u64)
            });
            match seconds {
                Some(seconds) => settings.state_change_delay_seconds = seconds,
                None => warn!("Ignoring invalid state change delay: {}", value),
            }
        }

        if let Some(value) = lookup(
            CONFIG_STATE_CHANGE_DELAY_OFFSET_PERCENTAGE,
            LEGACY_CONFIG_DELAY_OFFSET_PERCENTAGE,
        ) {
            let percentage = value
                .as_i64()
                .or_else(|| value.as_f64().map(|p| p.trunc() as i64));
            match percentage {
                Some(percentage) => {
                    settings.state_change_delay_offset_percentage =
                        validate_offset_percentage(percentage)?;
                }
                None => warn!("Ignoring invalid state change delay offset: {}", value),
            }
        }

        match map.get(CONFIG_ERROR) {
            Some(Value::String(name)) => {
                settings.error = ForcedError::try_parse(name);
                if settings.error.is_none() && !name.trim().is_empty() {
                    warn!("Ignoring unknown mock error: {}", name);
                }
            }
            Some(value) => warn!("Ignoring invalid mock error: {}", value),
            None => {}
        }

        match map.get(CONFIG_SCENARIO) {
            Some(Value::String(id)) => match scenarios::from_id(id) {
                Some(scenario) => settings = settings.with_scenario(scenario),
                None => warn!("Unknown scenario '{}', falling back to no-operation.", id),
            },
            Some(value) => warn!("Ignoring invalid scenario: {}", value),
            None => {}
        }

        if let Some(value) = map.get(CONFIG_SUBMISSION_STATES) {
            settings.submission_states = MockSubmissionStates::from_config(value);
        }

        debug!("Parsed mock settings: {:?}", settings);
        Ok(settings)
    }
}

fn validate_offset_percentage(percentage: i64) -> FacadeResult<u8> {
    u8::try_from(percentage)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| {
            FacadeError::Config(format!(
                "Offset percentage must be between 0 and 100, got {}.",
                percentage
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::state::SubmissionState;
    use serde_json::json;

    // ========== Forced Error Tests ==========

    #[test]
    fn test_forced_error_parse() {
        assert_eq!(
            ForcedError::try_parse("upload_communication"),
            Some(ForcedError::UploadCommunication)
        );
        assert_eq!(
            ForcedError::try_parse("CANCEL_RESULT"),
            Some(ForcedError::CancelResult)
        );
        assert_eq!(ForcedError::try_parse(""), None);
        assert_eq!(ForcedError::try_parse("upload"), None);
    }

    // ========== Construction Tests ==========

    #[test]
    fn test_defaults() {
        let settings = MockSettings::default();
        assert_eq!(settings.state_change_delay_seconds(), 120);
        assert_eq!(settings.state_change_delay_offset_percentage(), 50);
        assert_eq!(settings.error(), None);
        assert_eq!(settings.scenario().id(), scenarios::NO_OPERATION);
        assert!(settings.submission_states().is_empty());
    }

    #[test]
    fn test_new_rejects_offset_above_100() {
        assert!(MockSettings::new(1, 100).is_ok());
        assert!(matches!(
            MockSettings::new(1, 150),
            Err(FacadeError::Config(_))
        ));
    }

    // ========== Config Tests ==========

    #[test]
    fn test_full_config() {
        let settings = MockSettings::from_global_link_config(&json!({
            "mock": {
                "stateChangeDelaySeconds": 2,
                "stateChangeDelayOffsetPercentage": 20,
                "error": "download_xliff",
                "scenario": "Submission-Redelivered",
                "submissionStates": { "COMPLETED": { "after": "REDELIVERED", "final": true } }
            }
        }))
        .unwrap();
        assert_eq!(settings.state_change_delay_seconds(), 2);
        assert_eq!(settings.state_change_delay_offset_percentage(), 20);
        assert_eq!(settings.error(), Some(ForcedError::DownloadXliff));
        assert_eq!(settings.scenario().id(), scenarios::SUBMISSION_REDELIVERED);
        assert!(
            settings
                .submission_states()
                .pointcut(SubmissionState::Completed)
                .is_some()
        );
    }

    #[test]
    fn test_legacy_keys() {
        let settings = MockSettings::from_mock_config(&json!({
            "mockDelaySeconds": 7,
            "mockDelayOffsetPercentage": 0
        }))
        .unwrap();
        assert_eq!(settings.state_change_delay_seconds(), 7);
        assert_eq!(settings.state_change_delay_offset_percentage(), 0);
    }

    #[test]
    fn test_modern_keys_win_over_legacy() {
        let settings = MockSettings::from_mock_config(&json!({
            "stateChangeDelaySeconds": 3,
            "mockDelaySeconds": 7
        }))
        .unwrap();
        assert_eq!(settings.state_change_delay_seconds(), 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = MockSettings::from_mock_config(&json!({
            "stateChangeDelaySeconds": "soon",
            "stateChangeDelayOffsetPercentage": [],
            "error": "nonsense",
            "scenario": "no-such-scenario"
        }))
        .unwrap();
        assert_eq!(settings.state_change_delay_seconds(), 120);
        assert_eq!(settings.state_change_delay_offset_percentage(), 50);
        assert_eq!(settings.error(), None);
        assert_eq!(settings.scenario().id(), scenarios::NO_OPERATION);
    }

    #[test]
    fn test_fractional_values_truncate() {
        let settings = MockSettings::from_mock_config(&json!({
            "stateChangeDelaySeconds": 2.9,
            "stateChangeDelayOffsetPercentage": 20.5
        }))
        .unwrap();
        assert_eq!(settings.state_change_delay_seconds(), 2);
        assert_eq!(settings.state_change_delay_offset_percentage(), 20);
    }

    #[test]
    fn test_offset_out_of_range_fails() {
        for offset in [150, -1] {
            let result = MockSettings::from_mock_config(&json!({
                "stateChangeDelayOffsetPercentage": offset
            }));
            assert!(matches!(result, Err(FacadeError::Config(_))), "{}", offset);
        }
    }

    #[test]
    fn test_missing_or_invalid_mock_entry() {
        let missing = MockSettings::from_global_link_config(&json!({ "apiKey": "x" })).unwrap();
        assert_eq!(missing.state_change_delay_seconds(), 120);
        let invalid = MockSettings::from_global_link_config(&json!({ "mock": 5 })).unwrap();
        assert_eq!(invalid.state_change_delay_seconds(), 120);
    }
}
