//! Replay of submission states
//!
//! A submission state may be surrounded or replaced by other states. This
//! is meant to test state progressions controlled by the backend, which the
//! task-driven mock never reaches on its own, such as REDELIVERED after
//! completion.
//!
//! Configuration by example:
//!
//! ```json
//! {
//!   "COMPLETED": { "after": "REDELIVERED", "final": true },
//!   "DELIVERED": { "override": ["OTHER", "REDELIVERED"] },
//!   "REVIEW": { "before": "OTHER" }
//! }
//! ```
//!
//! With `before` and `after` the original state is reached as well, with
//! `override` it is not. Without `final` the normal transitions take over
//! again once the scripted states are used up. With `final`, the last
//! scripted state is kept forever. If only `final` is given, the state is
//! frozen as is.
//!
//! While a replay is running, the states it yields are not intercepted by
//! other pointcuts.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::{debug, trace};

use crate::mock::state::SubmissionState;

/// Pointcut for a single nominal submission state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePointcut {
    pub before: Vec<SubmissionState>,
    pub after: Vec<SubmissionState>,
    pub replace: Vec<SubmissionState>,
    pub final_state: bool,
}

impl StatePointcut {
    /// True, if no states are scripted
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.replace.is_empty()
    }

    /// Parse a pointcut from its configuration object
    ///
    /// Recognized keys are `before`, `after`, `override` and `final`; all
    /// optional. Anything invalid is ignored. Returns `None` for anything
    /// but a non-empty object.
    pub fn from_config(config: &Value) -> Option<StatePointcut> {
        let map = config.as_object().filter(|m| !m.is_empty())?;
        Some(StatePointcut {
            before: parse_state_list(map.get("before")),
            after: parse_state_list(map.get("after")),
            replace: parse_state_list(map.get("override")),
            final_state: map.get("final").and_then(Value::as_bool).unwrap_or(false),
        })
    }
}

/// Accept a single state name or a list of them, dropping everything that
/// does not name a known state.
fn parse_state_list(config: Option<&Value>) -> Vec<SubmissionState> {
    match config {
        Some(Value::String(name)) => SubmissionState::find_by_name(name).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(SubmissionState::find_by_name)
            .collect(),
        _ => Vec::new(),
    }
}

/// Pointcuts by nominal submission state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockSubmissionStates {
    pointcuts: HashMap<SubmissionState, StatePointcut>,
}

impl MockSubmissionStates {
    pub fn new(pointcuts: HashMap<SubmissionState, StatePointcut>) -> Self {
        MockSubmissionStates { pointcuts }
    }

    pub fn is_empty(&self) -> bool {
        self.pointcuts.is_empty()
    }

    pub fn pointcut(&self, state: SubmissionState) -> Option<&StatePointcut> {
        self.pointcuts.get(&state)
    }

    /// Parse the pointcut map, skipping unknown states and invalid entries
    pub fn from_config(config: &Value) -> MockSubmissionStates {
        let Some(map) = config.as_object() else {
            debug!("Ignoring invalid submission states configuration: {}", config);
            return MockSubmissionStates::default();
        };
        let mut pointcuts = HashMap::new();
        for (name, state_config) in map {
            let Some(state) = SubmissionState::find_by_name(name) else {
                debug!("Ignoring unknown submission state: {}", name);
                continue;
            };
            if !state_config.is_object() {
                debug!(
                    "Ignoring invalid configuration for submission state {}: {}",
                    name, state_config
                );
                continue;
            }
            if let Some(pointcut) = StatePointcut::from_config(state_config) {
                pointcuts.insert(state, pointcut);
            }
        }
        MockSubmissionStates { pointcuts }
    }

    /// Build a replay for `state`, if a pointcut is configured for it
    ///
    /// The replay yields `before`, then `override` (or `state` itself if
    /// nothing overrides it), then `after`.
    pub fn replay_scenario(&self, state: SubmissionState) -> Option<ReplayScenario> {
        let Some(pointcut) = self.pointcuts.get(&state) else {
            trace!("No mock submission state configuration for state: {}", state);
            return None;
        };
        if pointcut.is_empty() {
            return pointcut
                .final_state
                .then(|| ReplayScenario::new(vec![state], true));
        }
        let mut states = pointcut.before.clone();
        if pointcut.replace.is_empty() {
            states.push(state);
        } else {
            states.extend(&pointcut.replace);
        }
        states.extend(&pointcut.after);
        Some(ReplayScenario::new(states, pointcut.final_state))
    }
}

/// States still to be replayed for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayScenario {
    states: VecDeque<SubmissionState>,
    final_state: bool,
}

impl ReplayScenario {
    pub fn new(states: Vec<SubmissionState>, final_state: bool) -> Self {
        ReplayScenario {
            states: states.into(),
            final_state,
        }
    }

    /// Number of states left
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Next state to report. A final replay never gives up its last state.
    pub fn next_state(&mut self) -> Option<SubmissionState> {
        let state = if self.final_state && self.states.len() == 1 {
            self.states.front().copied()
        } else {
            self.states.pop_front()
        };
        trace!("State to replay: {:?}", state);
        state
    }
}
