//! A deterministic stand-in for an asynchronous translation backend.
//!
//! Contents are uploaded, bundled into submissions and "translated" into
//! pseudo-localized XLIFF after a configurable delay. Submission states are
//! derived from their tasks, and scenarios inject the failures a real backend
//! may show, so translation workflows can be tested without waiting for
//! hours or talking to the network.

pub mod mock;

// Re-export the client surface for convenient access
pub use mock::{
    FacadeError, FacadeResult, MockBackend, MockSettings, MockedExchangeFacade, SubmissionModel,
    SubmissionRequest, SubmissionState, TaskModel, TranslationFacade,
};
