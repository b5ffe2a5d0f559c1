//! Staging area for uploaded content
//!
//! Uploaded content waits here under a random handle until a submission
//! consumes it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::trace;
use uuid::Uuid;

use crate::mock::error::{FacadeError, FacadeResult};

#[derive(Debug, Default)]
pub struct ContentStore {
    contents: Mutex<HashMap<String, String>>,
}

impl ContentStore {
    pub fn new() -> Self {
        ContentStore::default()
    }

    /// Stage `content`, returning a fresh handle
    pub fn add(&self, content: String) -> String {
        let handle = Uuid::new_v4().to_string();
        trace!("Staging content as {} ({} bytes)", handle, content.len());
        self.lock().insert(handle.clone(), content);
        handle
    }

    /// Take the content staged under `handle`
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::ContentNotFound`] for unknown or already
    /// consumed handles.
    pub fn remove(&self, handle: &str) -> FacadeResult<String> {
        self.lock()
            .remove(handle)
            .ok_or_else(|| FacadeError::ContentNotFound(handle.to_string()))
    }

    /// Take the contents staged under all `handles`, in order
    ///
    /// Either every handle is consumed or none is.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::ContentNotFound`] for the first unknown or
    /// already consumed handle.
    pub fn remove_all<'a, I>(&self, handles: I) -> FacadeResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let mut contents = self.lock();
        if let Some(missing) = handles
            .clone()
            .into_iter()
            .find(|handle| !contents.contains_key(*handle))
        {
            return Err(FacadeError::ContentNotFound(missing.to_string()));
        }
        Ok(handles
            .into_iter()
            .filter_map(|handle| contents.remove(handle))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
