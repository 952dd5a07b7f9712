use crate::error::CloudError;
use crate::{ControlPlane, ControlPlaneConnector, Credentials};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Memoizes authenticated control-plane handles by their full credential
/// tuple, with unconditional invalidation.
///
/// The cache is the single owner of cached handles; other components hold
/// a handle only for the duration of one call. The entries lock is held
/// across client construction, so a handle built before an `invalidate`
/// can never be inserted after it.
pub struct CredentialCache {
    connector: Arc<dyn ControlPlaneConnector>,
    defaults: Credentials,
    entries: Mutex<HashMap<Credentials, Arc<dyn ControlPlane>>>,
}

impl CredentialCache {
    pub fn new(connector: Arc<dyn ControlPlaneConnector>, defaults: Credentials) -> Self {
        Self {
            connector,
            defaults,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cached handle for `credentials`, constructing and caching
    /// one on miss. `None` selects the process-wide default credential
    /// set. Construction failures propagate and nothing is cached.
    pub async fn get(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ControlPlane>, CloudError> {
        let credentials = credentials.unwrap_or(&self.defaults);

        let mut entries = self.entries.lock().await;
        if let Some(handle) = entries.get(credentials) {
            return Ok(handle.clone());
        }

        let handle = self
            .connector
            .connect(credentials)
            .await
            .map_err(|e| CloudError::Auth(e.to_string()))?;
        entries.insert(credentials.clone(), handle.clone());
        Ok(handle)
    }

    /// Clear all cached handles. The next `get` re-authenticates.
    pub async fn invalidate(&self) {
        self.entries.lock().await.clear();
    }
}
