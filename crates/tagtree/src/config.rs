use serde::{Deserialize, Serialize};
use tagtree_log::LogContainer;

/// What operations do before the store is ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyPolicy {
    /// Wait for readiness, then run.
    #[default]
    Wait,
    /// Fail immediately with `NotReady`.
    FailFast,
}

/// Options for [`TaggedStore::create`](crate::TaggedStore::create) and
/// [`TaggedStore::attach`](crate::TaggedStore::attach).
#[derive(Clone, Debug, Default)]
pub struct TaggedStoreConfig {
    /// Container to keep the logs in. A fresh in-memory one when `None`.
    pub storage: Option<LogContainer>,
    /// Opaque bytes stored in the bootstrap record on create.
    pub user_data: Option<Vec<u8>>,
    pub ready_policy: ReadyPolicy,
}

impl TaggedStoreConfig {
    pub fn with_storage(mut self, storage: LogContainer) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<Vec<u8>>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn with_ready_policy(mut self, policy: ReadyPolicy) -> Self {
        self.ready_policy = policy;
        self
    }
}
