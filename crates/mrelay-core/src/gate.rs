//! Access gating, consulted before any job is admitted.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::job::UserId;

/// Decides whether a user may submit jobs. Checked by the service before the
/// scheduler is ever consulted, so unauthorized submissions cost no I/O.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn is_authorized(&self, user: UserId) -> bool;
}

/// Gate that admits everyone.
pub struct OpenGate;

#[async_trait]
impl AccessGate for OpenGate {
    async fn is_authorized(&self, _user: UserId) -> bool {
        true
    }
}

/// Gate backed by a fixed allow-list of user ids.
pub struct AllowListGate {
    allowed: HashSet<UserId>,
}

impl AllowListGate {
    pub fn new(allowed: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AccessGate for AllowListGate {
    async fn is_authorized(&self, user: UserId) -> bool {
        self.allowed.contains(&user)
    }
}
