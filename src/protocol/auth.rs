//! Push/pull authorization. An explicitly configured flag always wins; when it is left
//! unspecified the repository's own default (as reported by the adapter) decides.

use serde::{Deserialize, Serialize};

use super::types::Direction;
use crate::adapter::RepositoryAdapter;

/// Kind of access a request needs on a repository.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// `Unknown` only survives on the refs endpoint when it is used read-only (dumb clients or
    /// an unrecognised service), so it needs read access.
    pub fn required_for(direction: Direction) -> Access {
        match direction {
            Direction::Pull | Direction::Unknown => Access::Read,
            Direction::Push => Access::Write,
        }
    }
}

/// Server-wide push/pull policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub allow_push: Option<bool>,
    pub allow_pull: Option<bool>,
}

impl AccessPolicy {
    pub fn configured(&self, access: Access) -> Option<bool> {
        match access {
            Access::Read => self.allow_pull,
            Access::Write => self.allow_push,
        }
    }

    /// Decide whether `direction` is allowed against the repository behind `adapter`.
    ///
    /// The adapter is only consulted when the policy leaves the flag unspecified.
    pub async fn authorized<A>(&self, direction: Direction, adapter: &A) -> bool
    where
        A: RepositoryAdapter + ?Sized,
    {
        let access = Access::required_for(direction);
        let allowed = match self.configured(access) {
            Some(allowed) => allowed,
            None => match access {
                Access::Read => adapter.allow_pull().await,
                Access::Write => adapter.allow_push().await,
            },
        };
        tracing::debug!(?direction, ?access, allowed, "authorization decision");
        allowed
    }
}
