//! Profile storage and repair
//!
//! Profiles are read through [`ProfileStore`], which treats "no row" as an
//! answer rather than an error. A missing row is created by the idempotent
//! [`ProfileRepair`] action.

mod repair;
mod store;
mod types;

use async_trait::async_trait;

use castgate_auth::Session;

use crate::error::Result;

pub use repair::{HttpProfileRepair, RepairOutcome};
pub use store::PostgrestProfileStore;
pub use types::*;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The session's own profile, `None` when the row does not exist.
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>>;

    /// Writes `update` to the session's profile and returns the stored row.
    async fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>>;
}

#[async_trait]
pub trait ProfileRepair: Send + Sync {
    /// Makes sure a profile exists for the session's subject.
    async fn ensure_profile(&self, session: &Session) -> Result<RepairOutcome>;
}
