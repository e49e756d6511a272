//! Social state layered on synced events: interest, comments, replies, likes,
//! and the accounts that hold the other side of those relationships.
//!
//! Every mutation is one or two single-document updates. There are no
//! cross-document transactions; the interest pairing is kept honest by
//! [`repair`].

pub mod accounts;
pub mod comments;
pub mod interest;
pub mod repair;

use std::sync::Arc;

use launchpad_common::{fields, EntityKind, EntityRecord, LaunchpadError, RecordId, Result};
use launchpad_store::typed::find_one_as;
use launchpad_store::{Collection, DocumentStore, Filter};

pub use accounts::{AccountUpdate, NewAccount};
pub use comments::{NewComment, NewReply};
pub use interest::InterestOutcome;
pub use repair::RepairReport;

pub(crate) const EVENTS: Collection = Collection::Entities(EntityKind::Event);
pub(crate) const ACCOUNTS: Collection = Collection::Accounts;

#[derive(Clone)]
pub struct SocialService {
    store: Arc<dyn DocumentStore>,
}

impl SocialService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) async fn load_event(&self, event: &RecordId) -> Result<EntityRecord> {
        find_one_as(self.store.as_ref(), EVENTS, &Filter::id(event))
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("event {event}")))
    }

    pub(crate) fn account_filter(uid: &str) -> Filter {
        Filter::eq(fields::UID, uid)
    }
}
