use chrono::Utc;
use launchpad_common::{fields, Account, AccountRef, LaunchpadError, RecordId, Result};
use launchpad_store::typed::find_one_as;
use launchpad_store::{Filter, Update};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{SocialService, ACCOUNTS, EVENTS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub uid: AccountRef,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Profile changes. Absent fields are left as they are; relationship
/// fields (`savedEventRefs`, `likedComments`) are never written here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AccountUpdate {
    fn to_update(&self) -> Update {
        let mut update = Update::new();
        if let Some(name) = &self.display_name {
            update = update.set(fields::DISPLAY_NAME, name.as_str());
        }
        if let Some(email) = &self.email {
            update = update.set(fields::EMAIL, email.as_str());
        }
        update
    }
}

impl SocialService {
    pub async fn get_account(&self, uid: &AccountRef) -> Result<Account> {
        find_one_as(self.store.as_ref(), ACCOUNTS, &Self::account_filter(uid.as_str()))
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("account {uid}")))
    }

    /// Create an account for `uid`. Fails with [`LaunchpadError::Conflict`]
    /// when one already exists.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account> {
        let update = Update::new()
            .set_on_insert(fields::DISPLAY_NAME, input.display_name.clone())
            .set_on_insert(fields::EMAIL, input.email.clone())
            .set_on_insert(fields::SAVED_EVENT_REFS, json!([]))
            .set_on_insert(fields::LIKED_COMMENTS, json!([]))
            .set_on_insert(fields::CREATED_AT, json!(Utc::now()))
            .upsert(true);

        let result = self
            .store
            .update_one(ACCOUNTS, &Self::account_filter(input.uid.as_str()), &update)
            .await?;
        if result.upserted_id.is_none() {
            return Err(LaunchpadError::Conflict(format!("account {} already exists", input.uid)));
        }

        info!(account = %input.uid, "Account created");
        self.get_account(&input.uid).await
    }

    pub async fn update_account(&self, uid: &AccountRef, changes: AccountUpdate) -> Result<Account> {
        let update = changes.to_update();
        if update.ops.is_empty() {
            return self.get_account(uid).await;
        }

        let result = self
            .store
            .update_one(ACCOUNTS, &Self::account_filter(uid.as_str()), &update)
            .await?;
        if result.matched == 0 {
            return Err(LaunchpadError::NotFound(format!("account {uid}")));
        }
        if result.changed() {
            info!(account = %uid, "Account updated");
        }
        self.get_account(uid).await
    }

    /// Delete the account and withdraw its interest from the events it saved.
    /// Event cleanup is best-effort; anything missed is fixed by the repair sweep.
    pub async fn delete_account(&self, uid: &AccountRef) -> Result<()> {
        let account = self.get_account(uid).await?;

        let deleted = self
            .store
            .delete_one(ACCOUNTS, &Self::account_filter(uid.as_str()))
            .await?;
        if deleted == 0 {
            return Err(LaunchpadError::NotFound(format!("account {uid}")));
        }

        for event in &account.saved_event_refs {
            self.withdraw_interest(event, uid).await;
        }
        info!(account = %uid, saved = account.saved_event_refs.len(), "Account deleted");
        Ok(())
    }

    pub(crate) async fn withdraw_interest(&self, event: &RecordId, uid: &AccountRef) {
        let filter = Filter::id(event).and(Filter::contains(fields::INTERESTED_BY, uid.as_str()));
        let update = Update::new()
            .pull(fields::INTERESTED_BY, uid.as_str())
            .inc(fields::INTEREST_COUNT, -1);
        if let Err(e) = self.store.update_one(EVENTS, &filter, &update).await {
            warn!(%event, account = %uid, error = %e, "Failed to withdraw interest");
        }
    }
}
