use launchpad_common::{fields, Account, AccountRef, LaunchpadError, RecordId, Result};
use launchpad_store::typed::find_one_as;
use launchpad_store::{Filter, Update};
use serde::Serialize;
use tracing::{error, info};

use crate::{SocialService, ACCOUNTS, EVENTS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestOutcome {
    /// Whether the account is interested after the toggle.
    pub interested: bool,
}

impl SocialService {
    /// Add the account to the event's interest set, or remove it if present,
    /// and mirror the change on the account's saved events.
    ///
    /// The event write is conditional on the membership observed when the
    /// event was loaded, so a concurrent toggle makes it match nothing and
    /// the call reports [`LaunchpadError::NoUpdate`] without touching the
    /// account. If the event write lands and the account write does not,
    /// the result is [`LaunchpadError::PartialConsistency`] and the event
    /// write stays; the repair sweep reconciles the account later.
    pub async fn toggle_interest(&self, event: &RecordId, account: &AccountRef) -> Result<InterestOutcome> {
        let record = self.load_event(event).await?;
        let _: Account = find_one_as(self.store.as_ref(), ACCOUNTS, &Self::account_filter(account.as_str()))
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("account {account}")))?;

        let was_interested = record.is_interested(account);
        let (event_filter, event_update, account_update) = if was_interested {
            (
                Filter::id(event).and(Filter::contains(fields::INTERESTED_BY, account.as_str())),
                Update::new()
                    .pull(fields::INTERESTED_BY, account.as_str())
                    .inc(fields::INTEREST_COUNT, -1),
                Update::new().pull(fields::SAVED_EVENT_REFS, event.as_str()),
            )
        } else {
            (
                Filter::id(event).and(Filter::not_contains(fields::INTERESTED_BY, account.as_str())),
                Update::new()
                    .add_to_set(fields::INTERESTED_BY, account.as_str())
                    .inc(fields::INTEREST_COUNT, 1),
                Update::new().add_to_set(fields::SAVED_EVENT_REFS, event.as_str()),
            )
        };

        let event_result = self.store.update_one(EVENTS, &event_filter, &event_update).await?;
        if event_result.modified == 0 {
            return Err(LaunchpadError::NoUpdate(format!(
                "interest of {account} in event {event} changed concurrently"
            )));
        }

        let account_result = self
            .store
            .update_one(ACCOUNTS, &Self::account_filter(account.as_str()), &account_update)
            .await;
        let failed = match account_result {
            Ok(result) if result.modified > 0 => None,
            Ok(_) => Some("account saved events unchanged".to_string()),
            Err(e) => Some(format!("account update failed: {e}")),
        };

        if let Some(reason) = failed {
            error!(%event, %account, reason = %reason, "Interest toggle half-applied");
            return Err(LaunchpadError::PartialConsistency {
                operation: "toggle-interest",
                applied: format!("event {event} interest"),
                failed: format!("account {account} saved events ({reason})"),
            });
        }

        let interested = !was_interested;
        info!(%event, %account, interested, "Interest toggled");
        Ok(InterestOutcome { interested })
    }
}
