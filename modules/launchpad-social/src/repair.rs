// Periodic sweep restoring the interest pairing between events and accounts.
//
// The event's `interestedBy` is authoritative: accounts are linked or
// unlinked to agree with it, references to deleted accounts are dropped, and
// `interestCount` is reset to the size of the set.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use launchpad_common::{fields, Account, AccountRef, EntityRecord, Result, Shutdown};
use launchpad_store::typed::find_all_as;
use launchpad_store::{Filter, Update};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{SocialService, ACCOUNTS, EVENTS};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub events_checked: usize,
    /// Saved-event references added to accounts.
    pub linked: usize,
    /// Saved-event references removed from accounts.
    pub unlinked: usize,
    /// Interest entries removed because their account no longer exists.
    pub dangling_removed: usize,
    /// Events whose `interestCount` was corrected.
    pub counts_fixed: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.linked == 0 && self.unlinked == 0 && self.dangling_removed == 0 && self.counts_fixed == 0
    }
}

impl SocialService {
    pub async fn repair_interest(&self) -> Result<RepairReport> {
        let events: Vec<EntityRecord> = find_all_as(self.store.as_ref(), EVENTS).await?;
        let accounts: Vec<Account> = find_all_as(self.store.as_ref(), ACCOUNTS).await?;
        let saved: HashMap<&AccountRef, HashSet<&str>> = accounts
            .iter()
            .map(|a| (&a.uid, a.saved_event_refs.iter().map(|r| r.as_str()).collect()))
            .collect();

        let mut report = RepairReport {
            events_checked: events.len(),
            ..Default::default()
        };

        for event in &events {
            let event_ref = event.record_id.as_str();
            let mut dangling = Vec::new();
            let mut members = HashSet::new();

            for uid in &event.interested_by {
                match saved.get(uid) {
                    None => dangling.push(uid),
                    Some(refs) => {
                        members.insert(uid);
                        if !refs.contains(event_ref) {
                            let update = Update::new().add_to_set(fields::SAVED_EVENT_REFS, event_ref);
                            match self.store.update_one(ACCOUNTS, &Self::account_filter(uid.as_str()), &update).await {
                                Ok(r) if r.modified > 0 => report.linked += 1,
                                Ok(_) => {}
                                Err(e) => warn!(event = %event_ref, account = %uid, error = %e, "Repair link failed"),
                            }
                        }
                    }
                }
            }

            let expected = members.len() as u64;
            if dangling.is_empty() && event.interest_count == expected {
                continue;
            }

            // Only applies if interestedBy is unchanged since it was read.
            let filter = Filter::id(&event.record_id).and(Filter::eq(fields::INTERESTED_BY, json!(event.interested_by)));
            let mut update = Update::new().set(fields::INTEREST_COUNT, expected);
            for uid in &dangling {
                update = update.pull(fields::INTERESTED_BY, uid.as_str());
            }
            match self.store.update_one(EVENTS, &filter, &update).await {
                Ok(r) if r.modified > 0 => {
                    report.dangling_removed += dangling.len();
                    if event.interest_count != expected {
                        report.counts_fixed += 1;
                    }
                }
                Ok(_) => info!(event = %event_ref, "Event changed during repair, leaving for next sweep"),
                Err(e) => warn!(event = %event_ref, error = %e, "Repair of event failed"),
            }
        }

        let interested: HashMap<&str, &EntityRecord> =
            events.iter().map(|e| (e.record_id.as_str(), e)).collect();
        for account in &accounts {
            for saved_ref in &account.saved_event_refs {
                let consistent = interested
                    .get(saved_ref.as_str())
                    .is_some_and(|e| e.is_interested(&account.uid));
                if consistent {
                    continue;
                }
                let update = Update::new().pull(fields::SAVED_EVENT_REFS, saved_ref.as_str());
                match self.store.update_one(ACCOUNTS, &Self::account_filter(account.uid.as_str()), &update).await {
                    Ok(r) if r.modified > 0 => report.unlinked += 1,
                    Ok(_) => {}
                    Err(e) => warn!(event = %saved_ref, account = %account.uid, error = %e, "Repair unlink failed"),
                }
            }
        }

        if report.is_clean() {
            info!(events = report.events_checked, "Interest repair found nothing to fix");
        } else {
            warn!(
                events = report.events_checked,
                linked = report.linked,
                unlinked = report.unlinked,
                dangling_removed = report.dangling_removed,
                counts_fixed = report.counts_fixed,
                "Interest repair corrected drift"
            );
        }
        Ok(report)
    }

    /// Spawn the sweep on a fixed interval. The first sweep runs after one
    /// interval has elapsed.
    pub fn spawn_repair(self, interval: Duration, mut shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Interest repair started");
            while shutdown.sleep(interval).await {
                if let Err(e) = self.repair_interest().await {
                    error!(error = %e, "Interest repair sweep failed");
                }
            }
            info!("Interest repair stopped");
        })
    }
}
