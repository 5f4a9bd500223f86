use serde::Serialize;

use crate::errors::{BallotError, LedgerError};
use crate::ext::LedgerClient;
use crate::storage::{Address, AppId, AppSnapshot, BoxKey, VoterRecord};
use crate::window::VotingStatus;

/// Participation of the active account in a poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub has_box_storage: bool,
    pub is_creator: bool,
    pub has_voted: bool,
    pub voted_for_index: Option<u8>,
    /// Creator with at least one other record allocated.
    pub able_to_purge: bool,
    pub voting: VotingStatus,
}

/// Derives the participation of `active` from the fetched snapshot.
///
/// Without an active account nothing is owned nor allocated.
pub fn derive_participation(
    active: Option<&Address>,
    snapshot: &AppSnapshot,
    record: Option<VoterRecord>,
    now: u64,
) -> Participation {
    let voting = snapshot.window().check(now);
    let Some(active) = active else {
        return Participation {
            voting,
            ..Default::default()
        };
    };
    let is_creator = snapshot.is_owner(active);
    let has_box_storage = snapshot.has_box_storage(active);
    // a record is only meaningful when its key is listed
    let record = record.filter(|_| has_box_storage);
    Participation {
        has_box_storage,
        is_creator,
        has_voted: record.map(|r| r.voted).unwrap_or(false),
        voted_for_index: record.and_then(|r| r.voted_for()),
        able_to_purge: is_creator && snapshot.purgeable_keys().next().is_some(),
        voting,
    }
}

/// Fetches the application, its allocated records and the record of `active`.
///
/// Only the application read is fatal. A failed box listing reads as no records and a missing
/// or malformed record of `active` reads as not participating.
pub async fn fetch_app_snapshot<L: LedgerClient + ?Sized>(
    ledger: &L,
    app_id: AppId,
    active: Option<&Address>,
) -> Result<AppSnapshot, BallotError> {
    let app = ledger.application(app_id).await?;

    let allocated_keys: Vec<Address> = match ledger.application_boxes(app_id).await {
        Ok(keys) => keys
            .iter()
            .filter(|k| k.is_participation_record())
            .filter_map(BoxKey::account)
            .collect(),
        Err(e) => {
            tracing::warn!(app_id, error = %e, "listing boxes failed, assuming no records");
            Vec::new()
        }
    };

    let record = match active {
        Some(account) if allocated_keys.contains(account) => {
            fetch_voter_record(ledger, app_id, account).await
        }
        _ => None,
    };

    Ok(AppSnapshot {
        fetched_for: active.copied(),
        ..AppSnapshot::new(&app, allocated_keys, record)
    })
}

async fn fetch_voter_record<L: LedgerClient + ?Sized>(
    ledger: &L,
    app_id: AppId,
    account: &Address,
) -> Option<VoterRecord> {
    match ledger.application_box(app_id, &BoxKey::for_account(account)).await {
        Ok(value) => {
            let record = VoterRecord::decode(&value);
            if record.is_none() {
                tracing::warn!(app_id, %account, len = value.len(), "malformed voter record");
            }
            record
        }
        Err(LedgerError::BoxNotFound(_)) => None,
        Err(e) => {
            tracing::warn!(app_id, %account, error = %e, "reading voter record failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::{Confirmation, Deployment, SignedGroup};
    use crate::storage::{ApplicationState, GlobalState, TealValue};
    use crate::constants::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn addr(b: u8) -> Address {
        Address::new([b; 32])
    }

    fn snapshot(owner: Address, keys: Vec<Address>) -> AppSnapshot {
        let mut gs = GlobalState::default();
        gs.set(KEY_POLL_START, TealValue::Uint(100));
        gs.set(KEY_POLL_END, TealValue::Uint(200));
        let app = ApplicationState {
            app_id: 1,
            app_address: addr(0xaa),
            creator: owner,
            global_state: gs,
        };
        AppSnapshot::new(&app, keys, None)
    }

    #[test]
    fn not_participating() {
        let snap = snapshot(addr(1), vec![addr(1)]);
        let p = derive_participation(Some(&addr(2)), &snap, None, 150);
        assert_eq!(
            p,
            Participation {
                has_box_storage: false,
                is_creator: false,
                has_voted: false,
                voted_for_index: None,
                able_to_purge: false,
                voting: VotingStatus::OPEN,
            }
        );
        let none = derive_participation(None, &snap, None, 250);
        assert_eq!(none.voting, VotingStatus::CLOSED);
        assert!(!none.is_creator);
    }

    #[test]
    fn voter_and_creator() {
        let snap = snapshot(addr(1), vec![addr(1), addr(2)]);
        let voted = VoterRecord {
            voted: true,
            choice: 3,
        };
        let p = derive_participation(Some(&addr(2)), &snap, Some(voted), 150);
        assert!(p.has_box_storage && p.has_voted && !p.is_creator);
        assert_eq!(p.voted_for_index, Some(3));

        let creator = derive_participation(Some(&addr(1)), &snap, None, 150);
        assert!(creator.is_creator && creator.able_to_purge);

        // only the creator record left
        let alone = snapshot(addr(1), vec![addr(1)]);
        assert!(!derive_participation(Some(&addr(1)), &alone, None, 150).able_to_purge);
    }

    #[test]
    fn unlisted_record_is_ignored() {
        let snap = snapshot(addr(1), vec![]);
        let rec = VoterRecord {
            voted: true,
            choice: 1,
        };
        let p = derive_participation(Some(&addr(2)), &snap, Some(rec), 150);
        assert!(!p.has_voted);
        assert_eq!(p.voted_for_index, None);
    }

    /// Ledger answering from fixed data, failing where asked to.
    struct FixedLedger {
        app: Option<ApplicationState>,
        boxes: Option<BTreeMap<BoxKey, Vec<u8>>>,
        box_read_fails: bool,
    }

    #[async_trait]
    impl LedgerClient for FixedLedger {
        async fn application(&self, app_id: AppId) -> Result<ApplicationState, LedgerError> {
            self.app.clone().ok_or(LedgerError::AppNotFound(app_id))
        }

        async fn application_boxes(&self, _: AppId) -> Result<Vec<BoxKey>, LedgerError> {
            self.boxes
                .as_ref()
                .map(|b| b.keys().cloned().collect())
                .ok_or_else(|| LedgerError::Network("boxes".into()))
        }

        async fn application_box(&self, _: AppId, key: &BoxKey) -> Result<Vec<u8>, LedgerError> {
            if self.box_read_fails {
                return Err(LedgerError::Network("box".into()));
            }
            self.boxes
                .as_ref()
                .and_then(|b| b.get(key).cloned())
                .ok_or_else(|| LedgerError::BoxNotFound(hex::encode(key.as_bytes())))
        }

        async fn find_deployment(
            &self,
            _: &Address,
            _: &str,
        ) -> Result<Option<Deployment>, LedgerError> {
            Ok(None)
        }

        async fn submit_group(&self, _: SignedGroup, _: u64) -> Result<Confirmation, LedgerError> {
            Err(LedgerError::Rejected("read only".into()))
        }
    }

    fn fixed(boxes: Option<Vec<(Address, Vec<u8>)>>, box_read_fails: bool) -> FixedLedger {
        FixedLedger {
            app: Some(ApplicationState {
                app_id: 5,
                app_address: addr(0xaa),
                creator: addr(1),
                global_state: GlobalState::default(),
            }),
            boxes: boxes.map(|b| {
                b.into_iter()
                    .map(|(a, v)| (BoxKey::for_account(&a), v))
                    .collect()
            }),
            box_read_fails,
        }
    }

    #[tokio::test]
    async fn fetch_degrades_gracefully() {
        let ledger = fixed(Some(vec![(addr(1), vec![0, 0]), (addr(2), vec![1, 2])]), false);
        let snap = fetch_app_snapshot(&ledger, 5, Some(&addr(2))).await.unwrap();
        assert_eq!(snap.allocated_keys, vec![addr(1), addr(2)]);
        assert!(snap.has_voted);
        assert_eq!(snap.voted_for_index, Some(2));
        assert_eq!(snap.fetched_for, Some(addr(2)));

        // malformed record
        let ledger = fixed(Some(vec![(addr(2), vec![1, 2, 3])]), false);
        let snap = fetch_app_snapshot(&ledger, 5, Some(&addr(2))).await.unwrap();
        assert!(snap.has_box_storage(&addr(2)));
        assert!(!snap.has_voted);

        // failing record read
        let ledger = fixed(Some(vec![(addr(2), vec![1, 2])]), true);
        let snap = fetch_app_snapshot(&ledger, 5, Some(&addr(2))).await.unwrap();
        assert_eq!(snap.voted_for_index, None);

        // failing box listing
        let ledger = fixed(None, false);
        let snap = fetch_app_snapshot(&ledger, 5, Some(&addr(2))).await.unwrap();
        assert!(snap.allocated_keys.is_empty());

        // missing application is an error
        let mut ledger = fixed(None, false);
        ledger.app = None;
        let err = fetch_app_snapshot(&ledger, 5, None).await.unwrap_err();
        assert!(matches!(err, BallotError::Ledger(LedgerError::AppNotFound(5))));
    }
}
