use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{Address, AppId};

pub const STANDARD_NAME: &str = "open-ballot";
pub const EVENT_VERSION: &str = "1.0.0";

pub fn emit_event(event: BallotEventKind) {
    tracing::info!(target: "open_ballot::events", "{}", Event::from(event));
}

/// Lifecycle events of a poll application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BallotEventKind {
    PollCreated(PollCreated),
    BoxRequested(AccountEvent),
    VoteSubmitted(VoteSubmitted),
    BoxDeleted(AccountEvent),
    BoxesPurged(BoxesPurged),
    AppDeleted(AccountEvent),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub standard: String,
    pub version: String,

    #[serde(flatten)]
    pub event: BallotEventKind,
}

impl From<BallotEventKind> for Event {
    fn from(event: BallotEventKind) -> Self {
        Self {
            standard: STANDARD_NAME.to_owned(),
            version: EVENT_VERSION.to_owned(),
            event,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "EVENT_JSON:{}",
            &serde_json::to_string(self).map_err(|_| fmt::Error)?
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollCreated {
    pub app_id: AppId,
    pub creator: Address,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEvent {
    pub app_id: AppId,
    pub account: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSubmitted {
    pub app_id: AppId,
    pub voter: Address,
    pub choice: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxesPurged {
    pub app_id: AppId,
    pub purged: usize,
    pub groups: usize,
}

pub(crate) fn emit_poll_created(app_id: AppId, creator: Address, start: u64, end: u64) {
    emit_event(BallotEventKind::PollCreated(PollCreated {
        app_id,
        creator,
        start,
        end,
    }));
}

pub(crate) fn emit_box_requested(app_id: AppId, account: Address) {
    emit_event(BallotEventKind::BoxRequested(AccountEvent { app_id, account }));
}

pub(crate) fn emit_vote_submitted(app_id: AppId, voter: Address, choice: u8) {
    emit_event(BallotEventKind::VoteSubmitted(VoteSubmitted {
        app_id,
        voter,
        choice,
    }));
}

pub(crate) fn emit_box_deleted(app_id: AppId, account: Address) {
    emit_event(BallotEventKind::BoxDeleted(AccountEvent { app_id, account }));
}

pub(crate) fn emit_boxes_purged(app_id: AppId, purged: usize, groups: usize) {
    emit_event(BallotEventKind::BoxesPurged(BoxesPurged {
        app_id,
        purged,
        groups,
    }));
}

pub(crate) fn emit_app_deleted(app_id: AppId, account: Address) {
    emit_event(BallotEventKind::AppDeleted(AccountEvent { app_id, account }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_format() {
        let alice = Address::new([0xab; 32]);
        let e = Event::from(BallotEventKind::VoteSubmitted(VoteSubmitted {
            app_id: 21,
            voter: alice,
            choice: 2,
        }));
        let expected = format!(
            r#"EVENT_JSON:{{"standard":"open-ballot","version":"1.0.0","event":"vote_submitted","data":{{"app_id":21,"voter":"{}","choice":2}}}}"#,
            alice
        );
        assert_eq!(e.to_string(), expected);

        let e = Event::from(BallotEventKind::BoxesPurged(BoxesPurged {
            app_id: 3,
            purged: 20,
            groups: 2,
        }));
        assert_eq!(
            e.to_string(),
            r#"EVENT_JSON:{"standard":"open-ballot","version":"1.0.0","event":"boxes_purged","data":{"app_id":3,"purged":20,"groups":2}}"#
        );
    }

    #[test]
    fn parse_back() {
        let e = Event::from(BallotEventKind::AppDeleted(AccountEvent {
            app_id: 9,
            account: Address::ZERO,
        }));
        let line = e.to_string();
        let json = line.strip_prefix("EVENT_JSON:").unwrap();
        let parsed: Event = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, e);
    }
}
