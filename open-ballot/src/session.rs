use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::buttons::BtnStateFlags;
use crate::constants::CHOICE_RANGE;
use crate::inputs::{process_poll_inputs, PollInputs};
use crate::notification::Notification;
use crate::participation::{derive_participation, Participation};
use crate::settings::Settings;
use crate::storage::{Address, AppId, AppSnapshot, VoterRecord};

/// Sections of the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Section {
    #[default]
    Home,
    Creation,
    Engagement,
}

/// Whole UI session. A read-through cache of the ledger, never the source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub active_account: Option<Address>,
    pub section: Section,
    pub poll_inputs: PollInputs,
    pub poll_inputs_valid: bool,
    pub vote_choice: Option<u8>,
    pub app_id: Option<AppId>,
    pub snapshot: Option<AppSnapshot>,
    /// The snapshot carries a local delta not yet confirmed by a fetch.
    pub optimistic: bool,
    /// A state changing call finished after the snapshot was fetched.
    pub stale: bool,
    pub notification: Notification,
    pub action_loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    WalletConnected(Address),
    WalletDisconnected,
    /// HOME to CREATION.
    Start,
    /// Selects an existing application and moves to ENGAGEMENT.
    Join(AppId),
    /// Back to HOME; only the connected account is kept.
    Reset,
    EditTitle(String),
    EditChoice { index: usize, value: String },
    EditStartDate(String),
    EditEndDate(String),
    SelectChoice(u8),
    ActionStarted,
    ActionFinished { state_changed: bool },
    /// A poll application was created and set up by the active account.
    AppCreated(AppId),
    SnapshotLoaded(AppSnapshot),
    /// Optimistic delta applied after a confirmed vote.
    VoteConfirmed { choice: u8 },
    Notify(Notification),
}

/// Applies `action` to `state`. Poll inputs are re-validated after every edit while in the
/// creation section.
pub fn reduce(
    mut state: SessionState,
    action: SessionAction,
    settings: &Settings,
    now: u64,
) -> SessionState {
    match action {
        SessionAction::WalletConnected(account) => {
            if state.active_account != Some(account) {
                state.stale = state.snapshot.is_some();
                state.vote_choice = None;
            }
            state.active_account = Some(account);
        }
        SessionAction::WalletDisconnected => {
            state.active_account = None;
            state.vote_choice = None;
            state.stale = state.snapshot.is_some();
        }
        SessionAction::Start => {
            state.section = Section::Creation;
            revalidate(&mut state, settings, now);
        }
        SessionAction::Join(app_id) => {
            state.section = Section::Engagement;
            state.app_id = Some(app_id);
            state.snapshot = None;
            state.vote_choice = None;
            state.optimistic = false;
            state.stale = false;
        }
        SessionAction::Reset => {
            state = SessionState {
                active_account: state.active_account,
                ..Default::default()
            };
        }
        SessionAction::EditTitle(title) => {
            state.poll_inputs.title = title;
            revalidate(&mut state, settings, now);
        }
        SessionAction::EditChoice { index, value } => {
            if let Some(choice) = state.poll_inputs.choices.get_mut(index) {
                *choice = value;
            }
            revalidate(&mut state, settings, now);
        }
        SessionAction::EditStartDate(date) => {
            state.poll_inputs.start_date = date;
            revalidate(&mut state, settings, now);
        }
        SessionAction::EditEndDate(date) => {
            state.poll_inputs.end_date = date;
            revalidate(&mut state, settings, now);
        }
        SessionAction::SelectChoice(choice) => {
            if CHOICE_RANGE.contains(&choice) {
                state.vote_choice = Some(choice);
            }
        }
        SessionAction::ActionStarted => state.action_loading = true,
        SessionAction::ActionFinished { state_changed } => {
            state.action_loading = false;
            state.stale |= state_changed;
        }
        SessionAction::AppCreated(app_id) => {
            state.section = Section::Engagement;
            state.app_id = Some(app_id);
            state.snapshot = None;
            state.poll_inputs = PollInputs::default();
            state.poll_inputs_valid = false;
        }
        SessionAction::SnapshotLoaded(snapshot) => {
            state.app_id = Some(snapshot.id);
            state.snapshot = Some(snapshot);
            state.optimistic = false;
            state.stale = false;
        }
        SessionAction::VoteConfirmed { choice } => {
            if let Some(snapshot) = state.snapshot.as_mut() {
                snapshot.has_voted = true;
                snapshot.voted_for_index = Some(choice);
                state.optimistic = true;
            }
        }
        SessionAction::Notify(notification) => state.notification = notification,
    }
    state
}

fn revalidate(state: &mut SessionState, settings: &Settings, now: u64) {
    let message = RefCell::new(None);
    state.poll_inputs_valid = process_poll_inputs(
        &state.poll_inputs,
        state.section,
        settings,
        now,
        &|n: Notification| *message.borrow_mut() = Some(n),
    );
    if let Some(n) = message.into_inner() {
        state.notification = n;
    }
}

impl SessionState {
    /// Participation of the active account in the cached poll.
    ///
    /// After an account switch the voter fields of the cached snapshot are ignored until it
    /// is fetched again for the new account.
    pub fn participation(&self, now: u64) -> Participation {
        match &self.snapshot {
            Some(snapshot) => {
                // the voter fields belong to the account the snapshot was fetched for
                let own = snapshot.fetched_for.is_some()
                    && snapshot.fetched_for == self.active_account;
                let record = (own && snapshot.has_voted).then(|| VoterRecord {
                    voted: true,
                    choice: snapshot.voted_for_index.unwrap_or_default(),
                });
                derive_participation(self.active_account.as_ref(), snapshot, record, now)
            }
            None => Participation::default(),
        }
    }

    pub fn btn_flags(&self, now: u64) -> BtnStateFlags {
        let p = self.participation(now);
        BtnStateFlags {
            action_loading: self.action_loading,
            is_creator: p.is_creator,
            has_box_storage: p.has_box_storage,
            vote_submitted: p.has_voted,
            poll_inputs_valid: self.poll_inputs_valid,
            poll_voting_period_open: p.voting.open,
            able_to_purge: p.able_to_purge,
        }
    }
}
