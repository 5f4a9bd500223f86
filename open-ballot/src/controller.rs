use std::sync::Arc;

use crate::errors::{BallotError, ErrorKind};
use crate::ext::{Clock, LedgerClient, WalletProvider};
use crate::inputs::validate_poll_inputs;
use crate::methods::{BallotMethodManager, DeployAction, PurgeReport};
use crate::notification::{Notification, NotificationSink};
use crate::participation::{fetch_app_snapshot, Participation};
use crate::session::{reduce, Section, SessionAction, SessionState};
use crate::settings::Settings;
use crate::storage::{Address, AppId, AppSnapshot, PollParams};

/// Drives the session in response to user actions.
///
/// Preconditions are checked locally and notified without reaching the ledger. Remote
/// failures are logged and notified as a generic failure. The snapshot is re-fetched after
/// every state changing call.
pub struct BallotController<L, W, S> {
    manager: BallotMethodManager<L, W>,
    ledger: Arc<L>,
    wallet: Arc<W>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    session: SessionState,
    sink: S,
}

impl<L, W, S> BallotController<L, W, S>
where
    L: LedgerClient,
    W: WalletProvider,
    S: NotificationSink,
{
    pub fn new(
        ledger: Arc<L>,
        wallet: Arc<W>,
        clock: Arc<dyn Clock>,
        settings: Settings,
        sink: S,
    ) -> Self {
        let manager = BallotMethodManager::new(
            ledger.clone(),
            wallet.clone(),
            clock.clone(),
            settings.clone(),
        );
        Self {
            manager,
            ledger,
            wallet,
            clock,
            settings,
            session: SessionState::default(),
            sink,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn manager(&self) -> &BallotMethodManager<L, W> {
        &self.manager
    }

    pub fn participation(&self) -> Participation {
        self.session.participation(self.clock.now_unix())
    }

    pub fn btn_flags(&self) -> crate::buttons::BtnStateFlags {
        self.session.btn_flags(self.clock.now_unix())
    }

    /// Applies `action` to the session, forwarding a changed notification to the sink.
    pub fn dispatch(&mut self, action: SessionAction) {
        let before = self.session.notification.clone();
        let session = std::mem::take(&mut self.session);
        self.session = reduce(session, action, &self.settings, self.clock.now_unix());
        if self.session.notification != before {
            self.sink.notify(self.session.notification.clone());
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.session.notification = notification.clone();
        self.sink.notify(notification);
    }

    fn active(&self) -> Result<Address, BallotError> {
        self.session
            .active_account
            .ok_or(BallotError::NoActiveAccount)
    }

    fn app_id(&self) -> Result<AppId, BallotError> {
        self.session.app_id.ok_or(BallotError::NoAppSelected)
    }

    fn snapshot(&self) -> Result<&AppSnapshot, BallotError> {
        self.session.snapshot.as_ref().ok_or(BallotError::NoAppSelected)
    }

    /// Notifies a failed precondition, nothing was submitted.
    fn reject(&mut self, e: BallotError) -> BallotError {
        tracing::debug!(error = %e, "precondition failed");
        let text = match &e {
            BallotError::InvalidPollInputs(msg) => msg.clone(),
            _ => format!("Attention! {}.", capitalize(&e.to_string())),
        };
        self.notify(Notification::error(text));
        e
    }

    fn begin(&mut self) -> Result<(), BallotError> {
        if self.session.action_loading {
            return Err(self.reject(BallotError::ActionInProgress));
        }
        self.dispatch(SessionAction::ActionStarted);
        Ok(())
    }

    /// Ends the action started by [`Self::begin`]; remote errors become a generic message.
    fn finish<T>(&mut self, action: &str, res: Result<T, BallotError>) -> Result<T, BallotError> {
        self.dispatch(SessionAction::ActionFinished {
            state_changed: true,
        });
        res.map_err(|e| {
            match e.kind() {
                ErrorKind::Precondition => {
                    return self.reject(e);
                }
                ErrorKind::Remote => tracing::error!(action, error = %e, "remote call failed"),
                ErrorKind::StaleData => tracing::warn!(action, error = %e, "stale data"),
            }
            self.notify(Notification::error(format!(
                "{action} failed! Please check your account and try again."
            )));
            e
        })
    }

    pub async fn on_connect(&mut self) -> Result<Address, BallotError> {
        let res = match self.wallet.connect().await {
            Ok(_) => self
                .wallet
                .active_account()
                .ok_or(BallotError::NoActiveAccount),
            Err(e) => Err(e.into()),
        };
        match res {
            Ok(account) => {
                tracing::info!(%account, "wallet connected");
                self.dispatch(SessionAction::WalletConnected(account));
                if self.session.app_id.is_some() {
                    // failures are notified by refresh
                    let _ = self.refresh().await;
                }
                Ok(account)
            }
            Err(e) => {
                tracing::error!(error = %e, "wallet connection failed");
                self.notify(Notification::error("Wallet connection failed!"));
                Err(e)
            }
        }
    }

    pub async fn on_disconnect(&mut self) -> Result<(), BallotError> {
        self.wallet.disconnect().await?;
        self.dispatch(SessionAction::WalletDisconnected);
        Ok(())
    }

    pub fn on_start(&mut self) {
        self.dispatch(SessionAction::Start);
    }

    /// Selects an existing poll application and loads it.
    pub async fn on_join(&mut self, app_id: AppId) -> Result<AppSnapshot, BallotError> {
        if let Err(e) = self.active() {
            return Err(self.reject(e));
        }
        self.dispatch(SessionAction::Join(app_id));
        self.refresh().await
    }

    pub fn on_reset(&mut self) {
        self.dispatch(SessionAction::Reset);
        self.notify(Notification::clear());
    }

    /// Deploys a new poll application and sets it up with the form inputs.
    pub async fn on_create(&mut self) -> Result<AppId, BallotError> {
        let now = self.clock.now_unix();
        let pre = self.active().and_then(|creator| {
            if self.session.section != Section::Creation {
                return Err(BallotError::InvalidPollInputs("not in poll creation".into()));
            }
            validate_poll_inputs(&self.session.poll_inputs, &self.settings, now)
                .map(|poll| (creator, poll))
                .map_err(|n| BallotError::InvalidPollInputs(n.text))
        });
        let (creator, poll) = match pre {
            Ok(v) => v,
            Err(e) => return Err(self.reject(e)),
        };
        self.begin()?;

        let res = self.deploy_poll(creator, &poll).await;
        let app_id = self.finish("Poll creation", res)?;

        self.dispatch(SessionAction::AppCreated(app_id));
        self.notify(Notification::success(format!(
            "Poll created successfully! App ID: {app_id}"
        )));
        self.reload().await;
        Ok(app_id)
    }

    /// A reused deployment may already hold a poll, so a new poll always gets its own
    /// instance.
    async fn deploy_poll(&self, creator: Address, poll: &PollParams) -> Result<AppId, BallotError> {
        let deployed = self.manager.deploy_app(creator).await?;
        let app_id = match deployed.action {
            DeployAction::Nothing => {
                tracing::debug!(
                    app_id = deployed.app_id,
                    "deployment reused, creating a new instance"
                );
                self.manager.create_app(creator).await?
            }
            DeployAction::Create | DeployAction::Append => deployed.app_id,
        };
        self.manager
            .set_poll_fund_app_mbr(creator, app_id, poll)
            .await?;
        Ok(app_id)
    }

    pub async fn on_request_box(&mut self) -> Result<(), BallotError> {
        let (sender, app_id) = self.precondition(|p, sender| {
            if p.is_creator || p.has_box_storage {
                return Err(BallotError::BoxStorageExists(sender));
            }
            Ok(())
        })?;
        self.begin()?;
        let res = self.manager.request_box_storage(sender, app_id).await;
        self.finish("Box storage request", res)?;
        self.notify(Notification::success("Box storage allocated, you can now vote."));
        self.reload().await;
        Ok(())
    }

    pub async fn on_delete_box(&mut self) -> Result<(), BallotError> {
        let (sender, app_id) = self.precondition(|p, sender| {
            if p.is_creator {
                return Err(BallotError::Unauthorized(sender));
            }
            if !p.has_box_storage {
                return Err(BallotError::NoBoxStorage(sender));
            }
            Ok(())
        })?;
        self.begin()?;
        let res = self.manager.delete_box_storage(sender, app_id).await;
        self.finish("Box storage deletion", res)?;
        self.notify(Notification::success("Box storage deleted and refunded."));
        self.reload().await;
        Ok(())
    }

    pub async fn on_submit_vote(&mut self) -> Result<(), BallotError> {
        let choice = self.session.vote_choice;
        let (sender, app_id) = self.precondition(|p, sender| {
            if !p.has_box_storage {
                return Err(BallotError::NoBoxStorage(sender));
            }
            if p.has_voted {
                return Err(BallotError::AlreadyVoted(sender));
            }
            if !p.voting.open {
                return Err(BallotError::VotingClosed);
            }
            Ok(())
        })?;
        let choice = match choice {
            Some(c) => c,
            None => return Err(self.reject(BallotError::NoVoteChoice)),
        };
        self.begin()?;
        let res = self.manager.submit_vote(sender, app_id, choice).await;
        self.finish("Vote submission", res)?;

        self.dispatch(SessionAction::VoteConfirmed { choice });
        self.notify(Notification::success("Vote submitted successfully!"));
        self.reload().await;
        Ok(())
    }

    pub async fn on_purge(&mut self) -> Result<PurgeReport, BallotError> {
        let (creator, app_id) = self.precondition(|p, sender| {
            if !p.is_creator {
                return Err(BallotError::Unauthorized(sender));
            }
            if !p.able_to_purge {
                return Err(BallotError::NothingToPurge);
            }
            Ok(())
        })?;
        self.begin()?;
        let res = self.manager.purge_box_storage(creator, app_id).await;
        let report = self.finish("Box storage purge", res)?;
        self.notify(Notification::success(format!(
            "Purged {} box storage records.",
            report.purged
        )));
        self.reload().await;
        Ok(report)
    }

    /// Deletes the poll application.
    ///
    /// The creator check compares the active account to the owner of the cached snapshot,
    /// which is not re-fetched first.
    pub async fn on_delete_app(&mut self) -> Result<(), BallotError> {
        let (creator, app_id) = self.precondition(|p, sender| {
            if !p.is_creator {
                return Err(BallotError::Unauthorized(sender));
            }
            Ok(())
        })?;
        if self.session.stale {
            tracing::warn!(app_id, "deleting application with a stale owner check");
        }
        self.begin()?;
        let res = self.manager.delete_app(creator, app_id).await;
        self.finish("Application deletion", res)?;
        self.dispatch(SessionAction::Reset);
        self.notify(Notification::success(format!("Application {app_id} deleted.")));
        Ok(())
    }

    /// Re-fetches the selected application and replaces the cached snapshot.
    pub async fn refresh(&mut self) -> Result<AppSnapshot, BallotError> {
        let app_id = match self.app_id() {
            Ok(id) => id,
            Err(e) => return Err(self.reject(e)),
        };
        let active = self.session.active_account;
        match fetch_app_snapshot(self.ledger.as_ref(), app_id, active.as_ref()).await {
            Ok(snapshot) => {
                tracing::debug!(app_id, keys = snapshot.allocated_keys.len(), "snapshot loaded");
                self.dispatch(SessionAction::SnapshotLoaded(snapshot.clone()));
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(app_id, error = %e, "loading application failed");
                self.notify(Notification::error(format!(
                    "Unable to load application {app_id}!"
                )));
                Err(e)
            }
        }
    }

    /// Re-fetches after a confirmed action. A failure keeps the action notification and
    /// leaves the session stale.
    async fn reload(&mut self) {
        let Some(app_id) = self.session.app_id else {
            return;
        };
        let active = self.session.active_account;
        match fetch_app_snapshot(self.ledger.as_ref(), app_id, active.as_ref()).await {
            Ok(snapshot) => self.dispatch(SessionAction::SnapshotLoaded(snapshot)),
            Err(e) => tracing::warn!(app_id, error = %e, "reloading application failed"),
        }
    }

    /// Common checks of the engagement actions: connected account, loaded application and
    /// the action specific `check` over the cached participation.
    fn precondition(
        &mut self,
        check: impl FnOnce(&Participation, Address) -> Result<(), BallotError>,
    ) -> Result<(Address, AppId), BallotError> {
        let res = self.active().and_then(|sender| {
            let app_id = self.snapshot()?.id;
            check(&self.participation(), sender)?;
            Ok((sender, app_id))
        });
        res.map_err(|e| self.reject(e))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
