use std::sync::Arc;

use serde::Serialize;

use crate::constants::CHOICE_RANGE;
use crate::errors::{BallotError, GroupError};
use crate::events;
use crate::ext::{
    AppCall, AtomicGroup, Clock, Confirmation, DeployTemplate, LedgerClient, MethodCall, Payment,
    SignedGroup, SignedTxn, StateSchema, WalletProvider,
};
use crate::settings::Settings;
use crate::storage::{Address, AppId, BoxKey, PollParams};

/// What a deployment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeployAction {
    /// No previous deployment, a new application was created.
    Create,
    /// A deployment with the same version and schema exists, it is reused.
    Nothing,
    /// The version changed, a new application was created next to the previous one.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub app_id: AppId,
    pub action: DeployAction,
}

/// Purge batches of non owner records, grouped by atomic submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgePlan {
    pub groups: Vec<Vec<Vec<Address>>>,
}

impl PurgePlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn num_batches(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn num_keys(&self) -> usize {
        self.groups.iter().flatten().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub purged: usize,
    pub batches: usize,
    pub groups: usize,
    pub confirmed_rounds: Vec<u64>,
}

/// Splits `keys` without `owner` into batches of `batch_size` keys, `batches_per_group`
/// batches per atomic group. Keys keep their order.
pub fn plan_purge(
    keys: &[Address],
    owner: &Address,
    batch_size: usize,
    batches_per_group: usize,
) -> PurgePlan {
    let purgeable: Vec<Address> = keys.iter().filter(|k| *k != owner).copied().collect();
    let batches: Vec<Vec<Address>> = purgeable
        .chunks(batch_size.max(1))
        .map(<[Address]>::to_vec)
        .collect();
    PurgePlan {
        groups: batches
            .chunks(batches_per_group.max(1))
            .map(<[Vec<Address>]>::to_vec)
            .collect(),
    }
}

/// Sequences the calls of the poll application on behalf of an account.
///
/// Every transaction is signed by its sender through the wallet. Grouped submissions are
/// all-or-nothing; nothing is submitted after a failed group.
pub struct BallotMethodManager<L, W> {
    ledger: Arc<L>,
    wallet: Arc<W>,
    clock: Arc<dyn Clock>,
    settings: Settings,
}

impl<L: LedgerClient, W: WalletProvider> BallotMethodManager<L, W> {
    pub fn new(ledger: Arc<L>, wallet: Arc<W>, clock: Arc<dyn Clock>, settings: Settings) -> Self {
        Self {
            ledger,
            wallet,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn template(&self) -> DeployTemplate {
        DeployTemplate {
            app_name: self.settings.app_name.clone(),
            version_unix: self.clock.now_unix(),
            deletable: true,
            schema: StateSchema::OPEN_BALLOT,
        }
    }

    async fn sign_group(&self, group: AtomicGroup) -> Result<SignedGroup, BallotError> {
        if group.is_empty() {
            return Err(GroupError::Empty.into());
        }
        let mut signed = SignedGroup::default();
        for txn in group.into_txns() {
            let payload = txn.signing_bytes()?;
            let signature = self.wallet.sign(txn.sender(), &payload).await?;
            signed.txns.push(SignedTxn { txn, signature });
        }
        Ok(signed)
    }

    /// Signs and submits `group`, failing unless confirmed within `wait_rounds`.
    async fn execute(
        &self,
        group: AtomicGroup,
        wait_rounds: u64,
    ) -> Result<Confirmation, BallotError> {
        let size = group.len();
        let signed = self.sign_group(group).await?;
        let confirmation = self.ledger.submit_group(signed, wait_rounds).await?;
        match confirmation.confirmed_round {
            Some(round) => {
                tracing::debug!(size, round, "atomic group confirmed");
                Ok(confirmation)
            }
            None => {
                tracing::warn!(size, wait_rounds, "atomic group not confirmed");
                Err(BallotError::Unconfirmed {
                    rounds: wait_rounds,
                })
            }
        }
    }

    async fn call(&self, call: AppCall) -> Result<Confirmation, BallotError> {
        let mut group = AtomicGroup::new();
        group.add_method_call(call)?;
        self.execute(group, self.settings.wait_rounds).await
    }

    async fn app_address(&self, app_id: AppId) -> Result<Address, BallotError> {
        Ok(self.ledger.application(app_id).await?.app_address)
    }

    async fn create(&self, creator: Address, template: DeployTemplate) -> Result<AppId, BallotError> {
        let create = AppCall {
            app_id: None,
            sender: creator,
            call: MethodCall::Generate,
            boxes: Vec::new(),
            deploy: Some(template),
        };
        let confirmation = self.call(create).await?;
        let app_id = confirmation
            .created_app
            .ok_or(BallotError::UnexpectedResponse("created application id is missing"))?;
        tracing::info!(app_id, %creator, "application created");
        Ok(app_id)
    }

    /// Creates a fresh poll application.
    pub async fn create_app(&self, creator: Address) -> Result<AppId, BallotError> {
        self.create(creator, self.template()).await
    }

    /// Deploys the poll application under the configured name.
    ///
    /// The version is stamped with the current time, so only a deployment made within the
    /// same second is reused. An existing deployment with another schema is an error.
    pub async fn deploy_app(&self, creator: Address) -> Result<DeployResult, BallotError> {
        let template = self.template();
        let existing = self
            .ledger
            .find_deployment(&creator, &template.app_name)
            .await?;
        let action = match existing {
            Some(d) if d.template.schema != template.schema => {
                tracing::error!(app_id = d.app_id, app_name = %template.app_name, "schema break");
                return Err(BallotError::SchemaBreak {
                    app_name: template.app_name,
                });
            }
            Some(d) if d.template.version_unix == template.version_unix => {
                tracing::debug!(app_id = d.app_id, "deployment is up to date");
                return Ok(DeployResult {
                    app_id: d.app_id,
                    action: DeployAction::Nothing,
                });
            }
            Some(_) => DeployAction::Append,
            None => DeployAction::Create,
        };
        let app_id = self.create(creator, template).await?;
        Ok(DeployResult { app_id, action })
    }

    pub async fn get_version_unix(&self, sender: Address, app_id: AppId) -> Result<u64, BallotError> {
        let confirmation = self
            .call(AppCall::new(app_id, sender, MethodCall::GetVersionUnix))
            .await?;
        confirmation
            .returns
            .first()
            .copied()
            .flatten()
            .ok_or(BallotError::UnexpectedResponse("get_version_unix returned nothing"))
    }

    /// Sets the poll and funds the application in one atomic group, poll first.
    pub async fn set_poll_fund_app_mbr(
        &self,
        creator: Address,
        app_id: AppId,
        poll: &PollParams,
    ) -> Result<Confirmation, BallotError> {
        let app_address = self.app_address(app_id).await?;
        let mbr_pay = Payment {
            sender: creator,
            receiver: app_address,
            amount: self.settings.app_fund_amount,
        };

        let mut group = AtomicGroup::new();
        group
            .add_method_call(AppCall::new(
                app_id,
                creator,
                MethodCall::SetPoll {
                    poll: poll.encode(),
                },
            ))?
            .add_method_call(
                AppCall::new(app_id, creator, MethodCall::FundAppMbr { mbr_pay })
                    .with_boxes(vec![BoxKey::for_account(&creator)]),
            )?;

        let confirmation = self
            .execute(group, self.settings.set_poll_wait_rounds)
            .await?;
        events::emit_poll_created(app_id, creator, poll.start_date_unix, poll.end_date_unix);
        Ok(confirmation)
    }

    pub async fn request_box_storage(
        &self,
        sender: Address,
        app_id: AppId,
    ) -> Result<Confirmation, BallotError> {
        let app_address = self.app_address(app_id).await?;
        let mbr_pay = Payment {
            sender,
            receiver: app_address,
            amount: self.settings.box_mbr_amount,
        };
        let confirmation = self
            .call(
                AppCall::new(app_id, sender, MethodCall::RequestBoxStorage { mbr_pay })
                    .with_boxes(vec![BoxKey::for_account(&sender)]),
            )
            .await?;
        events::emit_box_requested(app_id, sender);
        Ok(confirmation)
    }

    /// Single attempt, failures are returned as is.
    pub async fn submit_vote(
        &self,
        sender: Address,
        app_id: AppId,
        choice: u8,
    ) -> Result<Confirmation, BallotError> {
        if !CHOICE_RANGE.contains(&choice) {
            return Err(BallotError::InvalidChoice(choice));
        }
        let confirmation = self
            .call(
                AppCall::new(app_id, sender, MethodCall::SubmitVote { choice })
                    .with_boxes(vec![BoxKey::for_account(&sender)]),
            )
            .await?;
        events::emit_vote_submitted(app_id, sender, choice);
        Ok(confirmation)
    }

    pub async fn delete_box_storage(
        &self,
        sender: Address,
        app_id: AppId,
    ) -> Result<Confirmation, BallotError> {
        let confirmation = self
            .call(
                AppCall::new(app_id, sender, MethodCall::DeleteBoxStorage)
                    .with_boxes(vec![BoxKey::for_account(&sender)]),
            )
            .await?;
        events::emit_box_deleted(app_id, sender);
        Ok(confirmation)
    }

    /// Purges every participation record except the creator's one.
    ///
    /// Groups are submitted one after another and the first failing group stops the purge;
    /// groups confirmed before it stay applied.
    pub async fn purge_box_storage(
        &self,
        creator: Address,
        app_id: AppId,
    ) -> Result<PurgeReport, BallotError> {
        let keys: Vec<Address> = self
            .ledger
            .application_boxes(app_id)
            .await?
            .iter()
            .filter(|k| k.is_participation_record())
            .filter_map(BoxKey::account)
            .collect();
        let plan = plan_purge(
            &keys,
            &creator,
            self.settings.purge_batch_size,
            self.settings.purge_batches_per_group,
        );
        tracing::debug!(
            app_id,
            keys = plan.num_keys(),
            batches = plan.num_batches(),
            groups = plan.groups.len(),
            "purge planned"
        );

        let mut report = PurgeReport::default();
        for batches in plan.groups {
            let mut group = AtomicGroup::new();
            let mut in_group = 0;
            for batch in &batches {
                in_group += batch.len();
                group.add_method_call(
                    AppCall::new(
                        app_id,
                        creator,
                        MethodCall::PurgeBoxStorage {
                            box_keys: batch.clone(),
                        },
                    )
                    .with_boxes(batch.iter().map(BoxKey::for_account).collect()),
                )?;
            }
            match self.execute(group, self.settings.purge_wait_rounds).await {
                Ok(confirmation) => {
                    report.purged += in_group;
                    report.batches += batches.len();
                    report.groups += 1;
                    report.confirmed_rounds.extend(confirmation.confirmed_round);
                }
                Err(e) => {
                    tracing::error!(app_id, purged = report.purged, error = %e, "purge stopped");
                    return Err(e);
                }
            }
        }

        if report.purged > 0 {
            events::emit_boxes_purged(app_id, report.purged, report.groups);
        }
        Ok(report)
    }

    /// Deletes the application. The caller is trusted to be the creator.
    pub async fn delete_app(&self, creator: Address, app_id: AppId) -> Result<Confirmation, BallotError> {
        let confirmation = self
            .call(
                AppCall::new(app_id, creator, MethodCall::Terminate)
                    .with_boxes(vec![BoxKey::for_account(&creator)]),
            )
            .await?;
        events::emit_app_deleted(app_id, creator);
        Ok(confirmation)
    }
}
