use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ed25519_dalek::{PublicKey, Signature, Verifier};

use cost::{MicroAlgos, BOX_A_MBR, MIN_BALANCE, MIN_TXN_FEE};
use open_ballot::constants::*;
use open_ballot::ext::{
    AppCall, Clock, Confirmation, DeployTemplate, Deployment, LedgerClient, MethodCall, Payment,
    SignedGroup, Txn,
};
use open_ballot::{
    Address, AppId, ApplicationState, BoxKey, GlobalState, LedgerError, TealValue,
};

/// Unix time of the first round.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
/// Seconds between two rounds.
pub const ROUND_SECONDS: u64 = 3;
const FIRST_APP_ID: AppId = 1_001;

#[derive(Debug, Clone)]
struct App {
    address: Address,
    creator: Address,
    global: GlobalState,
    boxes: BTreeMap<BoxKey, Vec<u8>>,
    template: DeployTemplate,
}

#[derive(Debug, Clone)]
struct State {
    round: u64,
    timestamp: u64,
    balances: HashMap<Address, MicroAlgos>,
    apps: BTreeMap<AppId, App>,
    next_app_id: AppId,
}

#[derive(Debug, Default)]
struct Faults {
    /// Submissions to let through before failing, and the error.
    fail_submission: Option<(usize, LedgerError)>,
    fail_read: Option<LedgerError>,
    unconfirmed: bool,
}

#[derive(Debug)]
struct Inner {
    state: State,
    faults: Faults,
    submitted: Vec<Vec<&'static str>>,
}

/// In-memory ledger running the OpenBallot application rules.
///
/// Groups are verified and applied atomically: signatures are checked first, then every
/// transaction runs on a draft of the state which is committed only when all of them succeed.
/// Each confirmed group advances one round.
pub struct MockLedger {
    inner: Mutex<Inner>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn reject(msg: impl Into<String>) -> LedgerError {
    LedgerError::Rejected(msg.into())
}

fn ensure(cond: bool, msg: &str) -> Result<(), LedgerError> {
    if cond {
        Ok(())
    } else {
        Err(reject(msg))
    }
}

fn app_address(app_id: AppId) -> Address {
    let mut bz = [0xa0; 32];
    bz[..8].copy_from_slice(&app_id.to_be_bytes());
    Address::new(bz)
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State {
                    round: 1,
                    timestamp: GENESIS_TIMESTAMP,
                    balances: HashMap::new(),
                    apps: BTreeMap::new(),
                    next_app_id: FIRST_APP_ID,
                },
                faults: Faults::default(),
                submitted: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credits `amount` to `account`.
    pub fn fund(&self, account: &Address, amount: MicroAlgos) {
        *self.lock().state.balances.entry(*account).or_default() += amount;
    }

    pub fn balance(&self, account: &Address) -> MicroAlgos {
        self.lock()
            .state
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    pub fn round(&self) -> u64 {
        self.lock().state.round
    }

    /// Moves the ledger clock forward without producing transactions.
    pub fn fast_forward(&self, seconds: u64) {
        let mut inner = self.lock();
        inner.state.round += seconds / ROUND_SECONDS;
        inner.state.timestamp += seconds;
    }

    /// The next submission fails with `err` before anything is verified.
    pub fn fail_next_submission(&self, err: LedgerError) {
        self.fail_submission_after(0, err);
    }

    /// Lets `n` submissions through, then the next one fails with `err`.
    pub fn fail_submission_after(&self, n: usize, err: LedgerError) {
        self.lock().faults.fail_submission = Some((n, err));
    }

    /// The next application read fails with `err`.
    pub fn fail_next_read(&self, err: LedgerError) {
        self.lock().faults.fail_read = Some(err);
    }

    /// While set, groups are accepted but never confirmed, nor applied.
    pub fn set_unconfirmed(&self, unconfirmed: bool) {
        self.lock().faults.unconfirmed = unconfirmed;
    }

    /// Method names of every confirmed group, in submission order.
    pub fn submitted_groups(&self) -> Vec<Vec<&'static str>> {
        self.lock().submitted.clone()
    }

    pub fn app_exists(&self, app_id: AppId) -> bool {
        self.lock().state.apps.contains_key(&app_id)
    }

    pub fn global_uint(&self, app_id: AppId, key: &str) -> Option<u64> {
        self.lock()
            .state
            .apps
            .get(&app_id)
            .map(|app| app.global.uint(key))
    }

    /// Overwrites a box value, bypassing the application rules.
    pub fn put_box(&self, app_id: AppId, key: BoxKey, value: Vec<u8>) {
        if let Some(app) = self.lock().state.apps.get_mut(&app_id) {
            app.boxes.insert(key, value);
        }
    }

    /// Overwrites the deploy template recorded for an application.
    pub fn set_template(&self, app_id: AppId, template: DeployTemplate) {
        if let Some(app) = self.lock().state.apps.get_mut(&app_id) {
            app.template = template;
        }
    }

    fn verify(group: &SignedGroup) -> Result<(), LedgerError> {
        for (index, stxn) in group.txns.iter().enumerate() {
            let invalid = LedgerError::InvalidSignature { index };
            let payload = stxn
                .txn
                .signing_bytes()
                .map_err(|e| reject(format!("malformed transaction: {e}")))?;
            let pk = PublicKey::from_bytes(stxn.txn.sender().as_bytes())
                .map_err(|_| invalid.clone())?;
            let sig = Signature::from_bytes(&stxn.signature).map_err(|_| invalid.clone())?;
            pk.verify(&payload, &sig).map_err(|_| invalid)?;
        }
        Ok(())
    }
}

impl State {
    fn debit(&mut self, account: &Address, amount: MicroAlgos) -> Result<(), LedgerError> {
        let balance = self.balances.entry(*account).or_default();
        if *balance < amount {
            return Err(reject(format!("{account} balance {balance} below {amount}")));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: MicroAlgos) {
        *self.balances.entry(*account).or_default() += amount;
    }

    fn balance(&self, account: &Address) -> MicroAlgos {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn pay(&mut self, p: &Payment) -> Result<(), LedgerError> {
        self.debit(&p.sender, p.amount)?;
        self.credit(&p.receiver, p.amount);
        Ok(())
    }

    /// Applies a single transaction, returns the created application and the ABI return value.
    fn apply(&mut self, txn: &Txn) -> Result<(Option<AppId>, Option<u64>), LedgerError> {
        self.debit(txn.sender(), MIN_TXN_FEE)?;
        match txn {
            Txn::Pay(p) => {
                self.pay(p)?;
                Ok((None, None))
            }
            Txn::AppCall(call) => match call.app_id {
                None => self.create(call).map(|id| (Some(id), None)),
                Some(app_id) => self.call(app_id, call).map(|ret| (None, ret)),
            },
        }
    }

    fn create(&mut self, call: &AppCall) -> Result<AppId, LedgerError> {
        ensure(
            matches!(call.call, MethodCall::Generate),
            "application can only be created with generate",
        )?;
        let template = call
            .deploy
            .clone()
            .ok_or_else(|| reject("missing deploy template"))?;
        ensure(
            self.balance(&call.sender) >= cost::creator_min_balance(),
            "Application creator address balance must be equal or greater than Global.min_balance + Global schema MBR.",
        )?;

        let app_id = self.next_app_id;
        self.next_app_id += 1;
        let mut global = GlobalState::default();
        for key in [
            KEY_POLL_FINALIZED,
            KEY_TOTAL_CHOICE1,
            KEY_TOTAL_CHOICE2,
            KEY_TOTAL_CHOICE3,
            KEY_TOTAL_VOTES,
            KEY_TOTAL_PURGED,
        ] {
            global.set(key, TealValue::Uint(0));
        }
        self.apps.insert(
            app_id,
            App {
                address: app_address(app_id),
                creator: call.sender,
                global,
                boxes: BTreeMap::new(),
                template,
            },
        );
        Ok(app_id)
    }

    fn call(&mut self, app_id: AppId, call: &AppCall) -> Result<Option<u64>, LedgerError> {
        let now = self.timestamp;
        let mut app = self
            .apps
            .get(&app_id)
            .cloned()
            .ok_or(LedgerError::AppNotFound(app_id))?;
        let sender = call.sender;
        let sender_key = BoxKey::for_account(&sender);
        let is_creator = sender == app.creator;
        let referenced = |key: &BoxKey| -> Result<(), LedgerError> {
            ensure(call.boxes.contains(key), "box reference missing")
        };

        let mut ret = None;
        let mut deleted = false;
        match &call.call {
            MethodCall::Generate => return Err(reject("generate is a creation method")),
            MethodCall::GetVersionUnix => ret = Some(app.template.version_unix),
            MethodCall::SetPoll { poll } => {
                ensure(is_creator, "Only application creator can set up poll.")?;
                ensure(
                    poll.title.len() <= MAX_TITLE_BYTES,
                    "Poll title size can not exceed 118 bytes of data per key-value.",
                )?;
                ensure(
                    poll.choices.iter().all(|c| c.len() <= MAX_CHOICE_BYTES),
                    "Poll choice size cannot exceed 116 bytes of data per key-value.",
                )?;
                ensure(
                    poll.start_date_unix < poll.end_date_unix,
                    "Start date must be earlier than end date.",
                )?;
                ensure(
                    poll.end_date_unix >= poll.start_date_unix + MIN_VOTING_PERIOD,
                    "End date must be at least 3 days later than the start date.",
                )?;
                ensure(
                    poll.end_date_unix - poll.start_date_unix <= MAX_VOTING_PERIOD,
                    "Voting period can not exceed 14 days.",
                )?;
                ensure(
                    app.global.uint(KEY_POLL_FINALIZED) == 0,
                    "Poll can only be setup once.",
                )?;
                let g = &mut app.global;
                g.set(KEY_POLL_TITLE, TealValue::Bytes(poll.title.clone()));
                g.set(KEY_POLL_CHOICE1, TealValue::Bytes(poll.choices[0].clone()));
                g.set(KEY_POLL_CHOICE2, TealValue::Bytes(poll.choices[1].clone()));
                g.set(KEY_POLL_CHOICE3, TealValue::Bytes(poll.choices[2].clone()));
                g.set(KEY_POLL_START, TealValue::Uint(poll.start_date_unix));
                g.set(KEY_POLL_END, TealValue::Uint(poll.end_date_unix));
                g.set(KEY_POLL_FINALIZED, TealValue::Uint(1));
            }
            MethodCall::FundAppMbr { mbr_pay } => {
                ensure(
                    is_creator,
                    "Transaction sender address must match application creator address.",
                )?;
                ensure(
                    !app.boxes.contains_key(&sender_key),
                    "Transaction sender address already present in box a_.",
                )?;
                ensure(
                    mbr_pay.sender == app.creator,
                    "MBR payment sender address must match appplication creator address.",
                )?;
                ensure(
                    mbr_pay.receiver == app.address,
                    "MBR payment reciever address must match application address.",
                )?;
                ensure(
                    mbr_pay.amount >= BOX_A_MBR,
                    "MBR payment for box storage must meet the minimum requirement amount.",
                )?;
                self.pay(mbr_pay)?;
                ensure(
                    self.balance(&app.address) >= MIN_BALANCE + BOX_A_MBR,
                    "Application address balance must be equal or greater than Global.min_balance + Box storage fee.",
                )?;
                ensure(
                    now <= app.global.uint(KEY_POLL_END),
                    "Unable to fund app mbr if voting period is over.",
                )?;
                referenced(&sender_key)?;
                app.boxes.insert(sender_key, vec![0, 0]);
            }
            MethodCall::RequestBoxStorage { mbr_pay } => {
                ensure(
                    !is_creator,
                    "Invalid sender address! Application creator address can not use request box storage method.",
                )?;
                ensure(
                    !app.boxes.contains_key(&sender_key),
                    "Transaction sender address must not be present in box a_.",
                )?;
                ensure(
                    mbr_pay.sender == sender,
                    "Box storage MBR payment must be sent by the transaction sender.",
                )?;
                ensure(
                    mbr_pay.receiver == app.address,
                    "Box storage MBR payment reciever address must match application address.",
                )?;
                ensure(
                    mbr_pay.amount >= BOX_A_MBR,
                    "Box storage MBR payment amount must be equal or greater than box _a fee.",
                )?;
                ensure(
                    now <= app.global.uint(KEY_POLL_END),
                    "Unable to request box storage if voting period is over.",
                )?;
                self.pay(mbr_pay)?;
                referenced(&sender_key)?;
                app.boxes.insert(sender_key, vec![0, 0]);
            }
            MethodCall::SubmitVote { choice } => {
                let record = app
                    .boxes
                    .get(&sender_key)
                    .ok_or_else(|| reject("Transaction sender address must be present in box a_."))?;
                ensure(
                    record[..] == [0, 0],
                    "Transaction sender address already submitted a vote.",
                )?;
                ensure(
                    CHOICE_RANGE.contains(choice),
                    "Invalid choice. Can only select choices 1, 2, 3.",
                )?;
                referenced(&sender_key)?;
                app.boxes.insert(sender_key, vec![1, *choice]);
                let total = match choice {
                    1 => KEY_TOTAL_CHOICE1,
                    2 => KEY_TOTAL_CHOICE2,
                    _ => KEY_TOTAL_CHOICE3,
                };
                let (choice_votes, votes) = (app.global.uint(total), app.global.uint(KEY_TOTAL_VOTES));
                app.global.set(total, TealValue::Uint(choice_votes + 1));
                app.global.set(KEY_TOTAL_VOTES, TealValue::Uint(votes + 1));
            }
            MethodCall::DeleteBoxStorage => {
                ensure(
                    !is_creator,
                    "Invalid sender address! Application creator must delete smart contract to free up their box storage MBR.",
                )?;
                ensure(
                    app.boxes.contains_key(&sender_key),
                    "Transaction sender address must be present in box a_.",
                )?;
                referenced(&sender_key)?;
                app.boxes.remove(&sender_key);
                // inner payment fee is paid by the application
                self.debit(&app.address, BOX_A_MBR)?;
                self.credit(&sender, cost::delete_box_refund());
            }
            MethodCall::PurgeBoxStorage { box_keys } => {
                ensure(
                    is_creator,
                    "Unauthorized address! Only application creator can purge box storage.",
                )?;
                ensure(
                    !box_keys.is_empty() && box_keys.len() <= MAX_BOX_REFERENCES,
                    "The number of addresses represented by box keys array must be greater than 0 and lesser than 9.",
                )?;
                for account in box_keys {
                    let key = BoxKey::for_account(account);
                    ensure(
                        app.boxes.contains_key(&key),
                        "Account address represented in box key must be present in box a_.",
                    )?;
                    ensure(
                        *account != app.creator,
                        "Account address represented in box key must not match application creator address.",
                    )?;
                    referenced(&key)?;
                    app.boxes.remove(&key);
                    let purged = app.global.uint(KEY_TOTAL_PURGED);
                    app.global.set(KEY_TOTAL_PURGED, TealValue::Uint(purged + 1));
                }
            }
            MethodCall::Terminate => {
                ensure(
                    app.template.deletable,
                    "Template variable 'DELETABLE' needs to be 'True' at deploy-time.",
                )?;
                ensure(
                    is_creator,
                    "Unauthorized address! Only application creator can delete the smart contract.",
                )?;
                ensure(
                    app.boxes.contains_key(&sender_key),
                    "Transaction sender address must be present in box a_.",
                )?;
                referenced(&sender_key)?;
                // close the remainder of the application account to the creator
                let remainder = self.balance(&app.address);
                self.debit(&app.address, remainder)?;
                self.credit(&app.creator, remainder.saturating_sub(MIN_TXN_FEE));
                deleted = true;
            }
        }

        if deleted {
            self.apps.remove(&app_id);
        } else {
            self.apps.insert(app_id, app);
        }
        Ok(ret)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn application(&self, app_id: AppId) -> Result<ApplicationState, LedgerError> {
        let mut inner = self.lock();
        if let Some(err) = inner.faults.fail_read.take() {
            return Err(err);
        }
        let app = inner
            .state
            .apps
            .get(&app_id)
            .ok_or(LedgerError::AppNotFound(app_id))?;
        Ok(ApplicationState {
            app_id,
            app_address: app.address,
            creator: app.creator,
            global_state: app.global.clone(),
        })
    }

    async fn application_boxes(&self, app_id: AppId) -> Result<Vec<BoxKey>, LedgerError> {
        let inner = self.lock();
        let app = inner
            .state
            .apps
            .get(&app_id)
            .ok_or(LedgerError::AppNotFound(app_id))?;
        Ok(app.boxes.keys().cloned().collect())
    }

    async fn application_box(&self, app_id: AppId, key: &BoxKey) -> Result<Vec<u8>, LedgerError> {
        let inner = self.lock();
        let app = inner
            .state
            .apps
            .get(&app_id)
            .ok_or(LedgerError::AppNotFound(app_id))?;
        app.boxes
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::BoxNotFound(hex_name(key)))
    }

    async fn find_deployment(
        &self,
        creator: &Address,
        app_name: &str,
    ) -> Result<Option<Deployment>, LedgerError> {
        let inner = self.lock();
        Ok(inner
            .state
            .apps
            .iter()
            .rev()
            .find(|(_, app)| app.creator == *creator && app.template.app_name == app_name)
            .map(|(id, app)| Deployment {
                app_id: *id,
                app_address: app.address,
                template: app.template.clone(),
            }))
    }

    async fn submit_group(
        &self,
        group: SignedGroup,
        wait_rounds: u64,
    ) -> Result<Confirmation, LedgerError> {
        let mut inner = self.lock();
        match inner.faults.fail_submission.take() {
            Some((0, err)) => return Err(err),
            Some((n, err)) => inner.faults.fail_submission = Some((n - 1, err)),
            None => {}
        }
        if group.txns.is_empty() || group.txns.len() > MAX_GROUP_SIZE {
            return Err(reject("invalid group size"));
        }
        Self::verify(&group)?;

        if inner.faults.unconfirmed {
            inner.state.round += wait_rounds;
            inner.state.timestamp += wait_rounds * ROUND_SECONDS;
            return Ok(Confirmation::default());
        }

        let mut draft = inner.state.clone();
        let mut confirmation = Confirmation::default();
        for (i, stxn) in group.txns.iter().enumerate() {
            let (created, ret) = draft.apply(&stxn.txn).map_err(|e| match e {
                LedgerError::Rejected(msg) => reject(format!("transaction #{i}: {msg}")),
                other => other,
            })?;
            confirmation.created_app = confirmation.created_app.or(created);
            confirmation.returns.push(ret);
        }
        draft.round += 1;
        draft.timestamp += ROUND_SECONDS;
        confirmation.confirmed_round = Some(draft.round);
        inner.state = draft;
        inner.submitted.push(
            group
                .txns
                .iter()
                .map(|s| match &s.txn {
                    Txn::Pay(_) => "pay",
                    Txn::AppCall(c) => c.call.name(),
                })
                .collect(),
        );
        Ok(confirmation)
    }
}

impl Clock for MockLedger {
    fn now_unix(&self) -> u64 {
        self.lock().state.timestamp
    }
}

fn hex_name(key: &BoxKey) -> String {
    hex::encode(key.as_bytes())
}
