//! Seams to the external collaborators: ledger node, wallet and clock, plus the transaction
//! types exchanged with them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BOX_REFERENCES, MAX_GROUP_SIZE};
use crate::errors::{GroupError, LedgerError, WalletError};
use crate::storage::{Address, AppId, ApplicationState, BoxKey, EncodedPoll, MicroAlgos};

/// Global state schema of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSchema {
    pub global_bytes: u64,
    pub global_uints: u64,
}

impl StateSchema {
    pub const OPEN_BALLOT: StateSchema = StateSchema {
        global_bytes: cost::GLOBAL_NUM_BYTES,
        global_uints: cost::GLOBAL_NUM_UINT,
    };
}

/// Deploy time parameters attached to the creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTemplate {
    pub app_name: String,
    /// `VERSION_UNIX` template variable; a new value yields a new program.
    pub version_unix: u64,
    pub deletable: bool,
    pub schema: StateSchema,
}

/// Application previously deployed by a creator under a given name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub app_id: AppId,
    pub app_address: Address,
    pub template: DeployTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub sender: Address,
    pub receiver: Address,
    pub amount: MicroAlgos,
}

/// ABI methods of the OpenBallot application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodCall {
    Generate,
    Terminate,
    SetPoll { poll: EncodedPoll },
    FundAppMbr { mbr_pay: Payment },
    RequestBoxStorage { mbr_pay: Payment },
    SubmitVote { choice: u8 },
    DeleteBoxStorage,
    PurgeBoxStorage { box_keys: Vec<Address> },
    GetVersionUnix,
}

impl MethodCall {
    pub fn name(&self) -> &'static str {
        match self {
            MethodCall::Generate => "generate",
            MethodCall::Terminate => "terminate",
            MethodCall::SetPoll { .. } => "set_poll",
            MethodCall::FundAppMbr { .. } => "fund_app_mbr",
            MethodCall::RequestBoxStorage { .. } => "request_box_storage",
            MethodCall::SubmitVote { .. } => "submit_vote",
            MethodCall::DeleteBoxStorage => "delete_box_storage",
            MethodCall::PurgeBoxStorage { .. } => "purge_box_storage",
            MethodCall::GetVersionUnix => "get_version_unix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCall {
    /// `None` creates a new application.
    pub app_id: Option<AppId>,
    pub sender: Address,
    pub call: MethodCall,
    /// Box references, at most [`MAX_BOX_REFERENCES`].
    pub boxes: Vec<BoxKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployTemplate>,
}

impl AppCall {
    pub fn new(app_id: AppId, sender: Address, call: MethodCall) -> Self {
        Self {
            app_id: Some(app_id),
            sender,
            call,
            boxes: Vec::new(),
            deploy: None,
        }
    }

    pub fn with_boxes(mut self, boxes: Vec<BoxKey>) -> Self {
        self.boxes = boxes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Txn {
    Pay(Payment),
    AppCall(AppCall),
}

impl Txn {
    pub fn sender(&self) -> &Address {
        match self {
            Txn::Pay(p) => &p.sender,
            Txn::AppCall(c) => &c.sender,
        }
    }

    /// Bytes signed by the sender and verified by the ledger.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bz = b"TX".to_vec();
        serde_json::to_writer(&mut bz, self)?;
        Ok(bz)
    }
}

/// Transactions submitted together, all of them take effect or none does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicGroup {
    txns: Vec<Txn>,
}

impl AtomicGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, txn: Txn) -> Result<&mut Self, GroupError> {
        if self.txns.len() >= MAX_GROUP_SIZE {
            return Err(GroupError::TooManyTransactions { max: MAX_GROUP_SIZE });
        }
        if let Txn::AppCall(call) = &txn {
            if call.boxes.len() > MAX_BOX_REFERENCES {
                return Err(GroupError::TooManyBoxReferences {
                    count: call.boxes.len(),
                    max: MAX_BOX_REFERENCES,
                });
            }
        }
        self.txns.push(txn);
        Ok(self)
    }

    pub fn add_method_call(&mut self, call: AppCall) -> Result<&mut Self, GroupError> {
        self.add(Txn::AppCall(call))
    }

    pub fn len(&self) -> usize {
        self.txns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    pub fn txns(&self) -> &[Txn] {
        &self.txns
    }

    pub fn into_txns(self) -> Vec<Txn> {
        self.txns
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTxn {
    pub txn: Txn,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedGroup {
    pub txns: Vec<SignedTxn>,
}

/// Outcome of a submitted group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// `None` when the group was not confirmed within the wait budget.
    pub confirmed_round: Option<u64>,
    /// Id of the application created by the group, if any.
    pub created_app: Option<AppId>,
    /// ABI return value of each transaction.
    pub returns: Vec<Option<u64>>,
}

/// Ledger node client: state queries and transaction submission.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn application(&self, app_id: AppId) -> Result<ApplicationState, LedgerError>;

    /// Names of all boxes allocated by the application.
    async fn application_boxes(&self, app_id: AppId) -> Result<Vec<BoxKey>, LedgerError>;

    async fn application_box(&self, app_id: AppId, key: &BoxKey) -> Result<Vec<u8>, LedgerError>;

    /// Latest application deployed by `creator` under `app_name`.
    async fn find_deployment(
        &self,
        creator: &Address,
        app_name: &str,
    ) -> Result<Option<Deployment>, LedgerError>;

    /// Submits the group and waits at most `wait_rounds` rounds for its confirmation.
    async fn submit_group(
        &self,
        group: SignedGroup,
        wait_rounds: u64,
    ) -> Result<Confirmation, LedgerError>;
}

/// Wallet holding the accounts and signing on their behalf.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Connects and returns the available accounts.
    async fn connect(&self) -> Result<Vec<Address>, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    fn active_account(&self) -> Option<Address>;

    async fn sign(&self, signer: &Address, payload: &[u8]) -> Result<Vec<u8>, WalletError>;
}

pub trait Clock: Send + Sync {
    /// Current time in unix seconds.
    fn now_unix(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
    }
}
