use thiserror::Error;

use crate::storage::{Address, AppId};

/// Errors surfaced by the external ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger network error: {0}")]
    Network(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("application {0} not found")]
    AppNotFound(AppId),
    #[error("box {0} not found")]
    BoxNotFound(String),
    #[error("invalid signature of transaction #{index} in group")]
    InvalidSignature { index: usize },
}

/// Errors surfaced by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet is not connected")]
    NotConnected,
    #[error("no signer available for account {0}")]
    NoSigner(Address),
    #[error("signing rejected: {0}")]
    Rejected(String),
}

/// Errors raised while composing an atomic group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("atomic group is limited to {max} transactions")]
    TooManyTransactions { max: usize },
    #[error("application call references {count} boxes, limit is {max}")]
    TooManyBoxReferences { count: usize, max: usize },
    #[error("atomic group is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(&'static str),
}

/// Error classes: local preconditions are never retried and never reach the ledger,
/// remote errors come from the ledger or the wallet, stale data means a record vanished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Remote,
    StaleData,
}

#[derive(Debug, Error)]
pub enum BallotError {
    #[error("no active account, please connect a wallet")]
    NoActiveAccount,
    #[error("no application selected")]
    NoAppSelected,
    #[error("no vote choice selected")]
    NoVoteChoice,
    #[error("invalid choice {0}, must be one of 1, 2, 3")]
    InvalidChoice(u8),
    #[error("voting period is not open")]
    VotingClosed,
    #[error("account {0} is not authorized")]
    Unauthorized(Address),
    #[error("account {0} already has box storage")]
    BoxStorageExists(Address),
    #[error("account {0} has no box storage")]
    NoBoxStorage(Address),
    #[error("account {0} already submitted a vote")]
    AlreadyVoted(Address),
    #[error("no box storage left to purge")]
    NothingToPurge,
    #[error("invalid poll inputs: {0}")]
    InvalidPollInputs(String),
    #[error("another action is still in progress")]
    ActionInProgress,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("atomic group was not confirmed within {rounds} rounds")]
    Unconfirmed { rounds: u64 },
    #[error("existing deployment of `{app_name}` has an incompatible schema")]
    SchemaBreak { app_name: String },
    #[error("transaction encoding failed: {0}")]
    Encoding(String),
    #[error("unexpected ledger response: {0}")]
    UnexpectedResponse(&'static str),
}

impl BallotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BallotError::NoActiveAccount
            | BallotError::NoAppSelected
            | BallotError::NoVoteChoice
            | BallotError::InvalidChoice(_)
            | BallotError::VotingClosed
            | BallotError::Unauthorized(_)
            | BallotError::BoxStorageExists(_)
            | BallotError::NoBoxStorage(_)
            | BallotError::AlreadyVoted(_)
            | BallotError::NothingToPurge
            | BallotError::InvalidPollInputs(_)
            | BallotError::ActionInProgress => ErrorKind::Precondition,
            BallotError::Ledger(LedgerError::BoxNotFound(_)) => ErrorKind::StaleData,
            _ => ErrorKind::Remote,
        }
    }
}

impl From<serde_json::Error> for BallotError {
    fn from(e: serde_json::Error) -> Self {
        BallotError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        assert_eq!(BallotError::NoActiveAccount.kind(), ErrorKind::Precondition);
        assert_eq!(BallotError::VotingClosed.kind(), ErrorKind::Precondition);
        assert_eq!(
            BallotError::from(LedgerError::Network("timeout".into())).kind(),
            ErrorKind::Remote
        );
        assert_eq!(
            BallotError::Unconfirmed { rounds: 2 }.kind(),
            ErrorKind::Remote
        );
        assert_eq!(
            BallotError::from(LedgerError::BoxNotFound("a_".into())).kind(),
            ErrorKind::StaleData
        );
        assert_eq!(
            BallotError::from(WalletError::NotConnected).kind(),
            ErrorKind::Remote
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            BallotError::Unconfirmed { rounds: 5 }.to_string(),
            "atomic group was not confirmed within 5 rounds"
        );
        assert_eq!(
            BallotError::from(LedgerError::AppNotFound(3)).to_string(),
            "application 3 not found"
        );
    }
}
