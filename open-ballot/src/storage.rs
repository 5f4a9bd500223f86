use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::*;
use crate::window::VotingWindow;

pub type AppId = u64;
pub use cost::MicroAlgos;

/// Raw 32 bytes public identity of a ledger account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; PUBLIC_KEY_LENGTH]);

impl Address {
    pub const ZERO: Address = Address([0; PUBLIC_KEY_LENGTH]);

    pub const fn new(public_key: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(public_key)
    }

    pub fn from_slice(bz: &[u8]) -> Option<Self> {
        bz.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum AddressParseError {
    #[error("address is not a valid hex string: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("address must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bz = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        Address::from_slice(&bz).ok_or(AddressParseError::Length(bz.len()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Name of a participation record box: `a_` followed by the account public key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxKey(Vec<u8>);

impl BoxKey {
    pub fn for_account(account: &Address) -> Self {
        let mut name = Vec::with_capacity(BOX_A_PREFIX.len() + PUBLIC_KEY_LENGTH);
        name.extend_from_slice(BOX_A_PREFIX);
        name.extend_from_slice(account.as_bytes());
        Self(name)
    }

    /// Wraps a raw box name as listed by the ledger, without checking its layout.
    pub fn from_raw(name: Vec<u8>) -> Self {
        Self(name)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Account owning the record: the last 32 bytes of the name.
    /// Returns `None` for names shorter than a public key.
    pub fn account(&self) -> Option<Address> {
        let len = self.0.len();
        if len < PUBLIC_KEY_LENGTH {
            return None;
        }
        Address::from_slice(&self.0[len - PUBLIC_KEY_LENGTH..])
    }

    pub fn is_participation_record(&self) -> bool {
        self.0.len() == BOX_A_PREFIX.len() + PUBLIC_KEY_LENGTH && self.0.starts_with(BOX_A_PREFIX)
    }
}

impl fmt::Debug for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxKey({})", hex::encode(&self.0))
    }
}

/// Value of a participation record box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub voted: bool,
    /// 1-based choice, 0 when not voted yet.
    pub choice: u8,
}

impl VoterRecord {
    pub const ENCODED_LEN: usize = 2;

    /// Decodes the (voted: u8, choice: u8) record. Any other layout is malformed.
    pub fn decode(bz: &[u8]) -> Option<Self> {
        match bz {
            [voted @ (0 | 1), choice] => Some(Self {
                voted: *voted == 1,
                choice: *choice,
            }),
            _ => None,
        }
    }

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        [self.voted as u8, self.choice]
    }

    pub fn voted_for(&self) -> Option<u8> {
        (self.voted && CHOICE_RANGE.contains(&self.choice)).then_some(self.choice)
    }
}

/// Poll data as stored in the application global state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollParams {
    pub title: String,
    pub choices: [String; NUM_CHOICES],
    pub start_date_unix: u64,
    pub end_date_unix: u64,
}

/// UTF-8 encoded arguments of the `set_poll` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPoll {
    pub title: Vec<u8>,
    pub choices: [Vec<u8>; NUM_CHOICES],
    pub start_date_unix: u64,
    pub end_date_unix: u64,
}

impl PollParams {
    pub fn encode(&self) -> EncodedPoll {
        EncodedPoll {
            title: self.title.as_bytes().to_vec(),
            choices: self.choices.clone().map(String::into_bytes),
            start_date_unix: self.start_date_unix,
            end_date_unix: self.end_date_unix,
        }
    }

    /// Reads the poll fields from global state. Missing keys fall back to empty values.
    pub fn from_global_state(state: &GlobalState) -> Self {
        Self {
            title: state.string(KEY_POLL_TITLE),
            choices: [
                state.string(KEY_POLL_CHOICE1),
                state.string(KEY_POLL_CHOICE2),
                state.string(KEY_POLL_CHOICE3),
            ],
            start_date_unix: state.uint(KEY_POLL_START),
            end_date_unix: state.uint(KEY_POLL_END),
        }
    }

    pub fn window(&self) -> VotingWindow {
        VotingWindow::new(self.start_date_unix, self.end_date_unix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TealValue {
    Bytes(Vec<u8>),
    Uint(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState(pub BTreeMap<String, TealValue>);

impl GlobalState {
    pub fn get(&self, key: &str) -> Option<&TealValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: TealValue) {
        self.0.insert(key.to_owned(), value);
    }

    /// Lossy UTF-8 string of a byte slice entry; empty when missing.
    pub fn string(&self, key: &str) -> String {
        match self.get(key) {
            Some(TealValue::Bytes(bz)) => String::from_utf8_lossy(bz).into_owned(),
            Some(TealValue::Uint(v)) => v.to_string(),
            None => String::new(),
        }
    }

    /// Integer entry; 0 when missing or not an integer.
    pub fn uint(&self, key: &str) -> u64 {
        match self.get(key) {
            Some(TealValue::Uint(v)) => *v,
            _ => 0,
        }
    }
}

/// Application as returned by the ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub app_id: AppId,
    pub app_address: Address,
    pub creator: Address,
    pub global_state: GlobalState,
}

/// Poll and participation snapshot handed to the rest of the UI.
///
/// It is a read-through cache of the on-chain state and must be re-fetched after every
/// state changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub id: AppId,
    pub address: Address,
    pub owner_identity: Address,
    pub title: String,
    pub choice1: String,
    pub choice2: String,
    pub choice3: String,
    pub start_time: u64,
    pub end_time: u64,
    pub has_voted: bool,
    pub voted_for_index: Option<u8>,
    pub allocated_keys: Vec<Address>,
    /// Account `has_voted` and `voted_for_index` were read for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_for: Option<Address>,
}

impl AppSnapshot {
    pub fn new(app: &ApplicationState, allocated_keys: Vec<Address>, record: Option<VoterRecord>) -> Self {
        let poll = PollParams::from_global_state(&app.global_state);
        let [choice1, choice2, choice3] = poll.choices;
        Self {
            id: app.app_id,
            address: app.app_address,
            owner_identity: app.creator,
            title: poll.title,
            choice1,
            choice2,
            choice3,
            start_time: poll.start_date_unix,
            end_time: poll.end_date_unix,
            has_voted: record.map(|r| r.voted).unwrap_or(false),
            voted_for_index: record.and_then(|r| r.voted_for()),
            allocated_keys,
            fetched_for: None,
        }
    }

    pub fn window(&self) -> VotingWindow {
        VotingWindow::new(self.start_time, self.end_time)
    }

    pub fn choice(&self, choice: u8) -> Option<&str> {
        match choice {
            1 => Some(&self.choice1),
            2 => Some(&self.choice2),
            3 => Some(&self.choice3),
            _ => None,
        }
    }

    pub fn is_owner(&self, account: &Address) -> bool {
        &self.owner_identity == account
    }

    pub fn has_box_storage(&self, account: &Address) -> bool {
        self.allocated_keys.contains(account)
    }

    /// Allocated records which can be purged by the owner.
    pub fn purgeable_keys(&self) -> impl Iterator<Item = &Address> {
        self.allocated_keys.iter().filter(move |a| **a != self.owner_identity)
    }
}
