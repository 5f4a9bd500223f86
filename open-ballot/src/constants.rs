use std::ops::RangeInclusive;

/// 1s in seconds; on-chain timestamps are unix seconds.
pub const SECOND: u64 = 1;
pub const MINUTE: u64 = 60 * SECOND;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;

/// Global state byte slices are limited to 128 bytes for key + value.
/// `poll_title` key (10 bytes) leaves 118 bytes for the value.
pub const MAX_TITLE_BYTES: usize = 118;
/// `poll_choiceN` key (12 bytes) leaves 116 bytes for the value.
pub const MAX_CHOICE_BYTES: usize = 116;

pub const MIN_VOTING_PERIOD: u64 = 3 * DAY;
pub const MAX_VOTING_PERIOD: u64 = 14 * DAY;

/// Number of choices of every poll.
pub const NUM_CHOICES: usize = 3;
/// Choices are 1-based on-chain.
pub const CHOICE_RANGE: RangeInclusive<u8> = 1..=3;

/// Key prefix of participation record boxes.
pub const BOX_A_PREFIX: &[u8] = b"a_";
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Maximum number of box references a single application call may carry.
pub const MAX_BOX_REFERENCES: usize = 8;
/// Maximum number of transactions in one atomic group.
pub const MAX_GROUP_SIZE: usize = 16;

pub const PURGE_BATCH_SIZE: usize = 8;
pub const PURGE_BATCHES_PER_GROUP: usize = 2;
/// Confirmation budget (rounds) of the set-poll + fund group.
pub const SET_POLL_WAIT_ROUNDS: u64 = 2;
/// Confirmation budget (rounds) of every purge group.
pub const PURGE_WAIT_ROUNDS: u64 = 5;
/// Confirmation budget of single, non grouped calls.
pub const DEFAULT_WAIT_ROUNDS: u64 = 4;

pub const APP_NAME: &str = "Open Ballot";

/// Global state keys of the poll application.
pub const KEY_POLL_TITLE: &str = "poll_title";
pub const KEY_POLL_CHOICE1: &str = "poll_choice1";
pub const KEY_POLL_CHOICE2: &str = "poll_choice2";
pub const KEY_POLL_CHOICE3: &str = "poll_choice3";
pub const KEY_POLL_START: &str = "poll_start_date_unix";
pub const KEY_POLL_END: &str = "poll_end_date_unix";
pub const KEY_POLL_FINALIZED: &str = "poll_finalized";
pub const KEY_TOTAL_PURGED: &str = "total_purged_box_a_";
pub const KEY_TOTAL_CHOICE1: &str = "total_choice1";
pub const KEY_TOTAL_CHOICE2: &str = "total_choice2";
pub const KEY_TOTAL_CHOICE3: &str = "total_choice3";
pub const KEY_TOTAL_VOTES: &str = "total_votes";

pub const STYLE_SUCCESS: &str = "text-green-700 font-bold";
pub const STYLE_ERROR: &str = "text-red-700 font-bold";

pub const BORDER_VALID: &str = "border-2 border-green-500";
pub const BORDER_INVALID: &str = "border-2 border-red-500";
