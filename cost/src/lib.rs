/// Amounts are expressed in microAlgos.
pub type MicroAlgos = u64;

pub const ONE_ALGO: MicroAlgos = 1_000_000;

/// Ledger minimum balance of any account (and of an application account).
pub const MIN_BALANCE: MicroAlgos = 100_000;
pub const MIN_TXN_FEE: MicroAlgos = 1_000;

/// Flat part of a box MBR.
pub const BOX_FLAT_MBR: MicroAlgos = 2_500;
/// Per byte part of a box MBR, applied to key and value bytes.
pub const BOX_BYTE_MBR: MicroAlgos = 400;

/// Participation record box: `a_` prefix + 32 bytes public key.
pub const BOX_A_KEY_LEN: u64 = 34;
/// Participation record value: (voted: u8, choice: u8).
pub const BOX_A_VALUE_LEN: u64 = 2;

/// Box storage MBR of a single participation record (0.0169 ALGO).
pub const BOX_A_MBR: MicroAlgos = box_mbr(BOX_A_KEY_LEN, BOX_A_VALUE_LEN);

/// Amount the creator sends to the application account when the poll is set up:
/// application minimum balance + the creator's own participation record.
pub const APP_FUND_MBR: MicroAlgos = MIN_BALANCE + BOX_A_MBR;

/// Global schema of the poll application: 4 byte slices and 8 integers.
pub const GLOBAL_NUM_BYTES: u64 = 4;
pub const GLOBAL_NUM_UINT: u64 = 8;

#[inline]
pub const fn box_mbr(key_len: u64, value_len: u64) -> MicroAlgos {
    BOX_FLAT_MBR + BOX_BYTE_MBR * (key_len + value_len)
}

/// Minimum balance the creator must hold to create an application with the given global schema.
pub const fn schema_mbr(num_bytes: u64, num_uint: u64) -> MicroAlgos {
    // base: 100_000 * (1 + extra program pages)
    // byte slice entry: 25_000 + 25_000
    // uint entry: 25_000 + 3_500
    100_000 + 50_000 * num_bytes + 28_500 * num_uint
}

/// Balance a creator account needs before it can create the poll application.
pub fn creator_min_balance() -> MicroAlgos {
    MIN_BALANCE + schema_mbr(GLOBAL_NUM_BYTES, GLOBAL_NUM_UINT)
}

/// MBR released back to the application creator after `purged` records were purged.
pub fn purge_refund(purged: usize) -> MicroAlgos {
    purged as u64 * BOX_A_MBR
}

/// Refund a participant receives when deleting its own record; the inner payment fee is
/// paid out of the released MBR.
pub fn delete_box_refund() -> MicroAlgos {
    BOX_A_MBR - MIN_TXN_FEE
}
