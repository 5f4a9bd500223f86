use std::sync::Arc;

use cost::MicroAlgos;
use open_ballot::ext::Clock;
use open_ballot::Address;

pub mod ledger;
pub mod wallet;

pub use ledger::MockLedger;
pub use wallet::Keyring;

/// Fresh ledger and an empty wallet.
pub fn setup() -> (Arc<MockLedger>, Arc<Keyring>) {
    (Arc::new(MockLedger::new()), Arc::new(Keyring::new()))
}

/// Generate a user account holding `balance`
pub fn gen_user_account(
    ledger: &MockLedger,
    wallet: &Keyring,
    name: &str,
    balance: MicroAlgos,
) -> anyhow::Result<Address> {
    let account = wallet.generate(name)?;
    ledger.fund(&account, balance);
    tracing::debug!(name, %account, balance, "user account generated");
    Ok(account)
}

/// Get current block timestamp
pub fn get_block_timestamp(ledger: &MockLedger) -> u64 {
    ledger.now_unix()
}

/// Moves the ledger `seconds` forward, returns the new timestamp.
pub fn fast_forward(ledger: &MockLedger, seconds: u64) -> u64 {
    ledger.fast_forward(seconds);
    ledger.now_unix()
}
