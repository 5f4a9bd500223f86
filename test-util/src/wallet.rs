use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};

use open_ballot::ext::WalletProvider;
use open_ballot::{Address, WalletError};

#[derive(Default)]
struct Inner {
    /// account -> secret key bytes
    keys: BTreeMap<Address, [u8; 32]>,
    /// accounts in creation order
    order: Vec<Address>,
    connected: bool,
    active: Option<Address>,
    reject_next: bool,
}

/// Wallet holding deterministic ed25519 keys.
#[derive(Default)]
pub struct Keyring {
    inner: Mutex<Inner>,
}

fn seed(name: &str) -> [u8; 32] {
    let mut seed = [0x5a; 32];
    for (i, b) in name.bytes().enumerate() {
        seed[i % 32] ^= b;
    }
    seed
}

fn keypair(secret: &[u8; 32]) -> Result<Keypair, WalletError> {
    let secret =
        SecretKey::from_bytes(secret).map_err(|e| WalletError::Rejected(e.to_string()))?;
    let public = PublicKey::from(&secret);
    Ok(Keypair { secret, public })
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the account derived from `name`; the same name always yields the same account.
    pub fn generate(&self, name: &str) -> anyhow::Result<Address> {
        let secret = seed(name);
        let kp = keypair(&secret)?;
        let account = Address::new(kp.public.to_bytes());
        let mut inner = self.lock();
        if inner.keys.insert(account, secret).is_none() {
            inner.order.push(account);
        }
        Ok(account)
    }

    /// Makes `account` the active one.
    pub fn select(&self, account: &Address) -> Result<(), WalletError> {
        let mut inner = self.lock();
        if !inner.keys.contains_key(account) {
            return Err(WalletError::NoSigner(*account));
        }
        inner.active = Some(*account);
        Ok(())
    }

    /// The next signature request is refused as a user would do.
    pub fn reject_next_signature(&self) {
        self.lock().reject_next = true;
    }
}

#[async_trait]
impl WalletProvider for Keyring {
    async fn connect(&self) -> Result<Vec<Address>, WalletError> {
        let mut inner = self.lock();
        inner.connected = true;
        if inner.active.is_none() {
            inner.active = inner.order.first().copied();
        }
        Ok(inner.order.clone())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.active = None;
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        let inner = self.lock();
        if !inner.connected {
            return Err(WalletError::NotConnected);
        }
        Ok(inner.order.clone())
    }

    fn active_account(&self) -> Option<Address> {
        let inner = self.lock();
        inner.active.filter(|_| inner.connected)
    }

    async fn sign(&self, signer: &Address, payload: &[u8]) -> Result<Vec<u8>, WalletError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(WalletError::NotConnected);
        }
        if std::mem::take(&mut inner.reject_next) {
            return Err(WalletError::Rejected("user rejected the request".into()));
        }
        let secret = inner
            .keys
            .get(signer)
            .ok_or(WalletError::NoSigner(*signer))?;
        Ok(keypair(secret)?.sign(payload).to_bytes().to_vec())
    }
}
