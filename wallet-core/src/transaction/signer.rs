use crate::blockchain::{Address, PrivateKey};
use crate::errors::{WalletError, WalletResult};
use crate::storage::{AccountType, LocalAccount};

use super::draft::SenderSnapshot;

/// Source of private keys for locally stored accounts.
pub trait KeyStore: Send + Sync {
    fn signing_key(&self, address: &Address) -> WalletResult<PrivateKey>;
}

/// How the authorizing key of a transaction will be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSigner {
    Local {
        address: Address,
    },
    Ledger {
        address: Address,
        device_id: String,
        account_index: u32,
    },
}

impl ResolvedSigner {
    pub fn address(&self) -> Address {
        match self {
            ResolvedSigner::Local { address } | ResolvedSigner::Ledger { address, .. } => *address,
        }
    }

    pub fn is_ledger(&self) -> bool {
        matches!(self, ResolvedSigner::Ledger { .. })
    }
}

/// Pick the local account able to authorize a transaction from `sender`.
///
/// A rekeyed sender is authorized by its auth address, which must itself be
/// an account this wallet holds.
pub fn resolve_signer(
    sender: &SenderSnapshot,
    accounts: &[LocalAccount],
) -> WalletResult<ResolvedSigner> {
    let address = sender.authorizing_address();
    let account = accounts
        .iter()
        .find(|account| account.address == address)
        .ok_or_else(|| {
            WalletError::MissingSigningKey(format!(
                "{} is not an account of this wallet",
                address.as_string()
            ))
        })?;

    match &account.account_type {
        AccountType::Standard => Ok(ResolvedSigner::Local { address }),
        AccountType::Ledger {
            device_id,
            account_index,
        } => Ok(ResolvedSigner::Ledger {
            address,
            device_id: device_id.clone(),
            account_index: *account_index,
        }),
        AccountType::WatchOnly => Err(WalletError::MissingSigningKey(format!(
            "{} is a watch-only account",
            address.as_string()
        ))),
    }
}
