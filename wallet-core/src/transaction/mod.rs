//! Composing, signing and submitting transactions.

pub mod builder;
pub mod controller;
pub mod detail;
pub mod draft;
pub mod encoding;
pub mod ledger;
pub mod signer;

pub use builder::{builder_for, ASSET_MIN_BALANCE};
pub use controller::{ControllerState, TransactionController};
pub use detail::{SignedPayload, SignedTransactionDetail};
pub use draft::{DraftKind, SenderSnapshot, TransactionDraft, TransactionType};
pub use encoding::{SignedTransaction, TransactionBody, UnsignedTransaction};
pub use ledger::{
    LedgerResponse, LedgerSignRequest, LedgerSignature, LedgerSigner, LedgerTransport,
    DEFAULT_LEDGER_TIMEOUT,
};
pub use signer::{resolve_signer, KeyStore, ResolvedSigner};
