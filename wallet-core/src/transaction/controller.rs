use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::{NodeApi, TransactionParams};
use crate::errors::{WalletError, WalletResult};
use crate::storage::AccountRegistry;

use super::builder::{builder_for, Builder};
use super::detail::SignedTransactionDetail;
use super::draft::TransactionDraft;
use super::encoding::{SignedTransaction, UnsignedTransaction};
use super::ledger::LedgerSigner;
use super::signer::{resolve_signer, KeyStore, ResolvedSigner};

/// Progress of the current compose/sign/submit attempt.
#[derive(Debug, Clone)]
pub enum ControllerState {
    Idle,
    ParamsFetching,
    Composing,
    AwaitingLedgerSignature { device_id: String },
    SigningLocally,
    FeeReconciling,
    /// Signed and ready for `submit`.
    Signed { tx_id: String, fee: u64 },
    Submitting,
    Completed { tx_id: String },
    Failed(WalletError),
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerState::Completed { .. } | ControllerState::Failed(_)
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ControllerState::Failed(_))
    }
}

/// Drives one transaction at a time from draft to submission.
///
/// Callers must not start a new attempt before the previous one resolves;
/// overlapping calls are not guarded against.
pub struct TransactionController {
    node: Arc<dyn NodeApi>,
    keys: Arc<dyn KeyStore>,
    ledger: Arc<LedgerSigner>,
    accounts: Arc<AccountRegistry>,
    draft: Mutex<Option<TransactionDraft>>,
    state: watch::Sender<ControllerState>,
}

impl TransactionController {
    pub fn new(
        node: Arc<dyn NodeApi>,
        keys: Arc<dyn KeyStore>,
        ledger: Arc<LedgerSigner>,
        accounts: Arc<AccountRegistry>,
    ) -> Self {
        let (state, _) = watch::channel(ControllerState::Idle);
        Self {
            node,
            keys,
            ledger,
            accounts,
            draft: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// The stored draft, including the fee once one has been computed.
    pub fn draft(&self) -> Option<TransactionDraft> {
        self.draft.lock().clone()
    }

    pub fn set_draft(&self, draft: TransactionDraft) {
        log::debug!(
            "new {:?} draft from {}",
            draft.transaction_type(),
            draft.sender.address.short()
        );
        *self.draft.lock() = Some(draft);
        self.transition(ControllerState::Idle);
    }

    /// Fetch params, compose, sign and reconcile the fee of the stored draft.
    pub async fn compose_and_sign(&self) -> WalletResult<SignedTransactionDetail> {
        let result = self.run_compose_and_sign().await;
        if let Err(error) = &result {
            self.fail(error);
        }
        result
    }

    /// Upload a signed transaction. Not retried on failure.
    pub async fn submit(&self, detail: SignedTransactionDetail) -> WalletResult<String> {
        self.transition(ControllerState::Submitting);
        let payload = detail.into_payload();
        match self.node.submit_transaction(&payload.signed_bytes).await {
            Ok(tx_id) => {
                if tx_id != payload.tx_id {
                    log::warn!(
                        "node reported id {} for transaction {}",
                        tx_id,
                        payload.tx_id
                    );
                }
                log::info!("transaction {} submitted", tx_id);
                self.transition(ControllerState::Completed {
                    tx_id: tx_id.clone(),
                });
                Ok(tx_id)
            }
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    pub async fn sign_and_submit(&self) -> WalletResult<String> {
        let detail = self.compose_and_sign().await?;
        self.submit(detail).await
    }

    async fn run_compose_and_sign(&self) -> WalletResult<SignedTransactionDetail> {
        let mut draft = self
            .draft()
            .ok_or_else(|| WalletError::InvalidDraft("No draft to compose".to_string()))?;

        self.transition(ControllerState::ParamsFetching);
        let params = self.node.transaction_params().await?;

        self.transition(ControllerState::Composing);
        let builder = builder_for(draft.transaction_type());
        let signer = resolve_signer(&draft.sender, &self.accounts.accounts())?;
        let estimate = builder.estimate_fee(&draft, &params)?;
        self.record_fee(&mut draft, estimate);
        let unsigned = builder.compose(&draft, &params, estimate)?;
        let mut signed = self.sign(&signer, unsigned).await?;

        self.transition(ControllerState::FeeReconciling);
        let actual = params.fee_for_size(signed.encode()?.len());
        if actual != estimate && draft.is_native_send() {
            log::info!(
                "fee changed from {} to {} after signing, re-signing",
                estimate,
                actual
            );
            signed = self
                .recompose(builder, &signer, &mut draft, &params, actual)
                .await?;
        }

        let detail = SignedTransactionDetail::new(draft, &signed)?;
        self.transition(ControllerState::Signed {
            tx_id: detail.tx_id().to_string(),
            fee: detail.fee(),
        });
        Ok(detail)
    }

    async fn recompose(
        &self,
        builder: &Builder,
        signer: &ResolvedSigner,
        draft: &mut TransactionDraft,
        params: &TransactionParams,
        fee: u64,
    ) -> WalletResult<SignedTransaction> {
        self.record_fee(draft, fee);
        self.transition(ControllerState::Composing);
        let unsigned = builder.compose(draft, params, fee)?;
        let signed = self.sign(signer, unsigned).await?;
        self.transition(ControllerState::FeeReconciling);
        Ok(signed)
    }

    async fn sign(
        &self,
        signer: &ResolvedSigner,
        unsigned: UnsignedTransaction,
    ) -> WalletResult<SignedTransaction> {
        let payload = unsigned.signing_payload()?;
        let signature = match signer {
            ResolvedSigner::Local { address } => {
                self.transition(ControllerState::SigningLocally);
                let key = self.keys.signing_key(address)?;
                key.sign(&payload)
            }
            ResolvedSigner::Ledger {
                address,
                device_id,
                account_index,
            } => {
                self.transition(ControllerState::AwaitingLedgerSignature {
                    device_id: device_id.clone(),
                });
                self.ledger
                    .sign(device_id, *account_index, *address, payload)
                    .await?
            }
        };
        SignedTransaction::new(unsigned, &signature, signer.address())
    }

    fn record_fee(&self, draft: &mut TransactionDraft, fee: u64) {
        draft.fee = Some(fee);
        if let Some(stored) = self.draft.lock().as_mut() {
            stored.fee = Some(fee);
        }
    }

    fn fail(&self, error: &WalletError) {
        log::warn!("transaction attempt failed: {}", error);
        self.transition(ControllerState::Failed(error.clone()));
    }

    fn transition(&self, next: ControllerState) {
        log::debug!("controller state -> {:?}", next);
        self.state.send_replace(next);
    }
}
