//! Hardware signing over an opaque Bluetooth transport.
//!
//! A sign request is dispatched to the transport and answered later through
//! [`LedgerSigner::deliver`]. Only the most recent request is pending at any
//! time; once it times out, is cancelled or is answered, its id is forgotten
//! and any later delivery for it is refused.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::blockchain::{Address, PublicKey};
use crate::errors::{LedgerError, WalletError, WalletResult};

pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSignRequest {
    pub request_id: Uuid,
    pub device_id: String,
    pub account_index: u32,
    /// Bytes the device signs.
    pub payload: Vec<u8>,
}

/// A device answer: the public key of the account it signed with and the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSignature {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

pub type LedgerResponse = Result<LedgerSignature, LedgerError>;

#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Hand the request to the device. The answer arrives via `LedgerSigner::deliver`.
    async fn dispatch(&self, request: LedgerSignRequest) -> Result<(), LedgerError>;
}

#[derive(Debug)]
struct PendingRequest {
    request_id: Uuid,
    responder: oneshot::Sender<LedgerResponse>,
}

type PendingSlot = Arc<Mutex<Option<PendingRequest>>>;

/// Clears the pending slot when the waiting side goes away for any reason.
struct PendingGuard {
    slot: PendingSlot,
    request_id: Uuid,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|p| p.request_id) == Some(self.request_id) {
            *slot = None;
        }
    }
}

pub struct LedgerSigner {
    transport: Arc<dyn LedgerTransport>,
    pending: PendingSlot,
    timeout: Duration,
}

impl LedgerSigner {
    pub fn new(transport: Arc<dyn LedgerTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pending_request(&self) -> Option<Uuid> {
        self.pending.lock().as_ref().map(|p| p.request_id)
    }

    /// Ask the device to sign `payload` with the key of `expected`.
    pub async fn sign(
        &self,
        device_id: &str,
        account_index: u32,
        expected: Address,
        payload: Vec<u8>,
    ) -> WalletResult<Vec<u8>> {
        let request_id = Uuid::new_v4();
        let (responder, answer) = oneshot::channel();
        {
            let mut slot = self.pending.lock();
            if let Some(previous) = slot.take() {
                log::warn!("superseding ledger request {}", previous.request_id);
            }
            *slot = Some(PendingRequest {
                request_id,
                responder,
            });
        }
        let _guard = PendingGuard {
            slot: self.pending.clone(),
            request_id,
        };

        let request = LedgerSignRequest {
            request_id,
            device_id: device_id.to_string(),
            account_index,
            payload: payload.clone(),
        };
        log::info!(
            "dispatching ledger sign request {} to device {}",
            request_id,
            device_id
        );

        let exchange = async {
            self.transport.dispatch(request).await?;
            answer
                .await
                .map_err(|_| LedgerError::FetchFailure("request was superseded".to_string()))?
        };

        let answered = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(answered) => answered,
            Err(_) => {
                log::warn!(
                    "ledger request {} timed out after {:?}",
                    request_id,
                    self.timeout
                );
                Err(LedgerError::Timeout)
            }
        };
        let signature = answered?;

        if signature.public_key.to_address() != expected {
            return Err(LedgerError::AddressMismatch {
                expected: expected.as_string(),
                actual: signature.public_key.to_address().as_string(),
            }
            .into());
        }
        if !signature
            .public_key
            .verify_signature(&payload, &signature.signature)?
        {
            return Err(WalletError::SignatureError(
                "Device signature does not verify".to_string(),
            ));
        }
        Ok(signature.signature)
    }

    /// Device callback. Returns `false` when `request_id` is no longer pending.
    pub fn deliver(&self, request_id: Uuid, response: LedgerResponse) -> bool {
        let pending = {
            let mut slot = self.pending.lock();
            match slot.as_ref() {
                Some(p) if p.request_id == request_id => slot.take(),
                _ => None,
            }
        };
        match pending {
            Some(pending) => pending.responder.send(response).is_ok(),
            None => {
                log::warn!("ignoring answer for stale ledger request {}", request_id);
                false
            }
        }
    }

    /// Device callback for an APDU error status.
    pub fn deliver_status_word(&self, request_id: Uuid, status: u16) -> bool {
        self.deliver(request_id, Err(LedgerError::from_status_word(status)))
    }

    /// Abort the pending request, failing it with `Cancelled`.
    pub fn cancel(&self) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some(pending) => pending.responder.send(Err(LedgerError::Cancelled)).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::PrivateKey;

    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<LedgerSignRequest>>,
    }

    #[async_trait]
    impl LedgerTransport for RecordingTransport {
        async fn dispatch(&self, request: LedgerSignRequest) -> Result<(), LedgerError> {
            self.requests.lock().push(request);
            Ok(())
        }
    }

    struct BrokenTransport;

    #[async_trait]
    impl LedgerTransport for BrokenTransport {
        async fn dispatch(&self, _request: LedgerSignRequest) -> Result<(), LedgerError> {
            Err(LedgerError::Transport("not connected".into()))
        }
    }

    async fn wait_for_request(transport: &RecordingTransport) -> LedgerSignRequest {
        loop {
            if let Some(request) = transport.requests.lock().last().cloned() {
                return request;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn device_answer_completes_signing() {
        let transport = Arc::new(RecordingTransport::default());
        let signer = Arc::new(LedgerSigner::new(transport.clone(), DEFAULT_LEDGER_TIMEOUT));
        let key = PrivateKey::generate();
        let payload = b"TXpayload".to_vec();

        let task = {
            let signer = signer.clone();
            let payload = payload.clone();
            let address = key.address();
            tokio::spawn(async move { signer.sign("dev", 0, address, payload).await })
        };

        let request = wait_for_request(&transport).await;
        assert_eq!(request.payload, payload);
        assert!(signer.deliver(
            request.request_id,
            Ok(LedgerSignature {
                public_key: *key.public_key(),
                signature: key.sign(&payload),
            })
        ));
        let signature = task.await.unwrap().unwrap();
        assert!(key.public_key().verify_signature(&payload, &signature).unwrap());
        assert!(signer.pending_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_invalidates_request() {
        let transport = Arc::new(RecordingTransport::default());
        let signer = LedgerSigner::new(transport.clone(), DEFAULT_LEDGER_TIMEOUT);
        let key = PrivateKey::generate();

        let err = signer
            .sign("dev", 0, key.address(), b"payload".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Ledger(LedgerError::Timeout)));

        let request_id = transport.requests.lock()[0].request_id;
        assert!(!signer.deliver(
            request_id,
            Ok(LedgerSignature {
                public_key: *key.public_key(),
                signature: key.sign(b"payload"),
            })
        ));
    }

    #[tokio::test]
    async fn wrong_device_account_is_a_mismatch() {
        let transport = Arc::new(RecordingTransport::default());
        let signer = Arc::new(LedgerSigner::new(transport.clone(), DEFAULT_LEDGER_TIMEOUT));
        let expected = PrivateKey::generate().address();
        let device_key = PrivateKey::generate();

        let task = {
            let signer = signer.clone();
            tokio::spawn(async move { signer.sign("dev", 1, expected, b"p".to_vec()).await })
        };
        let request = wait_for_request(&transport).await;
        signer.deliver(
            request.request_id,
            Ok(LedgerSignature {
                public_key: *device_key.public_key(),
                signature: device_key.sign(b"p"),
            }),
        );
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            WalletError::Ledger(LedgerError::AddressMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn status_words_and_transport_errors_surface() {
        let transport = Arc::new(RecordingTransport::default());
        let signer = Arc::new(LedgerSigner::new(transport.clone(), DEFAULT_LEDGER_TIMEOUT));
        let address = PrivateKey::generate().address();

        let task = {
            let signer = signer.clone();
            tokio::spawn(async move { signer.sign("dev", 0, address, b"p".to_vec()).await })
        };
        let request = wait_for_request(&transport).await;
        assert!(signer.deliver_status_word(request.request_id, 0x6E00));
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, WalletError::Ledger(LedgerError::AppClosed)));

        let broken = LedgerSigner::new(Arc::new(BrokenTransport), DEFAULT_LEDGER_TIMEOUT);
        let err = broken.sign("dev", 0, address, b"p".to_vec()).await.unwrap_err();
        assert!(matches!(err, WalletError::Ledger(LedgerError::Transport(_))));
        assert!(broken.pending_request().is_none());
    }
}
