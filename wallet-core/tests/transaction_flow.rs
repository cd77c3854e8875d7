mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use algo_wallet_core::api::AssetHolding;
use algo_wallet_core::errors::{LedgerError, WalletError};
use algo_wallet_core::storage::{AccountRegistry, AccountType, LocalAccount};
use algo_wallet_core::transaction::{
    builder_for, ControllerState, DraftKind, LedgerSignRequest, LedgerSignature, LedgerSigner,
    SenderSnapshot, SignedTransaction, SignedTransactionDetail, TransactionController,
    TransactionDraft, DEFAULT_LEDGER_TIMEOUT,
};
use algo_wallet_core::PrivateKey;
use tokio::sync::mpsc::UnboundedReceiver;

use common::{information, params, ChannelTransport, FakeNode, MemoryKeys};

struct Harness {
    node: Arc<FakeNode>,
    keys: Arc<MemoryKeys>,
    ledger: Arc<LedgerSigner>,
    requests: UnboundedReceiver<LedgerSignRequest>,
}

impl Harness {
    fn new(fee_per_byte: u64, min_fee: u64) -> Self {
        let (transport, requests) = ChannelTransport::new();
        Self {
            node: Arc::new(FakeNode::new(params(fee_per_byte, min_fee))),
            keys: Arc::new(MemoryKeys::default()),
            ledger: Arc::new(LedgerSigner::new(
                Arc::new(transport),
                DEFAULT_LEDGER_TIMEOUT,
            )),
            requests,
        }
    }

    fn controller(&self, accounts: Vec<LocalAccount>) -> TransactionController {
        TransactionController::new(
            self.node.clone(),
            self.keys.clone(),
            self.ledger.clone(),
            Arc::new(AccountRegistry::in_memory(accounts).unwrap()),
        )
    }
}

fn snapshot(key: &PrivateKey, balance: u64) -> SenderSnapshot {
    SenderSnapshot::from(&information(key.address(), balance))
}

fn ledger_account(key: &PrivateKey) -> LocalAccount {
    LocalAccount::new(
        key.address(),
        "Nano",
        AccountType::Ledger {
            device_id: "nano-x-01".to_string(),
            account_index: 0,
        },
    )
}

#[tokio::test]
async fn plain_transfer_fee_matches_signed_size() {
    let harness = Harness::new(1000, 100_000);
    let key = PrivateKey::generate();
    harness.keys.insert(key.clone());
    let controller = harness.controller(vec![LocalAccount::new(
        key.address(),
        "Main",
        AccountType::Standard,
    )]);

    let receiver = PrivateKey::generate().address();
    controller.set_draft(TransactionDraft::send(
        snapshot(&key, 50_000_000),
        receiver,
        1_000_000,
    ));
    let detail = controller.compose_and_sign().await.unwrap();

    let signed_len = detail.signed_bytes().len() as u64;
    let expected = (signed_len * 1000).max(100_000);
    let signed = SignedTransaction::decode(detail.signed_bytes()).unwrap();
    assert_eq!(signed.txn.fee, expected);
    assert_eq!(detail.fee(), expected);
    assert_eq!(controller.draft().unwrap().fee, Some(expected));
    assert!(signed.verify(key.public_key()).unwrap());
    assert!(matches!(
        controller.state(),
        ControllerState::Signed { fee, .. } if fee == expected
    ));

    let tx_id = controller.submit(detail).await.unwrap();
    assert_eq!(tx_id, signed.id().unwrap());
    assert_eq!(harness.node.submitted.lock().len(), 1);
    assert!(matches!(
        controller.state(),
        ControllerState::Completed { tx_id: ref id } if *id == tx_id
    ));
}

fn local_account(key: &PrivateKey) -> LocalAccount {
    LocalAccount::new(key.address(), "Main", AccountType::Standard)
}

/// Signs `draft` from a local key and checks the fee stayed at the unsigned estimate.
async fn sign_without_reconciling(
    draft: TransactionDraft,
    key: &PrivateKey,
) -> SignedTransactionDetail {
    let harness = Harness::new(1000, 100_000);
    harness.keys.insert(key.clone());
    let controller = harness.controller(vec![local_account(key)]);

    let params = harness.node.params.lock().clone().unwrap();
    let estimate = builder_for(draft.transaction_type())
        .estimate_fee(&draft, &params)
        .unwrap();
    controller.set_draft(draft);
    let detail = controller.compose_and_sign().await.unwrap();

    let signed = SignedTransaction::decode(detail.signed_bytes()).unwrap();
    assert_eq!(signed.txn.fee, estimate);
    assert_eq!(detail.fee(), estimate);
    assert_eq!(controller.draft().unwrap().fee, Some(estimate));
    // The signed encoding would cost more; only native sends are re-signed.
    assert!(params.fee_for_size(detail.signed_bytes().len()) > estimate);
    assert!(signed.verify(key.public_key()).unwrap());
    detail
}

#[tokio::test]
async fn asset_add_keeps_the_estimated_fee() {
    let key = PrivateKey::generate();
    let draft = TransactionDraft::new(
        snapshot(&key, 50_000_000),
        DraftKind::AssetAdd {
            asset_id: 31_566_704,
        },
    );
    let detail = sign_without_reconciling(draft, &key).await;
    assert!(matches!(detail, SignedTransactionDetail::AssetOperation(_)));
}

#[tokio::test]
async fn asset_remove_keeps_the_estimated_fee() {
    let key = PrivateKey::generate();
    let mut sender = snapshot(&key, 50_000_000);
    sender.assets.push(AssetHolding {
        asset_id: 31_566_704,
        amount: 10,
        is_frozen: false,
    });
    let draft = TransactionDraft::new(
        sender,
        DraftKind::AssetRemove {
            asset_id: 31_566_704,
            close_to: PrivateKey::generate().address(),
        },
    );
    let detail = sign_without_reconciling(draft, &key).await;
    assert!(matches!(detail, SignedTransactionDetail::AssetOperation(_)));
}

#[tokio::test]
async fn rekey_keeps_the_estimated_fee() {
    let key = PrivateKey::generate();
    let rekey_to = PrivateKey::generate().address();
    let draft = TransactionDraft::new(snapshot(&key, 50_000_000), DraftKind::Rekey { rekey_to });
    let detail = sign_without_reconciling(draft, &key).await;
    assert!(matches!(detail, SignedTransactionDetail::RekeyOperation(_)));
    let signed = SignedTransaction::decode(detail.signed_bytes()).unwrap();
    assert_eq!(signed.txn.rekey_to, Some(rekey_to));
}

#[tokio::test]
async fn params_failure_fails_without_retry() {
    let harness = Harness::new(0, 1000);
    let key = PrivateKey::generate();
    harness.keys.insert(key.clone());
    *harness.node.params.lock() = Err(WalletError::NetworkError("node unreachable".to_string()));
    let controller = harness.controller(vec![local_account(&key)]);
    controller.set_draft(TransactionDraft::send(
        snapshot(&key, 5_000_000),
        PrivateKey::generate().address(),
        1_000,
    ));

    let error = controller.sign_and_submit().await.unwrap_err();
    assert!(matches!(error, WalletError::NetworkError(_)));
    assert!(matches!(
        controller.state(),
        ControllerState::Failed(WalletError::NetworkError(_))
    ));
    assert_eq!(controller.draft().unwrap().fee, None);
    assert!(harness.node.submitted.lock().is_empty());
}

#[tokio::test]
async fn zero_balance_close_out_needs_the_fee() {
    let harness = Harness::new(0, 1000);
    let key = PrivateKey::generate();
    harness.keys.insert(key.clone());
    let controller = harness.controller(vec![LocalAccount::new(
        key.address(),
        "Empty",
        AccountType::Standard,
    )]);

    let receiver = PrivateKey::generate().address();
    controller.set_draft(TransactionDraft::close_out(snapshot(&key, 0), receiver));
    let error = controller.compose_and_sign().await.unwrap_err();

    let fee = controller.draft().unwrap().fee.unwrap();
    assert_eq!(fee, 1000);
    assert!(matches!(error, WalletError::MinimumBalance { required } if required == fee));
    assert!(matches!(
        controller.state(),
        ControllerState::Failed(WalletError::MinimumBalance { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn ledger_timeout_fails_once_and_rejects_late_answer() {
    let mut harness = Harness::new(0, 1000);
    let device_key = PrivateKey::generate();
    let controller = harness.controller(vec![ledger_account(&device_key)]);
    let receiver = PrivateKey::generate().address();
    controller.set_draft(TransactionDraft::send(
        snapshot(&device_key, 5_000_000),
        receiver,
        1_000,
    ));

    let mut states = controller.subscribe();
    let observer = tokio::spawn(async move {
        let mut failures = 0;
        while states.changed().await.is_ok() {
            if states.borrow_and_update().is_failed() {
                failures += 1;
            }
        }
        failures
    });

    let started = tokio::time::Instant::now();
    let error = controller.compose_and_sign().await.unwrap_err();
    assert!(matches!(error, WalletError::Ledger(LedgerError::Timeout)));
    assert!(started.elapsed() >= DEFAULT_LEDGER_TIMEOUT);
    assert!(harness.ledger.pending_request().is_none());

    let request = harness.requests.try_recv().unwrap();
    let late = LedgerSignature {
        public_key: *device_key.public_key(),
        signature: device_key.sign(&request.payload),
    };
    assert!(!harness.ledger.deliver(request.request_id, Ok(late)));
    assert!(controller.state().is_failed());

    drop(controller);
    assert_eq!(observer.await.unwrap(), 1);
}

#[tokio::test]
async fn ledger_answer_completes_signing() {
    let harness = Harness::new(0, 1000);
    let device_key = PrivateKey::generate();
    let controller = harness.controller(vec![ledger_account(&device_key)]);
    let receiver = PrivateKey::generate().address();
    controller.set_draft(TransactionDraft::send(
        snapshot(&device_key, 5_000_000),
        receiver,
        1_000,
    ));

    let ledger = harness.ledger.clone();
    let mut requests = harness.requests;
    let answer_key = device_key.clone();
    let device = tokio::spawn(async move {
        let request = requests.recv().await.unwrap();
        assert_eq!(request.device_id, "nano-x-01");
        let signature = LedgerSignature {
            public_key: *answer_key.public_key(),
            signature: answer_key.sign(&request.payload),
        };
        assert!(ledger.deliver(request.request_id, Ok(signature)));
    });

    let detail = tokio::time::timeout(Duration::from_secs(5), controller.compose_and_sign())
        .await
        .unwrap()
        .unwrap();
    device.await.unwrap();

    let signed = SignedTransaction::decode(detail.signed_bytes()).unwrap();
    assert!(signed.verify(device_key.public_key()).unwrap());
    assert_eq!(detail.fee(), 1000);
}

#[tokio::test]
async fn ledger_native_send_is_signed_twice() {
    let harness = Harness::new(1000, 100_000);
    let device_key = PrivateKey::generate();
    let controller = harness.controller(vec![ledger_account(&device_key)]);
    controller.set_draft(TransactionDraft::send(
        snapshot(&device_key, 50_000_000),
        PrivateKey::generate().address(),
        1_000_000,
    ));

    let ledger = harness.ledger.clone();
    let mut requests = harness.requests;
    let answered = Arc::new(AtomicUsize::new(0));
    let counter = answered.clone();
    let answer_key = device_key.clone();
    let device = tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let signature = LedgerSignature {
                public_key: *answer_key.public_key(),
                signature: answer_key.sign(&request.payload),
            };
            assert!(ledger.deliver(request.request_id, Ok(signature)));
        }
    });

    let detail = tokio::time::timeout(Duration::from_secs(5), controller.compose_and_sign())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answered.load(Ordering::SeqCst), 2);
    device.abort();

    let signed_len = detail.signed_bytes().len() as u64;
    let signed = SignedTransaction::decode(detail.signed_bytes()).unwrap();
    assert_eq!(signed.txn.fee, signed_len * 1000);
    assert_eq!(detail.fee(), signed_len * 1000);
    assert!(signed.verify(device_key.public_key()).unwrap());
    assert!(matches!(detail, SignedTransactionDetail::Send(_)));
}

#[tokio::test]
async fn device_rejection_fails_with_cancelled() {
    let harness = Harness::new(0, 1000);
    let device_key = PrivateKey::generate();
    let controller = harness.controller(vec![ledger_account(&device_key)]);
    controller.set_draft(TransactionDraft::send(
        snapshot(&device_key, 5_000_000),
        PrivateKey::generate().address(),
        1_000,
    ));

    let ledger = harness.ledger.clone();
    let mut requests = harness.requests;
    tokio::spawn(async move {
        let request = requests.recv().await.unwrap();
        ledger.deliver_status_word(request.request_id, LedgerError::SW_USER_REJECTED);
    });

    let error = controller.compose_and_sign().await.unwrap_err();
    assert!(matches!(error, WalletError::Ledger(LedgerError::Cancelled)));
}

#[tokio::test]
async fn watch_only_sender_cannot_sign() {
    let harness = Harness::new(0, 1000);
    let key = PrivateKey::generate();
    let controller = harness.controller(vec![LocalAccount::new(
        key.address(),
        "Watched",
        AccountType::WatchOnly,
    )]);
    controller.set_draft(TransactionDraft::send(
        snapshot(&key, 5_000_000),
        PrivateKey::generate().address(),
        1_000,
    ));

    let error = controller.compose_and_sign().await.unwrap_err();
    assert!(matches!(error, WalletError::MissingSigningKey(_)));
    assert!(controller.state().is_failed());
}

#[tokio::test]
async fn rejected_submission_is_not_retried() {
    let harness = Harness::new(0, 1000);
    let key = PrivateKey::generate();
    harness.keys.insert(key.clone());
    *harness.node.reject_submit.lock() = Some("overspend".to_string());
    let controller = harness.controller(vec![LocalAccount::new(
        key.address(),
        "Main",
        AccountType::Standard,
    )]);
    controller.set_draft(TransactionDraft::send(
        snapshot(&key, 5_000_000),
        PrivateKey::generate().address(),
        1_000,
    ));

    let error = controller.sign_and_submit().await.unwrap_err();
    assert!(matches!(error, WalletError::SubmitRejected(_)));
    assert!(harness.node.submitted.lock().is_empty());
    assert!(matches!(
        controller.state(),
        ControllerState::Failed(WalletError::SubmitRejected(_))
    ));
}

#[tokio::test]
async fn compose_without_draft_fails() {
    let harness = Harness::new(0, 1000);
    let controller = harness.controller(vec![]);
    let error = controller.compose_and_sign().await.unwrap_err();
    assert!(matches!(error, WalletError::InvalidDraft(_)));
}
