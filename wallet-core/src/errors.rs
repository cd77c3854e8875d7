use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons a hardware signing round can fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerError {
    /// The user rejected the request on the device.
    Cancelled,
    /// The Algorand app is not open on the device.
    AppClosed,
    /// The device signed with a key that does not belong to the expected signer.
    AddressMismatch { expected: String, actual: String },
    /// The device answered with an error or an unreadable payload.
    FetchFailure(String),
    /// No answer arrived before the signing timeout.
    Timeout,
    /// The BLE transport could not deliver the request.
    Transport(String),
}

impl LedgerError {
    /// Status word answered by the user pressing "reject".
    pub const SW_USER_REJECTED: u16 = 0x6985;
    /// Status words answered when the dashboard, not the app, is open.
    pub const SW_APP_CLOSED: [u16; 3] = [0x6E00, 0x6D00, 0x6E01];

    /// Map an APDU status word returned by the device.
    pub fn from_status_word(status: u16) -> Self {
        if status == Self::SW_USER_REJECTED {
            LedgerError::Cancelled
        } else if Self::SW_APP_CLOSED.contains(&status) {
            LedgerError::AppClosed
        } else {
            LedgerError::FetchFailure(format!("device status 0x{:04X}", status))
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::Cancelled => write!(f, "operation cancelled on device"),
            LedgerError::AppClosed => write!(f, "Algorand app is not open on device"),
            LedgerError::AddressMismatch { expected, actual } => write!(
                f,
                "device account {} does not match expected signer {}",
                actual, expected
            ),
            LedgerError::FetchFailure(msg) => write!(f, "failed to fetch signature: {}", msg),
            LedgerError::Timeout => write!(f, "device did not respond in time"),
            LedgerError::Transport(msg) => write!(f, "bluetooth transport error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletError {
    // Cryptographic errors
    CryptoError(String),
    InvalidKey(String),
    SignatureError(String),

    // Signing errors
    MissingSigningKey(String),
    Ledger(LedgerError),

    // Network errors
    NetworkError(String),
    ConnectionTimeout,
    InvalidResponse(String),
    HttpStatus { code: u16, message: String },

    // Compose errors
    MinimumBalance { required: u64 },
    InvalidDraft(String),

    // Submit errors
    SubmitRejected(String),

    // Storage errors
    StorageError(String),
    FileNotFound(String),
    PermissionDenied(String),

    // Validation errors
    ValidationError(String),
    InvalidAddress(String),
    InvalidAmount(String),

    // Application errors
    NotInitialized,
    AlreadyExists(String),
    NotFound(String),

    // Generic errors
    Unknown(String),
}

/// Coarse grouping the host uses to pick how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Compose,
    Signing,
    Submit,
    Storage,
    Validation,
    Application,
}

impl WalletError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WalletError::NetworkError(_)
            | WalletError::ConnectionTimeout
            | WalletError::InvalidResponse(_)
            | WalletError::HttpStatus { .. } => ErrorCategory::Network,

            WalletError::MinimumBalance { .. } | WalletError::InvalidDraft(_) => {
                ErrorCategory::Compose
            }

            WalletError::CryptoError(_)
            | WalletError::InvalidKey(_)
            | WalletError::SignatureError(_)
            | WalletError::MissingSigningKey(_)
            | WalletError::Ledger(_) => ErrorCategory::Signing,

            WalletError::SubmitRejected(_) => ErrorCategory::Submit,

            WalletError::StorageError(_)
            | WalletError::FileNotFound(_)
            | WalletError::PermissionDenied(_) => ErrorCategory::Storage,

            WalletError::ValidationError(_)
            | WalletError::InvalidAddress(_)
            | WalletError::InvalidAmount(_) => ErrorCategory::Validation,

            WalletError::NotInitialized
            | WalletError::AlreadyExists(_)
            | WalletError::NotFound(_)
            | WalletError::Unknown(_) => ErrorCategory::Application,
        }
    }

    /// HTTP status code, when the error came from an HTTP response.
    pub fn code(&self) -> Option<u16> {
        match self {
            WalletError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            WalletError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            WalletError::SignatureError(msg) => write!(f, "Signature error: {}", msg),

            WalletError::MissingSigningKey(address) => {
                write!(f, "No signing key available for {}", address)
            }
            WalletError::Ledger(err) => write!(f, "Ledger error: {}", err),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),
            WalletError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            WalletError::HttpStatus { code, message } => {
                write!(f, "HTTP error {}: {}", code, message)
            }

            WalletError::MinimumBalance { required } => write!(
                f,
                "Balance below minimum: at least {} microAlgos required",
                required
            ),
            WalletError::InvalidDraft(msg) => write!(f, "Invalid transaction: {}", msg),

            WalletError::SubmitRejected(msg) => write!(f, "Transaction rejected: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::NotInitialized => write!(f, "Wallet not initialized"),
            WalletError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),

            WalletError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! wallet_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::WalletError::$variant($msg.to_string())
    };
    ($variant:ident) => {
        $crate::errors::WalletError::$variant
    };
}

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::FileNotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                WalletError::PermissionDenied(error.to_string())
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}

impl From<LedgerError> for WalletError {
    fn from(error: LedgerError) -> Self {
        WalletError::Ledger(error)
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            WalletError::ConnectionTimeout
        } else if error.is_decode() {
            WalletError::InvalidResponse(error.to_string())
        } else {
            WalletError::NetworkError(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_words_map_to_ledger_reasons() {
        assert_eq!(LedgerError::from_status_word(0x6985), LedgerError::Cancelled);
        assert_eq!(LedgerError::from_status_word(0x6E01), LedgerError::AppClosed);
        assert!(matches!(
            LedgerError::from_status_word(0x6A80),
            LedgerError::FetchFailure(msg) if msg.contains("6A80")
        ));
    }

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            WalletError::MinimumBalance { required: 1 }.category(),
            ErrorCategory::Compose
        );
        assert_eq!(
            WalletError::Ledger(LedgerError::Timeout).category(),
            ErrorCategory::Signing
        );
        assert_eq!(
            WalletError::SubmitRejected("overspend".into()).category(),
            ErrorCategory::Submit
        );
        let http = WalletError::HttpStatus {
            code: 503,
            message: "unavailable".into(),
        };
        assert_eq!(http.category(), ErrorCategory::Network);
        assert_eq!(http.code(), Some(503));
    }
}
