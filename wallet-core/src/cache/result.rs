use chrono::{DateTime, Utc};

use crate::errors::WalletError;

/// A cached value or the error of the latest refresh.
///
/// An error built from a previous result keeps that result's data as
/// `stale`, so readers keep the last known good value across failures.
#[derive(Debug, Clone)]
pub enum CacheResult<T> {
    Success {
        data: T,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: WalletError,
        code: Option<u16>,
        stale: Option<T>,
    },
}

impl<T: Clone> CacheResult<T> {
    pub fn success(data: T) -> Self {
        CacheResult::Success {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn error(error: WalletError, previous: Option<&CacheResult<T>>) -> Self {
        CacheResult::Error {
            code: error.code(),
            error,
            stale: previous.and_then(|p| p.data().cloned()),
        }
    }

    /// Fresh data on success, the stale value otherwise.
    pub fn data(&self) -> Option<&T> {
        match self {
            CacheResult::Success { data, .. } => Some(data),
            CacheResult::Error { stale, .. } => stale.as_ref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CacheResult::Success { .. })
    }

    pub fn error_value(&self) -> Option<&WalletError> {
        match self {
            CacheResult::Success { .. } => None,
            CacheResult::Error { error, .. } => Some(error),
        }
    }
}
