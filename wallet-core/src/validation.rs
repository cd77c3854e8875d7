use crate::errors::{WalletError, WalletResult};
use regex::Regex;

/// Largest note the network accepts on a transaction.
pub const MAX_NOTE_BYTES: usize = 1000;
/// Longest account name shown in the account list.
pub const MAX_ACCOUNT_NAME_LEN: usize = 40;

/// Input validation for values the host passes in as text
#[derive(Debug, Clone)]
pub struct InputValidator {
    address_pattern: Regex,
    amount_pattern: Regex,
    account_name_pattern: Regex,
    currency_pattern: Regex,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let address_pattern = Regex::new(r"^0x[a-fA-F0-9]{64}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid address regex: {}", e)))?;

        let amount_pattern = Regex::new(r"^\d+(\.\d{1,6})?$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount regex: {}", e)))?;

        let account_name_pattern = Regex::new(r"^[\p{L}\p{N} \-_.']+$").map_err(|e| {
            WalletError::ValidationError(format!("Invalid account name regex: {}", e))
        })?;

        let currency_pattern = Regex::new(r"^[A-Z]{3,5}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid currency regex: {}", e)))?;

        Ok(InputValidator {
            address_pattern,
            amount_pattern,
            account_name_pattern,
            currency_pattern,
        })
    }

    /// Validate an account address string
    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        if address.is_empty() {
            return Err(WalletError::ValidationError(
                "Address cannot be empty".to_string(),
            ));
        }

        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(
                "Address format is invalid".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a decimal ALGO amount string
    pub fn validate_amount(&self, amount: &str) -> WalletResult<()> {
        if amount.is_empty() {
            return Err(WalletError::ValidationError(
                "Amount cannot be empty".to_string(),
            ));
        }

        if !self.amount_pattern.is_match(amount) {
            return Err(WalletError::InvalidAmount(
                "Amount format is invalid".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a locally chosen account name
    pub fn validate_account_name(&self, name: &str) -> WalletResult<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(WalletError::ValidationError(
                "Account name cannot be empty".to_string(),
            ));
        }

        if trimmed.chars().count() > MAX_ACCOUNT_NAME_LEN {
            return Err(WalletError::ValidationError(
                "Account name too long".to_string(),
            ));
        }

        if !self.account_name_pattern.is_match(trimmed) {
            return Err(WalletError::ValidationError(
                "Account name contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a transaction note
    pub fn validate_note(&self, note: &[u8]) -> WalletResult<()> {
        if note.len() > MAX_NOTE_BYTES {
            return Err(WalletError::InvalidDraft(format!(
                "Note is {} bytes, at most {} allowed",
                note.len(),
                MAX_NOTE_BYTES
            )));
        }
        Ok(())
    }

    /// Validate a currency identifier such as `USD` or `ALGO`
    pub fn validate_currency(&self, currency_id: &str) -> WalletResult<()> {
        if !self.currency_pattern.is_match(currency_id) {
            return Err(WalletError::ValidationError(format!(
                "Unsupported currency identifier: {}",
                currency_id
            )));
        }
        Ok(())
    }
}
