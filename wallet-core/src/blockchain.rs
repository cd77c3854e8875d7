/// Core ledger types for the wallet
///
/// Addresses are Ed25519 public keys; amounts are integer micro-units.
use crate::errors::{WalletError, WalletResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// An account address
///
/// Rendered as `0x{64_hex_chars}`: the account's Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::InvalidAddress(format!(
                "Invalid address length: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Address(raw))
    }

    /// Parse an address from its `0x` hex form
    pub fn from_string(address: &str) -> WalletResult<Self> {
        let hex_part = address.strip_prefix("0x").ok_or_else(|| {
            WalletError::InvalidAddress("Address must start with '0x'".to_string())
        })?;

        if hex_part.len() != Self::LEN * 2 {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid address length: expected {} characters, got {}",
                Self::LEN * 2 + 2,
                address.len()
            )));
        }

        let bytes = hex::decode(hex_part)
            .map_err(|_| WalletError::InvalidAddress("Invalid hex in address".to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_string(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form used in log lines.
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_string(&raw).map_err(serde::de::Error::custom)
    }
}

/// An amount of Algos in micro-units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Number of decimal places for ALGO
    pub const DECIMALS: u8 = 6;
    /// Micro-units per ALGO
    pub const UNITS_PER_ALGO: u64 = 1_000_000;

    pub const fn from_micro(micro: u64) -> Self {
        Amount(micro)
    }

    pub fn micro(&self) -> u64 {
        self.0
    }

    /// Create amount from string (supports decimal notation)
    pub fn from_string(amount_str: &str) -> WalletResult<Self> {
        if amount_str.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let parts: Vec<&str> = amount_str.split('.').collect();
        if parts.len() > 2 {
            return Err(WalletError::InvalidAmount(
                "Invalid decimal format".to_string(),
            ));
        }

        let whole: u64 = parts[0]
            .parse()
            .map_err(|_| WalletError::InvalidAmount("Invalid number format".to_string()))?;

        let fractional = if parts.len() == 2 {
            let fractional_str = parts[1];
            if fractional_str.len() > Self::DECIMALS as usize {
                return Err(WalletError::InvalidAmount(
                    "Too many decimal places".to_string(),
                ));
            }
            format!("{:0<6}", fractional_str)
                .parse::<u64>()
                .map_err(|_| WalletError::InvalidAmount("Invalid fractional part".to_string()))?
        } else {
            0
        };

        whole
            .checked_mul(Self::UNITS_PER_ALGO)
            .and_then(|w| w.checked_add(fractional))
            .map(Amount)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))
    }

    /// Full precision decimal string without trailing zeros
    pub fn as_string(&self) -> String {
        let whole = self.0 / Self::UNITS_PER_ALGO;
        let fractional = self.0 % Self::UNITS_PER_ALGO;

        if fractional == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:06}", fractional);
            format!("{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }

    pub fn checked_add(&self, other: Amount) -> WalletResult<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow in addition".to_string()))
    }

    pub fn checked_sub(&self, other: Amount) -> WalletResult<Amount> {
        self.0.checked_sub(other.0).map(Amount).ok_or_else(|| {
            WalletError::InvalidAmount("Insufficient amount for subtraction".to_string())
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ALGO", self.as_string())
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_string(s)
    }
}

/// Ed25519 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub const SIZE: usize = 32;

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::CryptoError(format!(
                "Invalid public key size: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            ))
        })?;
        Ok(PublicKey(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_address(&self) -> Address {
        Address(self.0)
    }

    /// Verify a signature against data
    pub fn verify_signature(&self, data: &[u8], signature: &[u8]) -> WalletResult<bool> {
        let verifying_key = VerifyingKey::from_bytes(&self.0).map_err(|e| {
            WalletError::CryptoError(format!("Failed to create verifying key: {}", e))
        })?;

        let sig = Signature::from_slice(signature)
            .map_err(|_| WalletError::CryptoError("Invalid signature format".to_string()))?;

        Ok(verifying_key.verify(data, &sig).is_ok())
    }
}

/// Ed25519 private key for signing transactions
#[derive(Clone)]
pub struct PrivateKey {
    secret: Zeroizing<[u8; 32]>,
    public_key: PublicKey,
}

impl PrivateKey {
    pub const SIZE: usize = 32;

    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        use rand::RngCore;

        let mut secret = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut secret[..]);
        Self::from_secret(secret)
    }

    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(WalletError::InvalidKey(format!(
                "Invalid private key size: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(bytes);
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: Zeroizing<[u8; 32]>) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key = PublicKey(signing_key.verifying_key().to_bytes());
        Self { secret, public_key }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret);
        signing_key.sign(data).to_bytes().to_vec()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}
