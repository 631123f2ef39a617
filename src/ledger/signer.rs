//! Transaction signing.
//!
//! The engine only ever sees the `Signer` trait. `Ed25519Signer` accepts
//! the secret forms a Sui wallet exports (bech32 `suiprivkey…`, hex, or the
//! base64 keystore form with its scheme flag) and signs through
//! `sui-crypto`, which applies the transaction intent and digest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bech32::{FromBase32, Variant};
use secrecy::{ExposeSecret, SecretString};
use sui_crypto::ed25519::Ed25519PrivateKey;
use sui_crypto::SuiSigner as _;

use crate::ledger::transaction::Transaction;
use crate::types::{FarmError, SuiAddress};

/// Signature scheme flag for Ed25519.
const ED25519_FLAG: u8 = 0x00;

/// Human-readable prefix of bech32-encoded private keys.
const PRIVATE_KEY_HRP: &str = "suiprivkey";

/// Signs transactions on behalf of one address.
pub trait Signer: Send + Sync {
    fn address(&self) -> SuiAddress;

    /// Returns the base64 serialized signature
    /// (`flag || signature || public key`).
    fn sign_transaction(&self, tx: &Transaction) -> Result<String, FarmError>;
}

pub struct Ed25519Signer {
    key: Ed25519PrivateKey,
    address: SuiAddress,
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Ed25519Signer {
    pub fn from_secret(secret: &SecretString) -> Result<Self, FarmError> {
        let key = Ed25519PrivateKey::new(decode_secret(secret.expose_secret())?);
        let address = key.public_key().to_address();
        Ok(Self { key, address })
    }
}

impl Signer for Ed25519Signer {
    fn address(&self) -> SuiAddress {
        self.address
    }

    fn sign_transaction(&self, tx: &Transaction) -> Result<String, FarmError> {
        let signature = self
            .key
            .sign_transaction(tx)
            .map_err(|e| FarmError::Signer(format!("signing failed: {e}")))?;
        Ok(signature.to_base64())
    }
}

fn decode_secret(raw: &str) -> Result<[u8; 32], FarmError> {
    let raw = raw.trim();

    let decoded = if raw.starts_with(PRIVATE_KEY_HRP) {
        decode_bech32(raw)?
    } else {
        match raw.strip_prefix("0x") {
            Some(digits) => {
                hex::decode(digits).map_err(|e| FarmError::Signer(format!("hex secret: {e}")))?
            }
            None => match hex::decode(raw) {
                Ok(bytes) if bytes.len() == 32 => bytes,
                _ => BASE64
                    .decode(raw)
                    .map_err(|e| FarmError::Signer(format!("base64 secret: {e}")))?,
            },
        }
    };

    let key = match decoded.len() {
        32 => &decoded[..],
        33 if decoded[0] == ED25519_FLAG => &decoded[1..],
        33 => {
            return Err(FarmError::Signer(format!(
                "unsupported key scheme flag {:#04x}",
                decoded[0]
            )))
        }
        n => return Err(FarmError::Signer(format!("secret must be 32 bytes, got {n}"))),
    };

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(key);
    Ok(bytes)
}

/// `suiprivkey…` carries `flag || key` in plain bech32.
fn decode_bech32(raw: &str) -> Result<Vec<u8>, FarmError> {
    let (hrp, data, variant) =
        bech32::decode(raw).map_err(|e| FarmError::Signer(format!("bech32 secret: {e}")))?;
    if hrp != PRIVATE_KEY_HRP || variant != Variant::Bech32 {
        return Err(FarmError::Signer(format!("unexpected bech32 prefix {hrp}")));
    }
    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| FarmError::Signer(format!("bech32 secret: {e}")))?;
    if bytes.len() != 33 {
        return Err(FarmError::Signer(format!(
            "bech32 secret must carry a scheme flag and 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
