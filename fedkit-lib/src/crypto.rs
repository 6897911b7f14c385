//! RSA primitives shared by both protocols.
//!
//! Every signature scheme in this crate (Magic Envelope, relayable
//! signatures, HTTP signatures, LD signatures) is RSASSA-PKCS#1 v1.5 over
//! SHA-256. Diaspora private payloads wrap their AES session key with
//! RSAES-PKCS#1 v1.5.
//!
//! Keys travel as PEM: private keys as PKCS#1 (`BEGIN RSA PRIVATE KEY`) or
//! PKCS#8, public keys as SPKI (`BEGIN PUBLIC KEY`) or PKCS#1.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Default modulus size for generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Crypto error types.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Signing failed: {0}")]
    SignFailed(String),
    #[error("Signature does not match")]
    BadSignature,
    #[error("Invalid encoding: {0}")]
    Encoding(String),
    #[error("Encryption failed: {0}")]
    EncryptFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptFailed(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Parse a PEM private key in PKCS#1 or PKCS#8 form.
pub fn parse_private_key(pem: &str) -> CryptoResult<RsaPrivateKey> {
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Parse a PEM public key in SPKI or PKCS#1 form.
pub fn parse_public_key(pem: &str) -> CryptoResult<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Serialize a public key as SPKI PEM, the form ActivityPub actors publish.
pub fn public_key_pem(key: &RsaPublicKey) -> CryptoResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Serialize a private key as PKCS#1 PEM.
pub fn private_key_pem(key: &RsaPrivateKey) -> CryptoResult<Zeroizing<String>> {
    key.to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Generate a fresh RSA private key.
pub fn generate_private_key(bits: usize) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Sign `message` with PKCS#1 v1.5 over its SHA-256 digest.
///
/// Deterministic for a fixed key and message.
pub fn sign_sha256(key: &RsaPrivateKey, message: &[u8]) -> CryptoResult<Vec<u8>> {
    let digest = Sha256::digest(message);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::SignFailed(e.to_string()))
}

/// Verify a PKCS#1 v1.5 SHA-256 signature over `message`.
pub fn verify_sha256(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
    let digest = Sha256::digest(message);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|_| CryptoError::BadSignature)
}

/// Encrypt a short secret for `key` with PKCS#1 v1.5 padding.
pub fn rsa_encrypt(key: &RsaPublicKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    key.encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, data)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))
}

/// Decrypt a PKCS#1 v1.5 wrapped secret.
pub fn rsa_decrypt(key: &RsaPrivateKey, data: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    key.decrypt(Pkcs1v15Encrypt, data)
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Decode base64 in either alphabet, with or without padding.
///
/// Peers disagree on padding and sometimes wrap long values, so whitespace
/// and `=` are ignored.
pub fn decode_base64_lenient(input: &str) -> CryptoResult<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect();
    let engine = if cleaned.contains('-') || cleaned.contains('_') {
        &URL_SAFE_NO_PAD
    } else {
        &STANDARD_NO_PAD
    };
    engine
        .decode(cleaned.as_bytes())
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{alice_private_key, alice_public_key, bob_public_key};
    use base64::engine::general_purpose::{STANDARD, URL_SAFE};

    #[test]
    fn test_sign_verify_roundtrip() {
        let signature = sign_sha256(&alice_private_key(), b"hello").unwrap();
        assert!(verify_sha256(&alice_public_key(), b"hello", &signature).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_key_and_message() {
        let signature = sign_sha256(&alice_private_key(), b"hello").unwrap();
        assert!(matches!(
            verify_sha256(&bob_public_key(), b"hello", &signature),
            Err(CryptoError::BadSignature)
        ));
        assert!(verify_sha256(&alice_public_key(), b"hellp", &signature).is_err());
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let a = sign_sha256(&alice_private_key(), b"same").unwrap();
        let b = sign_sha256(&alice_private_key(), b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pem_roundtrip() {
        let pem = public_key_pem(&alice_public_key()).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(parse_public_key(&pem).unwrap(), alice_public_key());

        let private_pem = private_key_pem(&alice_private_key()).unwrap();
        assert_eq!(parse_private_key(&private_pem).unwrap(), alice_private_key());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        assert!(matches!(
            parse_public_key("not a key"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rsa_encrypt_decrypt() {
        let ciphertext = rsa_encrypt(&alice_public_key(), b"session key").unwrap();
        let plaintext = rsa_decrypt(&alice_private_key(), &ciphertext).unwrap();
        assert_eq!(plaintext.as_slice(), b"session key");
    }

    #[test]
    fn test_decode_base64_lenient() {
        let data = b"\xfb\xff subjects?";
        assert_eq!(decode_base64_lenient(&STANDARD.encode(data)).unwrap(), data);
        assert_eq!(decode_base64_lenient(&URL_SAFE.encode(data)).unwrap(), data);
        let wrapped = format!("{}\n", STANDARD.encode(data));
        assert_eq!(decode_base64_lenient(&wrapped).unwrap(), data);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
