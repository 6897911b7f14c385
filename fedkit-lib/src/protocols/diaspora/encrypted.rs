//! Encrypted private payloads.
//!
//! A private Magic Envelope is encrypted with a fresh AES-256-CBC key and IV
//! (PKCS#7 padding). The key and IV are sent as `{"key", "iv"}` JSON,
//! itself encrypted to the recipient with RSA PKCS#1 v1.5:
//!
//! ```json
//! {"aes_key": "<base64 RSA ciphertext>", "encrypted_magic_envelope": "<base64 AES ciphertext>"}
//! ```

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, decode_base64_lenient, CryptoError};
use crate::Result;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Wire form of an encrypted payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub aes_key: String,
    pub encrypted_magic_envelope: String,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SessionKey {
    key: String,
    iv: String,
}

/// Encrypt a Magic Envelope document for `public_key`.
pub fn encrypt(payload: &str, public_key: &RsaPublicKey) -> Result<EncryptedPayload> {
    let mut key = Zeroizing::new([0u8; 32]);
    let mut iv = [0u8; 16];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut key[..]);
    rng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(&key[..], &iv)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(payload.as_bytes());

    let session = SessionKey {
        key: STANDARD.encode(&key[..]),
        iv: STANDARD.encode(iv),
    };
    let session_json = Zeroizing::new(serde_json::to_string(&session)?);
    let wrapped = crypto::rsa_encrypt(public_key, session_json.as_bytes())?;

    Ok(EncryptedPayload {
        aes_key: STANDARD.encode(wrapped),
        encrypted_magic_envelope: STANDARD.encode(ciphertext),
    })
}

/// Decrypt a payload with the recipient's private key.
pub fn decrypt(payload: &EncryptedPayload, private_key: &RsaPrivateKey) -> Result<String> {
    let wrapped = decode_base64_lenient(&payload.aes_key)?;
    let session_json = crypto::rsa_decrypt(private_key, &wrapped)?;
    let session: SessionKey = serde_json::from_slice(&session_json)
        .map_err(|e| CryptoError::DecryptFailed(format!("invalid session key: {}", e)))?;
    let key = Zeroizing::new(decode_base64_lenient(&session.key)?);
    let iv = decode_base64_lenient(&session.iv)?;

    let cipher = Aes256CbcDec::new_from_slices(&key[..], &iv)
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
    let ciphertext = decode_base64_lenient(&payload.encrypted_magic_envelope)?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|e| CryptoError::DecryptFailed(e.to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::DecryptFailed(format!("payload is not UTF-8: {}", e)).into())
}

/// Encrypt and serialise to the JSON wire form.
pub fn encrypt_to_json(payload: &str, public_key: &RsaPublicKey) -> Result<String> {
    Ok(serde_json::to_string(&encrypt(payload, public_key)?)?)
}

/// Parse the JSON wire form and decrypt.
pub fn decrypt_json(json: &str, private_key: &RsaPrivateKey) -> Result<String> {
    let payload: EncryptedPayload = serde_json::from_str(json)?;
    decrypt(&payload, private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FederationErrorCode;
    use crate::test_utils::{alice_private_key, alice_public_key, bob_private_key};

    const ENVELOPE: &str = r#"<me:env xmlns:me="http://salmon-protocol.org/ns/magic-env"><me:data>abc</me:data></me:env>"#;

    #[test]
    fn test_roundtrip() {
        let json = encrypt_to_json(ENVELOPE, &alice_public_key()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("aes_key").is_some());
        assert!(value.get("encrypted_magic_envelope").is_some());
        assert_eq!(decrypt_json(&json, &alice_private_key()).unwrap(), ENVELOPE);
    }

    #[test]
    fn test_fresh_key_per_payload() {
        let a = encrypt(ENVELOPE, &alice_public_key()).unwrap();
        let b = encrypt(ENVELOPE, &alice_public_key()).unwrap();
        assert_ne!(a.encrypted_magic_envelope, b.encrypted_magic_envelope);
    }

    #[test]
    fn test_wrong_key_raises() {
        let payload = encrypt(ENVELOPE, &alice_public_key()).unwrap();
        let err = decrypt(&payload, &bob_private_key()).unwrap_err();
        assert_eq!(err.code(), FederationErrorCode::Crypto);
    }

    #[test]
    fn test_tampered_ciphertext_raises() {
        let mut payload = encrypt(ENVELOPE, &alice_public_key()).unwrap();
        payload.encrypted_magic_envelope = STANDARD.encode(b"abc");
        assert!(decrypt(&payload, &alice_private_key()).is_err());
    }
}
