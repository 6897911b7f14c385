//! Encrypt/decrypt commands - private Diaspora payloads

use std::path::Path;

use anyhow::Result;
use fedkit_lib::protocols::diaspora::encrypted;

pub fn encrypt(input: &str, key: &Path) -> Result<()> {
    let envelope = super::read_input(input)?;
    let public_key = super::read_public_key(key)?;
    println!("{}", encrypted::encrypt_to_json(envelope.trim(), &public_key)?);
    Ok(())
}

pub fn decrypt(input: &str, key: &Path) -> Result<()> {
    let payload = super::read_input(input)?;
    let private_key = super::read_private_key(key)?;
    println!("{}", encrypted::decrypt_json(payload.trim(), &private_key)?);
    Ok(())
}
