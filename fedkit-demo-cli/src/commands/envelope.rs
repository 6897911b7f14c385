//! Envelope commands - sign and verify Diaspora Magic Envelopes

use std::path::Path;

use anyhow::Result;
use fedkit_lib::protocols::diaspora::MagicEnvelope;

use crate::ui;

pub fn sign(input: &str, key: &Path, handle: &str, legacy: bool) -> Result<()> {
    let message = super::read_input(input)?;
    let private_key = super::read_private_key(key)?;
    let envelope = MagicEnvelope::build(message.trim(), &private_key, handle, legacy)?;
    tracing::debug!(handle, "signed Magic Envelope");
    println!("{}", envelope.render());
    Ok(())
}

pub fn verify(input: &str, key: &Path) -> Result<()> {
    let envelope = MagicEnvelope::parse(super::read_input(input)?.trim())?;
    let public_key = super::read_public_key(key)?;
    envelope.verify(&public_key)?;

    ui::success("Signature is valid");
    ui::key_value("Signer", &envelope.sender_handle()?);
    ui::separator();
    println!("{}", envelope.message()?);
    Ok(())
}
