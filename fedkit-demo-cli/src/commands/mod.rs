//! CLI command implementations

pub mod decode;
pub mod encrypt;
pub mod envelope;
pub mod identify;
pub mod keygen;
pub mod resolve;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use fedkit_lib::crypto;
use fedkit_lib::rsa::{RsaPrivateKey, RsaPublicKey};

/// Read a file, or stdin for `-`
pub fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(input).with_context(|| format!("cannot read {}", input))
}

pub fn read_private_key(path: &Path) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(crypto::parse_private_key(&pem)?)
}

pub fn read_public_key(path: &Path) -> Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(crypto::parse_public_key(&pem)?)
}
