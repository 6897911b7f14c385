//! Keygen command - create an RSA key pair

use std::path::Path;

use anyhow::Result;
use fedkit_lib::crypto;

use crate::ui;

pub fn run(bits: usize, out: Option<&Path>, name: &str) -> Result<()> {
    let spinner = ui::spinner(&format!("Generating {}-bit RSA key...", bits));
    let generated = crypto::generate_private_key(bits);
    spinner.finish_and_clear();
    let private_key = generated?;

    let private_pem = crypto::private_key_pem(&private_key)?;
    let public_pem = crypto::public_key_pem(&private_key.to_public_key())?;

    match out {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let private_path = dir.join(format!("{}.pem", name));
            let public_path = dir.join(format!("{}.pub.pem", name));
            std::fs::write(&private_path, private_pem.as_bytes())?;
            std::fs::write(&public_path, public_pem.as_bytes())?;
            ui::success("Key pair generated");
            ui::key_value("Private key", &private_path.display().to_string());
            ui::key_value("Public key", &public_path.display().to_string());
        }
        None => {
            print!("{}", private_pem.as_str());
            print!("{}", public_pem);
        }
    }
    Ok(())
}
