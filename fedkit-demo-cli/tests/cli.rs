//! Tests for fedkit-demo-cli
//!
//! These run the built binary against the library's fixture keys and need
//! no network access.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../fedkit-lib/tests/fixtures")
        .join(name)
}

fn fedkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fedkit-demo"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute fedkit-demo")
}

fn stdout(output: &Output) -> String {
    if !output.status.success() {
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

const MESSAGE: &str = "<status_message><text>hello #cli</text><guid>0123456789abcdef</guid><author>alice@example.com</author><public>true</public><created_at>2019-03-18T11:22:33Z</created_at></status_message>";

#[test]
fn test_cli_help() {
    let output = fedkit(&["--help"]);
    let text = stdout(&output);
    assert!(output.status.success());
    for command in ["keygen", "identify", "envelope", "encrypt", "decrypt", "decode", "resolve"] {
        assert!(text.contains(command), "help should mention '{}'", command);
    }
}

#[test]
fn test_identify_ids() {
    assert!(stdout(&fedkit(&["identify", "--id", "alice@example.com"])).contains("diaspora"));
    assert!(stdout(&fedkit(&["identify", "--id", "https://example.com/u/alice"])).contains("activitypub"));
    assert!(!fedkit(&["identify", "--id", "not an id"]).status.success());
}

#[test]
fn test_envelope_sign_verify_encrypt_decrypt() {
    let dir = TempDir::new().unwrap();
    let message = write(&dir, "message.xml", MESSAGE);
    let alice_private = fixture("alice_private.pem").display().to_string();
    let alice_public = fixture("alice_public.pem").display().to_string();
    let bob_private = fixture("bob_private.pem").display().to_string();
    let bob_public = fixture("bob_public.pem").display().to_string();

    let output = fedkit(&["envelope", "sign", &message, "--key", &alice_private, "--handle", "alice@example.com"]);
    let envelope = stdout(&output);
    assert!(output.status.success());
    assert!(envelope.contains("magic-env"));
    let envelope_path = write(&dir, "envelope.xml", &envelope);

    assert!(stdout(&fedkit(&["identify", &envelope_path])).contains("diaspora"));

    let output = fedkit(&["envelope", "verify", &envelope_path, "--key", &alice_public]);
    let verified = stdout(&output);
    assert!(output.status.success());
    assert!(verified.contains("alice@example.com"));
    assert!(verified.contains("hello #cli"));

    assert!(!fedkit(&["envelope", "verify", &envelope_path, "--key", &bob_public]).status.success());

    let encrypted = stdout(&fedkit(&["encrypt", &envelope_path, "--key", &bob_public]));
    assert!(encrypted.contains("encrypted_magic_envelope"));
    let encrypted_path = write(&dir, "private.json", &encrypted);

    let decrypted = stdout(&fedkit(&["decrypt", &encrypted_path, "--key", &bob_private]));
    assert_eq!(decrypted.trim(), envelope.trim());
    assert!(!fedkit(&["decrypt", &encrypted_path, "--key", &alice_private]).status.success());
}

#[test]
fn test_decode_messages() {
    let dir = TempDir::new().unwrap();
    let message = write(&dir, "message.xml", MESSAGE);
    let output = fedkit(&["decode", &message, "--sender", "alice@example.com"]);
    let text = stdout(&output);
    assert!(output.status.success());
    assert!(text.contains("Post"));
    assert!(text.contains("hello #cli"));
    assert!(!fedkit(&["decode", &message]).status.success());

    let note = write(
        &dir,
        "note.json",
        r#"{"@context": "https://www.w3.org/ns/activitystreams", "id": "https://example.com/u/alice/follows/1",
            "type": "Follow", "actor": "https://example.com/u/alice", "object": "https://example.org/u/bob"}"#,
    );
    let text = stdout(&fedkit(&["decode", &note]));
    assert!(text.contains("Follow"));
    assert!(text.contains("https://example.org/u/bob"));
}

#[test]
fn test_keygen_writes_pem_files() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().display().to_string();
    let output = fedkit(&["keygen", "--bits", "1024", "--out", &out, "--name", "carol"]);
    assert!(output.status.success());
    let private = std::fs::read_to_string(dir.path().join("carol.pem")).unwrap();
    let public = std::fs::read_to_string(dir.path().join("carol.pub.pem")).unwrap();
    assert!(private.contains("PRIVATE KEY"));
    assert!(public.contains("PUBLIC KEY"));
}
