//! Decode command - map a message to entities without signature checks
//!
//! Relayables (comments, likes) carry author signatures that are checked
//! against a resolved author key, so they are dropped here.

use anyhow::{Context, Result};
use fedkit_lib::protocols::activitypub::mappers as activitypub;
use fedkit_lib::protocols::diaspora::{self, mappers as diaspora_mappers, MagicEnvelope};
use fedkit_lib::Protocol;

use crate::ui;

pub fn run(input: &str, protocol: Option<Protocol>, sender: Option<&str>) -> Result<()> {
    let body = super::read_input(input)?;
    let body = body.trim();
    let protocol = protocol.unwrap_or(if body.starts_with('<') {
        Protocol::Diaspora
    } else {
        Protocol::ActivityPub
    });

    let entities = match protocol {
        Protocol::Diaspora => {
            let (message, envelope_sender) = if diaspora::identify_payload(body) {
                ui::warning("Envelope signature is not verified");
                let envelope = MagicEnvelope::parse(body)?;
                (envelope.message()?, Some(envelope.sender_handle()?))
            } else {
                (body.to_string(), None)
            };
            let sender = sender
                .map(str::to_string)
                .or(envelope_sender)
                .context("--sender is required for a bare Diaspora message")?;
            diaspora_mappers::message_to_objects(&message, &sender, None, None)?
        }
        Protocol::ActivityPub => {
            let document: serde_json::Value = serde_json::from_str(body)?;
            let sender = sender
                .map(str::to_string)
                .or_else(|| document.get("actor").and_then(activitypub::id_of).map(str::to_string))
                .context("--sender is required when the activity has no actor")?;
            activitypub::message_to_objects(&document, &sender)?
        }
    };

    if entities.is_empty() {
        ui::warning("No valid entities in the message");
    }
    for entity in &entities {
        ui::entity(entity);
    }
    Ok(())
}
