//! Identify command - detect the protocol of a payload or id

use anyhow::Result;
use fedkit_lib::{identify_protocol_by_id, identify_protocol_by_payload};

use crate::ui;

pub fn run(input: Option<&str>, id: Option<&str>) -> Result<()> {
    let protocol = match (id, input) {
        (Some(id), _) => identify_protocol_by_id(id)?,
        (None, Some(input)) => identify_protocol_by_payload(&super::read_input(input)?)?,
        (None, None) => anyhow::bail!("nothing to identify"),
    };
    ui::key_value("Protocol", protocol.as_str());
    Ok(())
}
