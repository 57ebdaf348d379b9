//! Hex encoding of command and response packets

use anyhow::{Result, anyhow};
use howler::protocol::{Packet, TRANSFER_LEN};

/// Parse a packet from hex words
///
/// Whitespace, commas and `0x` prefixes are ignored, so both
/// `"01 02 03 ..."` and `"010203..."` are accepted. The result must be
/// exactly one packet long.
pub fn parse_packet(words: &[String]) -> Result<Packet> {
    let digits: String = words
        .iter()
        .flat_map(|w| w.split(|c: char| c.is_whitespace() || c == ','))
        .map(|w| {
            w.strip_prefix("0x")
                .or_else(|| w.strip_prefix("0X"))
                .unwrap_or(w)
        })
        .collect();

    let bytes = hex::decode(&digits).map_err(|e| anyhow!("Invalid hex in command: {}", e))?;

    let packet: Packet = bytes.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Command must be exactly {} bytes, got {}",
            TRANSFER_LEN,
            bytes.len()
        )
    })?;
    Ok(packet)
}

/// Format a packet as space-separated hex bytes
pub fn format_packet(packet: &Packet) -> String {
    packet
        .chunks(1)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}
