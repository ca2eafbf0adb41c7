/*
    codec.rs - Invite code wire formats

    V1: OURBLOCK_V1:<hub_address>:<network_seed>:<timestamp_us>:<signature_b64>
    V2: OURBLOCK_V2:<base64(JSON)>

    The V1 hub_address may itself contain colons (host:port, IPv6), so V1 is
    split from the right: the last three fields are fixed and everything in
    front of them is the address. A V1 network seed can never contain ':'.

    Nothing here touches cryptography; see AdmissionValidator for that.
*/

use crate::core_identity::{AgentId, SIGNATURE_LEN};
use crate::core_invite::errors::{FormatError, ParseError};
use crate::core_invite::payload::{InvitePayload, InviteV1, InviteV2};
use crate::time::Timestamp;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const V1_PREFIX: &str = "OURBLOCK_V1:";
pub const V2_PREFIX: &str = "OURBLOCK_V2:";

/// JSON object carried inside a V2 code
#[derive(Debug, Serialize, Deserialize)]
struct V2Wire {
    network_seed: String,
    hub_identity_key: String,
    signal_relay_url: String,
    bootstrap_url: String,
    timestamp: u64,
    signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voucher: Option<AgentId>,
}

/// Decode an invite code of either version
pub fn parse(raw: &str) -> Result<InvitePayload, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(rest) = raw.strip_prefix(V1_PREFIX) {
        parse_v1(rest)
    } else if let Some(rest) = raw.strip_prefix(V2_PREFIX) {
        parse_v2(rest)
    } else {
        let prefix: String = raw.split(':').next().unwrap_or_default().chars().take(32).collect();
        Err(ParseError::UnknownVersion(prefix))
    }
}

/// Decode a membrane proof, which is the invite code as UTF-8 bytes
pub fn parse_bytes(raw: &[u8]) -> Result<InvitePayload, ParseError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| ParseError::UnknownVersion("non UTF-8 input".to_string()))?;
    parse(text)
}

fn parse_v1(rest: &str) -> Result<InvitePayload, ParseError> {
    // signature, timestamp, seed, then the remainder as the address
    let fields: Vec<&str> = rest.rsplitn(4, ':').collect();
    if fields.len() != 4 {
        return Err(ParseError::FieldCount { expected: 4, found: fields.len() });
    }

    let signature = STANDARD
        .decode(fields[0])
        .map_err(|e| ParseError::InvalidBase64 { field: "signature", reason: e.to_string() })?;
    let timestamp = fields[1]
        .parse::<u64>()
        .map_err(|e| ParseError::InvalidTimestamp(format!("{}: {}", fields[1], e)))?;

    Ok(InvitePayload::V1(InviteV1 {
        hub_address: fields[3].to_string(),
        network_seed: fields[2].to_string(),
        timestamp: Timestamp::from_micros(timestamp),
        signature,
    }))
}

fn parse_v2(rest: &str) -> Result<InvitePayload, ParseError> {
    let json = STANDARD
        .decode(rest)
        .map_err(|e| ParseError::InvalidBase64 { field: "payload", reason: e.to_string() })?;
    let wire: V2Wire =
        serde_json::from_slice(&json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let key_bytes = STANDARD
        .decode(&wire.hub_identity_key)
        .map_err(|e| ParseError::InvalidBase64 { field: "hub_identity_key", reason: e.to_string() })?;
    let hub_identity_key = AgentId::from_slice(&key_bytes)
        .map_err(|e| ParseError::InvalidKey { field: "hub_identity_key", reason: e.to_string() })?;
    let signature = STANDARD
        .decode(&wire.signature)
        .map_err(|e| ParseError::InvalidBase64 { field: "signature", reason: e.to_string() })?;

    Ok(InvitePayload::V2(InviteV2 {
        network_seed: wire.network_seed,
        hub_identity_key,
        signal_relay_url: wire.signal_relay_url,
        bootstrap_url: wire.bootstrap_url,
        timestamp: Timestamp::from_micros(wire.timestamp),
        signature,
        voucher: wire.voucher,
    }))
}

/// Encode a payload in its own wire format
pub fn serialize(payload: &InvitePayload) -> Result<String, ParseError> {
    match payload {
        InvitePayload::V1(v1) => {
            if v1.network_seed.contains(':') {
                return Err(ParseError::Unencodable {
                    field: "network_seed",
                    reason: "V1 network seeds cannot contain ':'".to_string(),
                });
            }
            if v1.hub_address.trim_start() != v1.hub_address {
                return Err(ParseError::Unencodable {
                    field: "hub_address",
                    reason: "leading whitespace".to_string(),
                });
            }
            Ok(format!(
                "{}{}:{}:{}:{}",
                V1_PREFIX,
                v1.hub_address,
                v1.network_seed,
                v1.timestamp.as_micros(),
                STANDARD.encode(&v1.signature)
            ))
        }
        InvitePayload::V2(v2) => {
            let wire = V2Wire {
                network_seed: v2.network_seed.clone(),
                hub_identity_key: STANDARD.encode(v2.hub_identity_key.as_bytes()),
                signal_relay_url: v2.signal_relay_url.clone(),
                bootstrap_url: v2.bootstrap_url.clone(),
                timestamp: v2.timestamp.as_micros(),
                signature: STANDARD.encode(&v2.signature),
                voucher: v2.voucher,
            };
            let json = serde_json::to_string(&wire)
                .map_err(|e| ParseError::Unencodable { field: "payload", reason: e.to_string() })?;
            Ok(format!("{}{}", V2_PREFIX, STANDARD.encode(json.as_bytes())))
        }
    }
}

/// Last instant at which the code is still valid
pub fn expires_at(payload: &InvitePayload, validity: Duration) -> Timestamp {
    payload.timestamp().saturating_add(validity)
}

/// A code is valid up to and including its expiry instant
pub fn is_expired(payload: &InvitePayload, now: Timestamp, validity: Duration) -> bool {
    now > expires_at(payload, validity)
}

/// Parse plus structural and expiry checks, without verifying the signature.
///
/// Used to give a joiner immediate feedback before any network round trip.
pub fn validate_format(
    raw: &str,
    now: Timestamp,
    validity: Duration,
) -> Result<InvitePayload, FormatError> {
    let payload = parse(raw)?;

    if payload.network_seed().is_empty() {
        return Err(FormatError::Structure("network_seed is empty".to_string()));
    }
    if payload.signature().len() != SIGNATURE_LEN {
        return Err(FormatError::Structure(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            payload.signature().len()
        )));
    }
    if is_expired(&payload, now, validity) {
        return Err(FormatError::Expired { expired_at: expires_at(&payload, validity) });
    }

    debug!(version = %payload.version(), code = %fingerprint(raw), "invite format ok");
    Ok(payload)
}

/// Short stable identifier for an invite code, safe to log
pub fn fingerprint(raw: &str) -> String {
    let hash = blake3::hash(raw.trim().as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::SigningKeypair;
    use proptest::prelude::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn signed_v1(hub_address: &str, seed: &str, ts: u64) -> InvitePayload {
        let mut payload = InvitePayload::V1(InviteV1 {
            hub_address: hub_address.to_string(),
            network_seed: seed.to_string(),
            timestamp: Timestamp::from_micros(ts),
            signature: Vec::new(),
        });
        payload.sign(&SigningKeypair::generate());
        payload
    }

    fn signed_v2(seed: &str, ts: u64, voucher: Option<AgentId>) -> InvitePayload {
        let keypair = SigningKeypair::generate();
        let mut payload = InvitePayload::V2(InviteV2 {
            network_seed: seed.to_string(),
            hub_identity_key: keypair.agent_id(),
            signal_relay_url: "wss://signal.example".to_string(),
            bootstrap_url: "https://bootstrap.example".to_string(),
            timestamp: Timestamp::from_micros(ts),
            signature: Vec::new(),
            voucher,
        });
        payload.sign(&keypair);
        payload
    }

    #[test]
    fn test_v1_text_layout() {
        let payload = signed_v1("hub.local", "maple-2024", 42);
        let code = serialize(&payload).unwrap();
        assert!(code.starts_with("OURBLOCK_V1:hub.local:maple-2024:42:"));
    }

    #[test]
    fn test_v1_hub_address_with_port_and_ipv6() {
        for address in ["hub.local:8888", "[2001:db8::1]:443", "tcp://10.0.0.2:5000"] {
            let payload = signed_v1(address, "maple-2024", 7);
            let parsed = parse(&serialize(&payload).unwrap()).unwrap();
            assert_eq!(parsed, payload, "address {address}");
        }
    }

    #[test]
    fn test_v1_seed_with_colon_is_unencodable() {
        let payload = signed_v1("hub", "maple:2024", 7);
        assert!(matches!(
            serialize(&payload),
            Err(ParseError::Unencodable { field: "network_seed", .. })
        ));
    }

    #[test]
    fn test_v1_too_few_fields() {
        assert_eq!(
            parse("OURBLOCK_V1:seed:123"),
            Err(ParseError::FieldCount { expected: 4, found: 2 })
        );
    }

    #[test]
    fn test_v1_bad_timestamp_and_signature() {
        assert!(matches!(
            parse("OURBLOCK_V1:hub:seed:yesterday:AAAA"),
            Err(ParseError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse("OURBLOCK_V1:hub:seed:123:!!notbase64!!"),
            Err(ParseError::InvalidBase64 { field: "signature", .. })
        ));
    }

    #[test]
    fn test_unknown_prefix_and_empty() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(
            parse("OURBLOCK_V3:whatever"),
            Err(ParseError::UnknownVersion("OURBLOCK_V3".to_string()))
        );
        assert!(matches!(parse_bytes(&[0xff, 0xfe]), Err(ParseError::UnknownVersion(_))));
    }

    #[test]
    fn test_v2_roundtrip_with_voucher_and_whitespace() {
        let voucher = SigningKeypair::generate().agent_id();
        let payload = signed_v2("maple-2024", 1_000, Some(voucher));
        let code = format!("  {}\n", serialize(&payload).unwrap());

        let parsed = parse(&code).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.voucher(), Some(&voucher));
    }

    #[test]
    fn test_v2_without_voucher_omits_field() {
        let payload = signed_v2("maple-2024", 1_000, None);
        let code = serialize(&payload).unwrap();
        let json = STANDARD.decode(code.strip_prefix(V2_PREFIX).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert!(value.get("voucher").is_none());
        for key in ["network_seed", "hub_identity_key", "signal_relay_url", "bootstrap_url", "timestamp", "signature"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_v2_bad_payloads() {
        assert!(matches!(
            parse("OURBLOCK_V2:%%%"),
            Err(ParseError::InvalidBase64 { field: "payload", .. })
        ));

        let not_json = format!("{}{}", V2_PREFIX, STANDARD.encode(b"{not json"));
        assert!(matches!(parse(&not_json), Err(ParseError::InvalidJson(_))));

        let short_key = serde_json::json!({
            "network_seed": "s",
            "hub_identity_key": STANDARD.encode([1u8; 5]),
            "signal_relay_url": "",
            "bootstrap_url": "",
            "timestamp": 1,
            "signature": "",
        });
        let code = format!("{}{}", V2_PREFIX, STANDARD.encode(short_key.to_string()));
        assert!(matches!(parse(&code), Err(ParseError::InvalidKey { .. })));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let payload = signed_v2("maple-2024", 1_000, None);
        let deadline = expires_at(&payload, DAY);

        assert!(!is_expired(&payload, deadline, DAY));
        assert!(is_expired(&payload, Timestamp::from_micros(deadline.as_micros() + 1), DAY));
    }

    #[test]
    fn test_validate_format_outcomes() {
        let payload = signed_v2("maple-2024", 1_000, None);
        let code = serialize(&payload).unwrap();
        let now = Timestamp::from_micros(2_000);

        assert_eq!(validate_format(&code, now, DAY).unwrap(), payload);

        let late = Timestamp::from_micros(1_000).saturating_add(8 * DAY);
        assert!(matches!(validate_format(&code, late, DAY), Err(FormatError::Expired { .. })));

        assert!(matches!(validate_format("garbage", now, DAY), Err(FormatError::Malformed(_))));

        let empty_seed = serialize(&signed_v2("", 1_000, None)).unwrap();
        assert!(matches!(validate_format(&empty_seed, now, DAY), Err(FormatError::Structure(_))));

        let short_sig = format!("{}hub:seed:1000:{}", V1_PREFIX, STANDARD.encode([0u8; 10]));
        assert!(matches!(validate_format(&short_sig, now, DAY), Err(FormatError::Structure(_))));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint(" abc "));
        assert_eq!(fingerprint("abc").len(), 16);
    }

    proptest! {
        #[test]
        fn prop_v1_roundtrip(
            hub in "[a-z0-9.\\[\\]:]{0,24}",
            seed in "[a-zA-Z0-9_-]{0,24}",
            ts in any::<u64>(),
            sig in proptest::collection::vec(any::<u8>(), 0..80),
        ) {
            let payload = InvitePayload::V1(InviteV1 {
                hub_address: hub,
                network_seed: seed,
                timestamp: Timestamp::from_micros(ts),
                signature: sig,
            });
            prop_assert_eq!(parse(&serialize(&payload).unwrap()).unwrap(), payload);
        }

        #[test]
        fn prop_v2_roundtrip(
            seed in ".{0,24}",
            relay in ".{0,40}",
            bootstrap in ".{0,40}",
            ts in any::<u64>(),
            sig in proptest::collection::vec(any::<u8>(), 0..80),
            with_voucher in any::<bool>(),
        ) {
            let keypair = SigningKeypair::generate();
            let payload = InvitePayload::V2(InviteV2 {
                network_seed: seed,
                hub_identity_key: keypair.agent_id(),
                signal_relay_url: relay,
                bootstrap_url: bootstrap,
                timestamp: Timestamp::from_micros(ts),
                signature: sig,
                voucher: with_voucher.then(|| SigningKeypair::generate().agent_id()),
            });
            prop_assert_eq!(parse(&serialize(&payload).unwrap()).unwrap(), payload);
        }
    }
}
