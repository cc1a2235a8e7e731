//! Magnet URI canonicalization.
//!
//! Every candidate link is reduced to `magnet:?xt=urn:btih:<40 lowercase hex>`
//! before it is persisted or compared. Display names and trackers are dropped:
//! the info hash is the identity of a torrent.

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_PREFIX: &str = "xt=urn:btih:";

/// Returns true if the input can be canonicalized.
pub fn is_magnet_like(input: &str) -> bool {
    normalize_magnet(input).is_some()
}

/// Canonicalize a magnet URI or bare info hash.
///
/// Accepts a 40-character hex hash, a 32-character base32 hash, or a magnet
/// URI carrying either form in its `xt=urn:btih:` parameter.
pub fn normalize_magnet(input: &str) -> Option<String> {
    extract_info_hash(input).map(|hash| canonical_magnet(&hash))
}

/// Build the canonical magnet URI for an already-validated hex hash.
pub fn canonical_magnet(hash: &str) -> String {
    format!("{}{}{}", MAGNET_PREFIX, BTIH_PREFIX, hash.to_lowercase())
}

/// Extract the lowercase hex info hash from a magnet URI or bare hash.
pub fn extract_info_hash(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(hash) = parse_bare_hash(trimmed) {
        return Some(hash);
    }

    let lower = trimmed.to_ascii_lowercase();
    if !lower.starts_with(MAGNET_PREFIX) {
        return None;
    }

    trimmed[MAGNET_PREFIX.len()..]
        .split('&')
        .find_map(|param| {
            let lower_param = param.to_ascii_lowercase();
            lower_param
                .strip_prefix(BTIH_PREFIX)
                .map(|_| param[BTIH_PREFIX.len()..].to_string())
        })
        .and_then(|value| parse_bare_hash(&value))
}

fn parse_bare_hash(value: &str) -> Option<String> {
    if value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(value.to_ascii_lowercase());
    }
    if value.len() == 32 {
        return base32_to_hex(value);
    }
    None
}

/// Decode an RFC 4648 base32 info hash (32 chars, 160 bits) into hex.
fn base32_to_hex(value: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut bytes = Vec::with_capacity(20);

    for c in value.chars() {
        let v = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = ((bits << 5) | v) & 0xffff;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            bytes.push(((bits >> bit_count) & 0xff) as u8);
        }
    }

    if bytes.len() != 20 {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}
