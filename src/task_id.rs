use serde_json::Value;
use ulid::Ulid;

use crate::timestamp;

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Derives a stable id from record content: the time component comes from
/// `created_utc`, the randomness component from an FNV-1a hash of the
/// record's compact JSON rendering with any `id`/`ulid` keys removed.
pub fn derive_id(content: &Value, created_utc: &str) -> String {
    let mut scrubbed = content.clone();
    if let Value::Object(fields) = &mut scrubbed {
        fields.remove("id");
        fields.remove("ulid");
    }
    let canonical =
        serde_json::to_string(&scrubbed).expect("JSON value serialization should never fail");
    id_from_seed(canonical.as_bytes(), created_utc)
}

pub fn id_from_seed(seed: &[u8], created_utc: &str) -> String {
    let ms = timestamp::unix_ms(created_utc);
    render(Ulid::from_parts(ms, u128::from(fnv1a(seed))))
}

pub fn fresh_id() -> String {
    render(Ulid::new())
}

/// Replaces the time component of `id`, keeping its randomness component.
/// Ids that do not decode are passed through lowercased.
pub fn set_time(id: &str, at_utc: &str) -> String {
    match Ulid::from_string(id) {
        Ok(parsed) => render(Ulid::from_parts(timestamp::unix_ms(at_utc), parsed.random())),
        Err(_) => id.to_ascii_lowercase(),
    }
}

pub fn has_placeholder_time(id: &str) -> bool {
    Ulid::from_string(id).is_ok_and(|parsed| parsed.timestamp_ms() == 0)
}

fn render(id: Ulid) -> String {
    id.to_string().to_ascii_lowercase()
}
