use std::time::{SystemTime, UNIX_EPOCH};

/// Generates a 24 hex-digit identifier: 4 bytes of big-endian unix seconds followed by 8 random bytes.
///
/// Ids created later sort after earlier ones (to one second resolution), which keeps them friendly to index scans.
pub fn new_object_id() -> String {
    #[allow(clippy::cast_possible_truncation)]
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or_default();
    let tail = rand::random::<[u8; 8]>();
    let mut id = format!("{secs:08x}");
    tail.iter().for_each(|b| id.push_str(&format!("{b:02x}")));
    id
}

pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
