use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static SEQ: AtomicU32 = AtomicU32::new(0);

/// A lexicographically sortable batch identifier: wall-clock millis, a
/// per-process sequence number, and a few bits of entropy to keep ids
/// generated within the same millisecond from colliding. Used only for
/// log correlation; never interpreted by the router.
pub fn next_batch_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let entropy: u16 = rand::random();
    format!("{millis:012x}{seq:08x}{entropy:04x}")
}
