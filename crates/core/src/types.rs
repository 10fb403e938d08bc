/// Rundown identifiers are supplied by the ingest source and kept opaque.
pub type RundownId = String;

pub type SegmentId = String;

pub type PartId = String;

pub type PieceId = String;

/// Playout layer (device channel) a piece is routed to.
pub type LayerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Durations in milliseconds. Signed, because intermediate timing values
/// may go negative before they are clamped.
pub type Millis = i64;

/// Id suffix carried by entities that have diverged from ingest truth.
pub const UNSYNCED_ID_SUFFIX: &str = "_unsynced";

/// Whether an id carries the unsynced suffix.
pub fn is_unsynced_id(id: &str) -> bool {
    id.ends_with(UNSYNCED_ID_SUFFIX)
}

/// Append the unsynced suffix to an id. Idempotent.
pub fn unsynced_id(id: &str) -> String {
    if is_unsynced_id(id) {
        id.to_string()
    } else {
        format!("{id}{UNSYNCED_ID_SUFFIX}")
    }
}

/// Milliseconds elapsed between two instants, clamped at zero.
pub fn millis_between(from: Timestamp, to: Timestamp) -> Millis {
    (to - from).num_milliseconds().max(0)
}
