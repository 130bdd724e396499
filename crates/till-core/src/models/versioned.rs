//! Versioned record abstraction

/// An entity whose writes are ordered by a per-id monotonic version.
///
/// Last writer wins: a stored row only ever moves to a strictly higher
/// version, so replaying an older or equal write is a no-op.
pub trait Versioned {
    /// Entity label used in errors and logs.
    const ENTITY: &'static str;

    fn id(&self) -> &str;

    fn version(&self) -> i64;

    /// Fill defaults for fields a device may omit (version 0, unset
    /// timestamps).
    fn normalize(&mut self, now_ms: i64);

    /// Stamp the time of an accepted update.
    fn touch(&mut self, now_ms: i64);
}
