// Geiger MQTT: Aggregation Results & Main-Loop Events

/// Sentinel for a minimum that has not been established yet.
pub const MIN_UNSET: u16 = u16::MAX;

// ---------------------------------------------------------------------------
// Snapshot: the {current, min, max} triple produced once per tick
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Rolling 60-second total.
    pub current: u16,
    /// Lowest full-window total seen since boot, or [`MIN_UNSET`].
    pub min: u16,
    /// Highest total seen since boot.
    pub max: u16,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            current: 0,
            min: MIN_UNSET,
            max: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tick: everything one aggregation step hands downstream
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Goes to the presentation sink.
    pub snapshot: Snapshot,
    /// Index of the slot that just stopped accumulating.
    pub vacated_slot: usize,
    /// Raw count of the vacated 10-second slot.  Goes to telemetry; this is
    /// not the rolling total.
    pub interval_count: u16,
}

// ---------------------------------------------------------------------------
// Main-loop events
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Nothing for the caller to do beyond polling again.
    Continue,
    /// A long press was consumed; run the configuration portal.
    EnterConfig,
}
