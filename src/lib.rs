//! State machine for a shared, persistent pixel canvas.
//!
//! Participants pay a per-pixel fee to color cells of a `size x size` grid.
//! The crate keeps the authoritative canvas state and enforces its
//! invariants: coordinate bounds, `#RRGGBB` color format, batch-size and fee
//! rules, exact-once registration of painted coordinates in the first-paint
//! index, and owner-gated fee withdrawal. Two modules carry everything:
//!
//! * [`canvas`]: the ledger state machine with its paint commands, queries,
//!   and digest-checked snapshots for persistence.
//! * [`host`]: the types the hosting environment supplies per call (caller
//!   identity, timestamp, payment action) and the paint event channel.
//!
//! The host invokes one command at a time against an exclusively owned
//! [`canvas::CanvasState`]; a failed command leaves prior state untouched
//! and emits no events.

pub mod canvas;
pub mod host;

pub use canvas::{
    CanvasError, CanvasSnapshot, CanvasState, CanvasStats, Cell, Coord, PaintedPixel,
    SnapshotCell, SnapshotError, MAX_BATCH_SIZE, MAX_PIXELS_PAGE_SIZE,
};
pub use host::{CallContext, CanvasEvent, EventSink, NullSink, RecordingSink, TokenAction};
