//! Framework-independent interaction controllers: press-and-hold dragging
//! and fetch-once-per-identity overlay syncing.

pub mod drag;
pub mod sync;

pub use drag::{DragController, HitTarget, Point, PointerCapture};
pub use sync::{
    run_reload, EntitySource, EntitySyncController, ReloadCompletion, SyncError, SyncOutcome,
    SyncTicket,
};
