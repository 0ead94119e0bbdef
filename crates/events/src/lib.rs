//! Explorer event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ExplorerEvent`]: timestamped envelope around an [`EventKind`].
//! - [`SelectionChanged`]: the catalog's selection notification, also
//!   delivered synchronously to the derived-query fan-out.

pub mod bus;

pub use bus::{EventBus, EventKind, ExplorerEvent, SelectionChanged, SlotOutcome};
