//! Client-side reconciliation of history pages, optimistic sends and realtime pushes.
//!
//! Shared by the web frontend and the CLI `watch` command.

pub mod cache;
pub mod retry;
pub mod scroll;
pub mod session;

pub use cache::{CachedMessage, DeliveryStatus, MessageCache};
pub use retry::{FetchError, RetryPolicy, with_retry};
pub use scroll::{ScrollAdjustment, ScrollSnapshot, adjustment_for, anchored_scroll_top};
pub use session::{Change, ChatAction, ChatState, LoadPhase, PageKind, PageRequest};
