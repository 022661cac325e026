//! Convenient imports for consumers of g8-link
//!
//! ```rust
//! use g8_link::prelude::*;
//! ```

pub use crate::bridge::{Dispatch, EmbedBridge};
pub use crate::channel::{ChannelOutbox, ContextId, Envelope, Outbox, link};
pub use crate::config::{BridgeConfig, FocusPollConfig, SpeedPreset};
pub use crate::entry_points::{EntryPoints, SharedEntryPoints};
pub use crate::error::BridgeError;
pub use crate::focus::{FocusRelay, FocusSurface, PointerAction, PollOutcome, SurfaceLocator};
pub use crate::host::{
    DropReason, FocusState, HostChange, HostController, Intent, LoadTicket, ReadinessState,
    Submission,
};
pub use crate::loader::{EmulationModule, LoaderState, ModuleLoader};
pub use crate::protocol::{Command, CommandKind, Signal};
