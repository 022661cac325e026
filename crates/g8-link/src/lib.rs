//! Control-plane link between a hosting page and the sandboxed context that
//! runs the compiled emulator.
//!
//! The host side ([`host::HostController`]) gates every command on a single
//! readiness handshake. The embedded side boots the module
//! ([`loader::ModuleLoader`]), forwards commands to whatever entry points it
//! registered ([`bridge::EmbedBridge`]) and reports focus changes of the
//! rendering surface ([`focus::FocusRelay`]).

pub mod bridge;
pub mod channel;
pub mod config;
pub mod entry_points;
pub mod error;
pub mod focus;
pub mod host;
pub mod loader;
pub mod prelude;
pub mod protocol;

#[cfg(test)]
mod test_support;

// Re-exports
pub use error::BridgeError;
pub use protocol::{Command, CommandKind, Signal};
