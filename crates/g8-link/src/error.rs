use crate::protocol::CommandKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Module was already initialized")]
    AlreadyInitialized,

    #[error("Failed to fetch module: {0}")]
    ModuleFetch(String),

    #[error("Failed to instantiate module: {0}")]
    ModuleInstantiate(String),

    #[error("Module entry point failed: {0}")]
    ModuleEntry(String),

    #[error("No entry point registered for '{0}'")]
    MissingEntryPoint(CommandKind),

    #[error("Message channel closed")]
    ChannelClosed,

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown speed preset: {0}")]
    UnknownSpeed(String),
}
