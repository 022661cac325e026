use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Messages sent from the hosting page into the sandboxed emulator context.
///
/// The wire shape is an object tagged on `type`, e.g.
/// `{"type": "setFrequency", "value": 540}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "loadRom")]
    LoadBinary { data: Vec<u8> },

    #[serde(rename = "reset")]
    Reset,

    #[serde(rename = "togglePause")]
    TogglePause,

    #[serde(rename = "setFrequency")]
    SetFrequency { value: NonZeroU32 },
}

/// Notifications sent from the sandboxed context back to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signal {
    #[serde(rename = "ready")]
    Ready,

    #[serde(rename = "canvas-focus")]
    FocusAcquired,

    #[serde(rename = "canvas-blur")]
    FocusLost,
}

/// Payload-free discriminator of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    LoadBinary,
    Reset,
    TogglePause,
    SetFrequency,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::LoadBinary,
        CommandKind::Reset,
        CommandKind::TogglePause,
        CommandKind::SetFrequency,
    ];

    /// The `type` discriminator used on the wire
    pub fn wire_name(self) -> &'static str {
        match self {
            CommandKind::LoadBinary => "loadRom",
            CommandKind::Reset => "reset",
            CommandKind::TogglePause => "togglePause",
            CommandKind::SetFrequency => "setFrequency",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<CommandKind> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::LoadBinary { .. } => CommandKind::LoadBinary,
            Command::Reset => CommandKind::Reset,
            Command::TogglePause => CommandKind::TogglePause,
            Command::SetFrequency { .. } => CommandKind::SetFrequency,
        }
    }

    /// Decodes a wire message. Unknown discriminators and malformed payloads yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Command> {
        Command::deserialize(value).ok()
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain enum of owned data, serialization cannot fail
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Signal {
    pub fn wire_name(self) -> &'static str {
        match self {
            Signal::Ready => "ready",
            Signal::FocusAcquired => "canvas-focus",
            Signal::FocusLost => "canvas-blur",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Signal> {
        [Signal::Ready, Signal::FocusAcquired, Signal::FocusLost]
            .into_iter()
            .find(|signal| signal.wire_name() == name)
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Signal> {
        Signal::deserialize(value).ok()
    }

    pub fn to_json(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedPreset;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        assert_eq!(
            Command::LoadBinary { data: vec![0x00, 0xE0] }.to_json(),
            json!({"type": "loadRom", "data": [0, 224]})
        );
        assert_eq!(Command::Reset.to_json(), json!({"type": "reset"}));
        assert_eq!(Command::TogglePause.to_json(), json!({"type": "togglePause"}));
        assert_eq!(
            Command::SetFrequency {
                value: SpeedPreset::Fast.frequency()
            }
            .to_json(),
            json!({"type": "setFrequency", "value": 1000})
        );
    }

    #[test]
    fn test_signal_wire_shape() {
        assert_eq!(Signal::Ready.to_json(), json!({"type": "ready"}));
        assert_eq!(Signal::FocusAcquired.to_json(), json!({"type": "canvas-focus"}));
        assert_eq!(Signal::FocusLost.to_json(), json!({"type": "canvas-blur"}));
    }

    #[test]
    fn test_decode_known_commands() {
        let rom = Command::from_json(&json!({"type": "loadRom", "data": [0, 224, 162, 42]}));
        assert_eq!(
            rom,
            Some(Command::LoadBinary {
                data: vec![0x00, 0xE0, 0xA2, 0x2A]
            })
        );

        let speed = Command::from_json(&json!({"type": "setFrequency", "value": 250}));
        assert_eq!(
            speed,
            Some(Command::SetFrequency {
                value: SpeedPreset::Slow.frequency()
            })
        );
    }

    #[test]
    fn test_unknown_or_malformed_messages_are_ignored() {
        assert_eq!(Command::from_json(&json!({"type": "selfDestruct"})), None);
        assert_eq!(Command::from_json(&json!({"kind": "reset"})), None);
        assert_eq!(Command::from_json(&json!("reset")), None);
        assert_eq!(Command::from_json(&json!({"type": "setFrequency", "value": -3})), None);
        assert_eq!(Command::from_json(&json!({"type": "setFrequency", "value": 0})), None);
        assert_eq!(Command::from_json(&json!({"type": "loadRom"})), None);

        assert_eq!(Signal::from_json(&json!({"type": "canvas-hover"})), None);
        // Signals are never decoded as commands and vice versa
        assert_eq!(Command::from_json(&json!({"type": "ready"})), None);
        assert_eq!(Signal::from_json(&json!({"type": "reset"})), None);
    }

    #[test]
    fn test_wire_names_agree_with_serde() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_wire_name(kind.wire_name()), Some(kind));
        }
        let reset = Command::Reset.to_json();
        assert_eq!(reset["type"], CommandKind::Reset.wire_name());

        for signal in [Signal::Ready, Signal::FocusAcquired, Signal::FocusLost] {
            assert_eq!(signal.to_json()["type"], signal.wire_name());
            assert_eq!(Signal::from_wire_name(signal.wire_name()), Some(signal));
        }
    }
}
