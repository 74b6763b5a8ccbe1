// MoBoggle player event protocol
// One tagged frame per player action, written by the listener proxy and read by the remote player

use std::fmt;
use std::io::{Read, Write};

use super::error::ProtocolError;
use super::wire::{DataInput, DataOutput};

/// Tag bytes. These values are shared by every build of both endpoints.
pub const TAG_MOVE: u8 = 0;
pub const TAG_UNDO: u8 = 1;
pub const TAG_TURN: u8 = 2;
pub const TAG_MESSAGE: u8 = 3;
pub const TAG_EXIT: u8 = 4;

/// Why a player left the game, seen from the device that reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    LocalQuit,
    RemoteQuit,
    LocalGiveUp,
    RemoteGiveUp,
}

impl ExitReason {
    pub fn code(self) -> i32 {
        match self {
            ExitReason::LocalQuit => 0,
            ExitReason::RemoteQuit => 1,
            ExitReason::LocalGiveUp => 2,
            ExitReason::RemoteGiveUp => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitReason::LocalQuit),
            1 => Some(ExitReason::RemoteQuit),
            2 => Some(ExitReason::LocalGiveUp),
            3 => Some(ExitReason::RemoteGiveUp),
            _ => None,
        }
    }

    /// The same reason as the other device sees it.
    pub fn swapped(self) -> Self {
        match self {
            ExitReason::LocalQuit => ExitReason::RemoteQuit,
            ExitReason::RemoteQuit => ExitReason::LocalQuit,
            ExitReason::LocalGiveUp => ExitReason::RemoteGiveUp,
            ExitReason::RemoteGiveUp => ExitReason::LocalGiveUp,
        }
    }
}

/// Something a player did. Every event carries the acting player's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    MoveMade { id: i32, move_index: i32 },
    UndoPerformed { id: i32 },
    TurnCommit { id: i32 },
    MessageSent { id: i32, text: String },
    GameExited { id: i32, reason: ExitReason },
}

impl PlayerEvent {
    pub fn player_id(&self) -> i32 {
        match self {
            PlayerEvent::MoveMade { id, .. }
            | PlayerEvent::UndoPerformed { id }
            | PlayerEvent::TurnCommit { id }
            | PlayerEvent::MessageSent { id, .. }
            | PlayerEvent::GameExited { id, .. } => *id,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            PlayerEvent::MoveMade { .. } => TAG_MOVE,
            PlayerEvent::UndoPerformed { .. } => TAG_UNDO,
            PlayerEvent::TurnCommit { .. } => TAG_TURN,
            PlayerEvent::MessageSent { .. } => TAG_MESSAGE,
            PlayerEvent::GameExited { .. } => TAG_EXIT,
        }
    }

    /// Rewrites exit reasons so the receiving device reads them from its own side.
    pub fn for_remote(self) -> Self {
        match self {
            PlayerEvent::GameExited { id, reason } => PlayerEvent::GameExited {
                id,
                reason: reason.swapped(),
            },
            other => other,
        }
    }
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::MoveMade { id, move_index } => write!(f, "move({id}, {move_index})"),
            PlayerEvent::UndoPerformed { id } => write!(f, "undo({id})"),
            PlayerEvent::TurnCommit { id } => write!(f, "turn({id})"),
            PlayerEvent::MessageSent { id, text } => write!(f, "message({id}, {} chars)", text.len()),
            PlayerEvent::GameExited { id, reason } => write!(f, "exit({id}, {reason:?})"),
        }
    }
}

/// Writes one event exactly as given and flushes, so every event is delivered on its own.
pub fn write_event<W: Write + ?Sized>(out: &mut W, event: &PlayerEvent) -> Result<(), ProtocolError> {
    out.write_byte(event.tag())?;
    out.write_int(event.player_id())?;
    match event {
        PlayerEvent::MoveMade { move_index, .. } => out.write_int(*move_index)?,
        PlayerEvent::UndoPerformed { .. } | PlayerEvent::TurnCommit { .. } => {}
        PlayerEvent::MessageSent { text, .. } => out.write_utf(text)?,
        PlayerEvent::GameExited { reason, .. } => out.write_int(reason.code())?,
    }
    out.flush()?;
    Ok(())
}

/// Reads one event. Unknown tags and exit codes are fatal decode errors.
pub fn read_event<R: Read + ?Sized>(input: &mut R) -> Result<PlayerEvent, ProtocolError> {
    let tag = input.read_byte()?;
    let id = input.read_int()?;
    let event = match tag {
        TAG_MOVE => PlayerEvent::MoveMade {
            id,
            move_index: input.read_int()?,
        },
        TAG_UNDO => PlayerEvent::UndoPerformed { id },
        TAG_TURN => PlayerEvent::TurnCommit { id },
        TAG_MESSAGE => PlayerEvent::MessageSent {
            id,
            text: input.read_utf()?,
        },
        TAG_EXIT => {
            let code = input.read_int()?;
            let reason = ExitReason::from_code(code).ok_or(ProtocolError::UnknownExitReason(code))?;
            PlayerEvent::GameExited { id, reason }
        }
        other => return Err(ProtocolError::UnknownTag(other)),
    };
    Ok(event)
}
