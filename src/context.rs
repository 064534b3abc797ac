//! Context windowing and turn-to-message translation.

use std::num::NonZeroUsize;

use tracing::debug;

use crate::command::{is_command, CommandHandler};
use crate::types::{Message, Role, Turn};

/// The most recent `max_length` turns, in their original order.
pub fn window(turns: &[Turn], max_length: NonZeroUsize) -> &[Turn] {
    let start = turns.len().saturating_sub(max_length.get());
    &turns[start..]
}

/// Translate windowed turns into model messages.
///
/// User turns that are commands and assistant turns that repeat a command
/// sentinel are dropped, as are turns with an unrecognized role. Order is
/// preserved.
pub fn translate(turns: &[Turn], commands: &CommandHandler) -> Vec<Message> {
    turns
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User if !is_command(&turn.content) => Some(Message::user(&turn.content)),
            Role::System => Some(Message::system(&turn.content)),
            Role::Assistant if !commands.is_sentinel(&turn.content) => {
                Some(Message::assistant(&turn.content))
            }
            Role::Unknown => {
                debug!("dropping turn with unrecognized role");
                None
            }
            _ => None,
        })
        .collect()
}

/// Window then translate: the model context for one request.
pub fn build_context(
    turns: &[Turn],
    max_length: NonZeroUsize,
    commands: &CommandHandler,
) -> Vec<Message> {
    translate(window(turns, max_length), commands)
}
