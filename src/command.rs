//! Commands that reach the core from outside.
//!
//! The full command language lives elsewhere; only the pieces the core needs
//! are here: the commands `on_window_detected` callbacks may run, and the
//! close operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::actor::app::Cancelled;
use crate::actor::session::Session;
use crate::common::util::split_words;
use crate::model::tree::{ParentKind, Position, Weight};

/// A command allowed in the `run` list of a window-detected callback.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum DetectedCommand {
    LayoutFloating,
    LayoutTiling,
    MoveNodeToWorkspace(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown command '{0}'")]
pub struct ParseCommandError(String);

impl FromStr for DetectedCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = split_words(s);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["layout", "floating"] => Ok(DetectedCommand::LayoutFloating),
            ["layout", "tiling"] => Ok(DetectedCommand::LayoutTiling),
            ["move-node-to-workspace", name] => {
                Ok(DetectedCommand::MoveNodeToWorkspace((*name).to_owned()))
            }
            _ => Err(ParseCommandError(s.trim().to_owned())),
        }
    }
}

impl TryFrom<String> for DetectedCommand {
    type Error = ParseCommandError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl fmt::Display for DetectedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectedCommand::LayoutFloating => f.write_str("layout floating"),
            DetectedCommand::LayoutTiling => f.write_str("layout tiling"),
            DetectedCommand::MoveNodeToWorkspace(name) if name.contains(char::is_whitespace) => {
                write!(f, "move-node-to-workspace '{name}'")
            }
            DetectedCommand::MoveNodeToWorkspace(name) => write!(f, "move-node-to-workspace {name}"),
        }
    }
}

impl From<DetectedCommand> for String {
    fn from(cmd: DetectedCommand) -> String { cmd.to_string() }
}

/// Failures reported to whoever issued a command. The tree is left as it was.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty workspace")]
    EmptyWorkspace,
    #[error("Failed to quit '{0}'")]
    QuitFailed(String),
    #[error("Can't close '{0}' window. Probably the window doesn't have a close button")]
    CloseFailed(String),
}

impl DetectedCommand {
    /// Applies the command to a freshly registered window.
    pub(crate) fn apply(&self, session: &mut Session, window: crate::sys::ax::WindowId) {
        let world = &mut session.world;
        let Some(node) = world.window_node(window) else { return };
        let Some(ws) = world.tree.workspace_of(node) else { return };
        let result = match self {
            DetectedCommand::LayoutFloating => {
                if world.tree.parent_kind(node) == Some(ParentKind::Workspace) {
                    return;
                }
                world.move_window(window, ws, Weight::Auto, Position::Last)
            }
            DetectedCommand::LayoutTiling => {
                if world.tree.parent_kind(node) == Some(ParentKind::Tiling) {
                    return;
                }
                let (parent, position) = world.tiling_binding(ws);
                world.move_window(window, parent, Weight::Auto, position)
            }
            DetectedCommand::MoveNodeToWorkspace(name) => {
                let target = world.ensure_workspace(name);
                let (parent, position) = match world.tree.parent_kind(node) {
                    Some(ParentKind::Tiling) => world.tiling_binding(target),
                    _ => (target, Position::Last),
                };
                world.move_window(window, parent, Weight::Auto, position)
            }
        };
        if let Err(err) = result {
            debug!(%window, command = %self, ?err, "detected command had no effect");
        }
    }
}

/// Closes the focused window, or quits its app when `quit_if_last_window` is
/// set and the app owns no other window.
///
/// The outer `Err` means the session was cancelled part way; nothing is
/// reported to the user then.
#[instrument(skip(session))]
pub async fn close_window(
    session: &mut Session,
    quit_if_last_window: bool,
) -> Result<Result<(), CommandError>, Cancelled> {
    let Some(window) = session.world.focus().window else {
        return Ok(Err(CommandError::EmptyWorkspace));
    };
    let Some(app) = session.apps.get(window.pid) else {
        return Ok(Err(CommandError::EmptyWorkspace));
    };
    let name = app.info().display_name().to_owned();

    if quit_if_last_window && app.window_count(&session.token).await? == Some(1) {
        return Ok(if session.server.terminate(window.pid) {
            session.forget_window(window);
            Ok(())
        } else {
            Err(CommandError::QuitFailed(name))
        });
    }

    match app.close_window(window, &session.token).await? {
        Some(true) => {
            // The destroyed notification may never come if the app hides the
            // window instead. Forget it now.
            session.forget_window(window);
            Ok(Ok(()))
        }
        Some(false) | None => Ok(Err(CommandError::CloseFailed(name))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_detected_commands() {
        assert_eq!("layout floating".parse(), Ok(DetectedCommand::LayoutFloating));
        assert_eq!("  layout   tiling ".parse(), Ok(DetectedCommand::LayoutTiling));
        assert_eq!(
            "move-node-to-workspace \"my space\"".parse(),
            Ok(DetectedCommand::MoveNodeToWorkspace("my space".into()))
        );
        assert_eq!(
            "layout sideways".parse::<DetectedCommand>(),
            Err(ParseCommandError("layout sideways".into()))
        );
        assert!("move-node-to-workspace".parse::<DetectedCommand>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for cmd in [
            DetectedCommand::LayoutFloating,
            DetectedCommand::MoveNodeToWorkspace("my space".into()),
        ] {
            assert_eq!(cmd.to_string().parse(), Ok(cmd));
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(CommandError::EmptyWorkspace.to_string(), "Empty workspace");
        assert_eq!(CommandError::QuitFailed("Notes".into()).to_string(), "Failed to quit 'Notes'");
        assert_eq!(
            CommandError::CloseFailed("Notes".into()).to_string(),
            "Can't close 'Notes' window. Probably the window doesn't have a close button"
        );
    }
}
