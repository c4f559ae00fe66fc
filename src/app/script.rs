//! Key scripts
//!
//! A script is a line-oriented list of key events and pauses that the CLI
//! replays through an [`InputController`]:
//!
//! ```text
//! # open the grid, pick the middle cell twice
//! hold star 400
//! press 5
//! wait 300
//! press 5
//! ```
//!
//! Commands are `down KEY`, `up KEY`, `press KEY`, `hold KEY MS` and
//! `wait MS`. Key names are those of [`Key::from_name`]. Blank lines and
//! lines starting with `#` are ignored.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::app::controller::InputController;
use crate::domain::keyboard::{Key, KeyEvent, KeyboardError};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: {source}")]
    BadKey {
        line: usize,
        #[source]
        source: KeyboardError,
    },

    #[error("line {line}: expected milliseconds, got '{value}'")]
    BadDuration { line: usize, value: String },

    #[error("line {line}: '{command}' is missing an argument")]
    MissingArgument { line: usize, command: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Down(Key),
    Up(Key),
    /// Down immediately followed by up
    Press(Key),
    Hold(Key, Duration),
    Wait(Duration),
}

/// Counts reported after a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub consumed: usize,
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let mut words = text.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let mut argument = || {
            words.next().ok_or_else(|| ScriptError::MissingArgument {
                line,
                command: command.clone(),
            })
        };
        let key = |name: &str| Key::from_name(name).map_err(|source| ScriptError::BadKey { line, source });
        let millis = |value: &str| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ScriptError::BadDuration {
                    line,
                    value: value.to_string(),
                })
        };

        let step = match command.as_str() {
            "down" => ScriptStep::Down(key(argument()?)?),
            "up" => ScriptStep::Up(key(argument()?)?),
            "press" => ScriptStep::Press(key(argument()?)?),
            "hold" => {
                let held = key(argument()?)?;
                ScriptStep::Hold(held, millis(argument()?)?)
            }
            "wait" => ScriptStep::Wait(millis(argument()?)?),
            _ => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: command.clone(),
                });
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

fn send(controller: &InputController, event: KeyEvent, summary: &mut ReplaySummary) {
    let consumed = controller.handle_key_event(event);
    summary.events += 1;
    if consumed {
        summary.consumed += 1;
    }
    info!(key = ?event.key(), down = event.is_down(), consumed, "key event");
}

/// Feeds `steps` to `controller` in real (or paused test) time
pub async fn replay(controller: &InputController, steps: &[ScriptStep]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for step in steps {
        match *step {
            ScriptStep::Down(key) => send(controller, KeyEvent::down(key.vk_code()), &mut summary),
            ScriptStep::Up(key) => send(controller, KeyEvent::up(key.vk_code()), &mut summary),
            ScriptStep::Press(key) => {
                send(controller, KeyEvent::down(key.vk_code()), &mut summary);
                send(controller, KeyEvent::up(key.vk_code()), &mut summary);
            }
            ScriptStep::Hold(key, held) => {
                send(controller, KeyEvent::down(key.vk_code()), &mut summary);
                tokio::time::sleep(held).await;
                send(controller, KeyEvent::up(key.vk_code()), &mut summary);
            }
            ScriptStep::Wait(pause) => tokio::time::sleep(pause).await,
        }
        // Let spawned timers and gestures observe the event
        tokio::task::yield_now().await;
    }
    summary
}
