//! Interactive shell utilities.
//!
//! The utilities present in this module back the `tnt_cli` binary: a [`Command`] parsed
//! from one line of user input, the [`prompt`] reading it, and [`execute`] running it
//! against a [`Client`].
//!
//! # Example
//! ```rust
//! use tarantool_client::cli::Command;
//!
//! let cmd: Command = "select composite 2016 10".parse().unwrap();
//! assert_eq!(cmd.to_string(), "select composite [2016, 10]");
//! ```
use std::{
    fmt,
    io::{self, BufRead, Write},
    str::FromStr,
};

use thiserror::Error;

use crate::{
    client::Client,
    error::Result,
    schema::Criteria,
    value::{Tuple, Value},
};

/// List of possible errors when reading a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,

    #[error("failed to read command: {0}")]
    Io(#[from] io::Error),
}

/// User supplied commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `ping`
    Ping,
    /// `select <space> [key..]`
    Select { space: String, key: Vec<Value> },
    /// `insert <space> value..`
    Insert { space: String, tuple: Tuple },
    /// `delete <space> key..`
    Delete { space: String, key: Vec<Value> },
    /// `.flush`, forget resolved spaces
    Flush,
    /// `.exit`
    Exit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };

        let mut space_and_values = |command: &str| -> Result<(String, Vec<Value>), CommandError> {
            let space = words.next().ok_or_else(|| CommandError::InvalidCommandArguments {
                command: command.into(),
                reason: "missing space name".into(),
            })?;
            Ok((space.to_string(), words.by_ref().map(parse_value).collect()))
        };

        match name {
            "ping" => Ok(Command::Ping),
            ".flush" => Ok(Command::Flush),
            ".exit" => Ok(Command::Exit),
            "select" => {
                let (space, key) = space_and_values(name)?;
                Ok(Command::Select { space, key })
            }
            "insert" | "delete" => {
                let (space, values) = space_and_values(name)?;
                if values.is_empty() {
                    return Err(CommandError::InvalidCommandArguments {
                        command: name.into(),
                        reason: "expected at least one value".into(),
                    });
                }
                Ok(match name {
                    "insert" => Command::Insert { space, tuple: values },
                    _ => Command::Delete { space, key: values },
                })
            }
            other => Err(CommandError::UnrecognizedCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = |values: &[Value]| {
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        match self {
            Command::Ping => f.write_str("ping"),
            Command::Select { space, key } => write!(f, "select {space} [{}]", values(key)),
            Command::Insert { space, tuple } => write!(f, "insert {space} [{}]", values(tuple)),
            Command::Delete { space, key } => write!(f, "delete {space} [{}]", values(key)),
            Command::Flush => f.write_str(".flush"),
            Command::Exit => f.write_str(".exit"),
        }
    }
}

/// Integers when they parse as such, strings otherwise.
pub fn parse_value(word: &str) -> Value {
    if let Ok(n) = word.parse::<u64>() {
        Value::from(n)
    } else if let Ok(n) = word.parse::<i64>() {
        Value::from(n)
    } else {
        Value::from(word)
    }
}

/// Prompt user for a command.
///
/// End of input is read as [`Command::Exit`].
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }
    s.parse()
}

/// Runs `command` and returns what should be printed.
pub fn execute(client: &Client, command: &Command) -> Result<Option<String>> {
    let rows = match command {
        Command::Ping => {
            client.ping()?;
            return Ok(Some("pong".into()));
        }
        Command::Flush => {
            client.flush_spaces();
            return Ok(None);
        }
        Command::Exit => {
            client.connection().close();
            return Ok(None);
        }
        Command::Select { space, key } => client
            .space(space)?
            .select(Criteria::key(key.clone()))?,
        Command::Insert { space, tuple } => client.space(space)?.insert(tuple.clone())?,
        Command::Delete { space, key } => client.space(space)?.delete(key.clone())?,
    };

    Ok(Some(
        rows.iter()
            .map(|row| Value::Array(row.clone()).to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    ))
}
