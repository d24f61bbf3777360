//! Line commands of the CLI client.

use crate::error::ClientError;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: append as a new line of the buffer
    Append(String),
    /// `:set <text>`: replace the whole buffer
    Set(String),
    /// `:show`
    Show,
    /// `:users`
    Users,
    /// `:leave`: leave the room and exit
    Leave,
    /// `:quit`: disconnect and exit
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Self::Append(line.to_string()));
        };

        let (name, argument) = match rest.split_once(' ') {
            Some((name, argument)) => (name, argument),
            None => (rest, ""),
        };
        match name {
            "set" => Ok(Self::Set(argument.to_string())),
            "show" => Ok(Self::Show),
            "users" => Ok(Self::Users),
            "leave" => Ok(Self::Leave),
            "quit" | "q" => Ok(Self::Quit),
            other => Err(ClientError::UnknownCommand(other.to_string())),
        }
    }
}
