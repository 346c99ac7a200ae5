//! Console command grammar.
//!
//! Operators type one command per line:
//!
//! ```text
//! help                          list registered objects
//! help telemetry                items and commands of one object
//! telemetry.status.mode         get an item
//! telemetry.status.mode = 3     set an item
//! telemetry serialize           run a command
//! command parse "AA 02 07 0C"   run a command with a quoted parameter
//! ```
//!
//! # Tokens (for beginners)
//!
//! A line is split on whitespace.  A double-quoted section is a single token
//! even if it contains spaces, and an unquoted `=` is always a token of its
//! own so `a.b=3` and `a.b = 3` mean the same thing.  Parameters are kept as
//! raw strings; each command decides how to interpret them.

use icd_core::Param;
use thiserror::Error;

/// Reason a line could not be understood.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("missing command for object '{0}'; try 'help {0}'")]
    MissingCommand(String),

    #[error("missing item name after '{0}.'")]
    MissingItem(String),

    #[error("'{0}' is not a number")]
    InvalidValue(String),

    #[error("expected '<object>.<item> = <value>'")]
    MalformedAssignment,
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// `help` or `help <object>`.
    Help { object: Option<String> },
    /// `<object>.<item>`.
    Get { object: String, item: String },
    /// `<object>.<item> = <value>`.
    Set {
        object: String,
        item: String,
        value: f64,
    },
    /// `<object> <command> [params...]`.
    Exec {
        object: String,
        command: String,
        params: Vec<Param>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Equals,
}

impl Token {
    fn into_text(self) -> String {
        match self {
            Token::Word(word) => word,
            Token::Equals => "=".to_string(),
        }
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(CommandError::UnterminatedQuote),
                    }
                }
            }
            '=' => {
                if in_word {
                    tokens.push(Token::Word(std::mem::take(&mut current)));
                    in_word = false;
                }
                tokens.push(Token::Equals);
            }
            c if c.is_whitespace() => {
                if in_word {
                    tokens.push(Token::Word(std::mem::take(&mut current)));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        tokens.push(Token::Word(current));
    }
    Ok(tokens)
}

/// Parses one trimmed console line.
///
/// # Errors
///
/// Returns a [`CommandError`] describing the first problem found; the
/// registry turns it into an `ERROR` result for the operator.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, CommandError> {
    let mut tokens = tokenize(line)?.into_iter();

    let head = match tokens.next() {
        Some(Token::Word(word)) => word,
        Some(Token::Equals) => return Err(CommandError::MalformedAssignment),
        None => return Err(CommandError::Empty),
    };
    let rest: Vec<Token> = tokens.collect();

    if head == "help" {
        let object = rest.into_iter().next().map(Token::into_text);
        return Ok(ConsoleCommand::Help { object });
    }

    if let Some((object, item)) = head.split_once('.') {
        if item.is_empty() {
            return Err(CommandError::MissingItem(object.to_string()));
        }
        return match rest.as_slice() {
            [] => Ok(ConsoleCommand::Get {
                object: object.to_string(),
                item: item.to_string(),
            }),
            [Token::Equals, Token::Word(value)] => {
                let value = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| CommandError::InvalidValue(value.clone()))?;
                Ok(ConsoleCommand::Set {
                    object: object.to_string(),
                    item: item.to_string(),
                    value,
                })
            }
            _ => Err(CommandError::MalformedAssignment),
        };
    }

    let mut rest = rest.into_iter();
    let command = match rest.next() {
        Some(Token::Word(command)) => command,
        Some(Token::Equals) => return Err(CommandError::MalformedAssignment),
        None => return Err(CommandError::MissingCommand(head)),
    };
    let params = rest.map(|t| Param::new(t.into_text())).collect();

    Ok(ConsoleCommand::Exec {
        object: head,
        command,
        params,
    })
}
