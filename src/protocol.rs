//! socketcmd text protocol parser and response generator.
//!
//! Requests are single lines of whitespace-separated tokens. The first token
//! names the command (case-sensitive), the rest are positional arguments:
//! - `hi`: greeting
//! - `bool [true|false]`: ask the boolean oracle
//! - `date`: ask the epoch-time oracle
//! - `sleep`: wait five seconds
//!
//! Every response is one line: a 3-digit status code, a tag, and an
//! optional payload.

use bytes::BytesMut;
use std::fmt;

/// Value of a `bool` request, also the name of the external command run for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolValue {
    True,
    False,
}

impl BoolValue {
    /// Parse an exact `true`/`false` token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "true" => Some(BoolValue::True),
            "false" => Some(BoolValue::False),
            _ => None,
        }
    }

    /// Command name and wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolValue::True => "true",
            BoolValue::False => "false",
        }
    }
}

impl From<bool> for BoolValue {
    fn from(value: bool) -> Self {
        if value {
            BoolValue::True
        } else {
            BoolValue::False
        }
    }
}

impl fmt::Display for BoolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument of a `bool` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolArg {
    /// No argument: the server picks a value.
    Random,
    /// A valid `true`/`false` token.
    Value(BoolValue),
    /// Any other token.
    Invalid(String),
}

/// Parsed socketcmd command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting
    Hi,
    /// Run `true`/`false` and report the exit status
    Bool(BoolArg),
    /// Run `date +%s` and report its output
    Date,
    /// Pause the connection
    Sleep,
    /// Anything else
    Unknown(String),
}

impl Command {
    /// Parse one line of input.
    ///
    /// Returns `None` for lines without any tokens.
    pub fn parse(line: &str) -> Option<Command> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;

        let command = match name {
            "hi" => Command::Hi,
            "bool" => Command::Bool(match tokens.next() {
                None => BoolArg::Random,
                Some(token) => match BoolValue::from_token(token) {
                    Some(value) => BoolArg::Value(value),
                    None => BoolArg::Invalid(token.to_string()),
                },
            }),
            "date" => Command::Date,
            "sleep" => Command::Sleep,
            other => Command::Unknown(other.to_string()),
        };

        Some(command)
    }
}

/// A single response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `000 HI`
    Hi,
    /// `005 ZZZ`
    Zzz,
    /// `210 OK <value>`
    BoolOk(BoolValue),
    /// `<410 + exit code> ERROR <value>`
    BoolError { value: BoolValue, exit_code: i32 },
    /// `220 DATE <output>`, output carried verbatim
    Date(String),
    /// `400 BAD COMMAND`
    BadCommand,
    /// `409 INVALID ARGUMENT`
    InvalidArgument,
}

impl Response {
    /// Numeric status code.
    pub fn code(&self) -> i32 {
        match self {
            Response::Hi => 0,
            Response::Zzz => 5,
            Response::BoolOk(_) => 210,
            Response::BoolError { exit_code, .. } => 410 + exit_code,
            Response::Date(_) => 220,
            Response::BadCommand => 400,
            Response::InvalidArgument => 409,
        }
    }

    /// Encode the response into wire bytes.
    pub fn encode(&self) -> BytesMut {
        let code = self.code();
        let line = match self {
            Response::Hi => format!("{code:03} HI\n"),
            Response::Zzz => format!("{code:03} ZZZ\n"),
            Response::BoolOk(value) => format!("{code:03} OK {value}\n"),
            Response::BoolError { value, .. } => format!("{code:03} ERROR {value}\n"),
            Response::Date(output) => {
                // `date` output already ends with a newline
                if output.ends_with('\n') {
                    format!("{code:03} DATE {output}")
                } else {
                    format!("{code:03} DATE {output}\n")
                }
            }
            Response::BadCommand => format!("{code:03} BAD COMMAND\n"),
            Response::InvalidArgument => format!("{code:03} INVALID ARGUMENT\n"),
        };
        BytesMut::from(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hi() {
        assert_eq!(Command::parse("hi"), Some(Command::Hi));
        assert_eq!(Command::parse("  hi  there "), Some(Command::Hi));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            Command::parse("HI"),
            Some(Command::Unknown("HI".to_string()))
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(Command::parse("bool"), Some(Command::Bool(BoolArg::Random)));
        assert_eq!(
            Command::parse("bool true"),
            Some(Command::Bool(BoolArg::Value(BoolValue::True)))
        );
        assert_eq!(
            Command::parse("bool\tfalse extra"),
            Some(Command::Bool(BoolArg::Value(BoolValue::False)))
        );
        assert_eq!(
            Command::parse("bool True"),
            Some(Command::Bool(BoolArg::Invalid("True".to_string())))
        );
    }

    #[test]
    fn test_parse_date_and_sleep() {
        assert_eq!(Command::parse("date"), Some(Command::Date));
        assert_eq!(Command::parse("sleep 10"), Some(Command::Sleep));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("foo bar"),
            Some(Command::Unknown("foo".to_string()))
        );
    }

    #[test]
    fn test_parse_blank() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse(" \t\r"), None);
    }

    #[test]
    fn test_encode_fixed_responses() {
        assert_eq!(&Response::Hi.encode()[..], b"000 HI\n");
        assert_eq!(&Response::Zzz.encode()[..], b"005 ZZZ\n");
        assert_eq!(&Response::BadCommand.encode()[..], b"400 BAD COMMAND\n");
        assert_eq!(
            &Response::InvalidArgument.encode()[..],
            b"409 INVALID ARGUMENT\n"
        );
    }

    #[test]
    fn test_encode_bool() {
        assert_eq!(
            &Response::BoolOk(BoolValue::True).encode()[..],
            b"210 OK true\n"
        );
        let response = Response::BoolError {
            value: BoolValue::False,
            exit_code: 1,
        };
        assert_eq!(response.code(), 411);
        assert_eq!(&response.encode()[..], b"411 ERROR false\n");
    }

    #[test]
    fn test_encode_date_keeps_single_newline() {
        let response = Response::Date("1700000000\n".to_string());
        assert_eq!(&response.encode()[..], b"220 DATE 1700000000\n");

        let response = Response::Date("1700000000".to_string());
        assert_eq!(&response.encode()[..], b"220 DATE 1700000000\n");
    }
}
