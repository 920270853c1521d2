//! Console commands.

use std::fmt;
use std::path::PathBuf;

use crate::errors::{ClientError, ClientResult};
use crate::identity::UserAttribute;

/// Usage text printed by `help`.
pub const HELP: &str = "\
commands:
  register <email> <password> [name=value ...]
  confirm <email> <code>
  login <email> <password>
  list
  upload <path> [path ...]
  order
  cancel
  help
  quit";

/// One user action; each maps to exactly one handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Register {
        email: String,
        password: String,
        attributes: Vec<UserAttribute>,
    },
    Confirm {
        email: String,
        code: String,
    },
    Login {
        email: String,
        password: String,
    },
    List,
    Upload {
        paths: Vec<PathBuf>,
    },
    Order,
    Cancel,
    Help,
    Quit,
}

fn usage(message: &str) -> ClientError {
    ClientError::InvalidArgument {
        message: format!("usage: {message}"),
    }
}

impl Action {
    /// Parse one console line.  Blank lines yield `None`.
    pub fn parse(line: &str) -> ClientResult<Option<Action>> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let action = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("register", [email, password, rest @ ..]) => {
                let attributes = rest
                    .iter()
                    .map(|pair| {
                        pair.split_once('=')
                            .filter(|(name, _)| !name.is_empty())
                            .map(|(name, value)| UserAttribute::new(name, value))
                            .ok_or_else(|| usage("register <email> <password> [name=value ...]"))
                    })
                    .collect::<ClientResult<Vec<_>>>()?;
                Action::Register {
                    email: email.to_string(),
                    password: password.to_string(),
                    attributes,
                }
            }
            ("register", _) => return Err(usage("register <email> <password> [name=value ...]")),
            ("confirm", [email, code]) => Action::Confirm {
                email: email.to_string(),
                code: code.to_string(),
            },
            ("confirm", _) => return Err(usage("confirm <email> <code>")),
            ("login", [email, password]) => Action::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(usage("login <email> <password>")),
            ("list", []) => Action::List,
            // An empty selection is allowed; the handler reports it.
            ("upload", paths) => Action::Upload {
                paths: paths.iter().map(PathBuf::from).collect(),
            },
            ("order", []) => Action::Order,
            ("cancel", []) => Action::Cancel,
            ("help", _) => Action::Help,
            ("quit" | "exit", []) => Action::Quit,
            (other, _) => {
                return Err(ClientError::InvalidArgument {
                    message: format!("unknown command '{other}' (try 'help')"),
                })
            }
        };
        Ok(Some(action))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Register { email, .. } => write!(f, "register {email}"),
            Action::Confirm { email, .. } => write!(f, "confirm {email}"),
            Action::Login { email, .. } => write!(f, "login {email}"),
            Action::List => f.write_str("list"),
            Action::Upload { paths } => write!(f, "upload ({} files)", paths.len()),
            Action::Order => f.write_str("order"),
            Action::Cancel => f.write_str("cancel"),
            Action::Help => f.write_str("help"),
            Action::Quit => f.write_str("quit"),
        }
    }
}
