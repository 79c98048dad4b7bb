//! Deploy command parsing and validation

use std::fmt;

use crate::models::deployment::{Revision, MAIN_REVISION};
use crate::storage::settings::Settings;

const USAGE: &str = "Usage: @deploybot <app> <pr_number|main>";

/// Why a command was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The bot was mentioned without arguments
    Usage,

    /// The command did not split into mention, application and revision
    WrongArgCount(usize),

    UnknownApplication {
        application: String,
        supported: Vec<String>,
    },

    /// The revision is neither `main` nor a number
    RevisionNotANumber(String),

    /// The revision is a number below 1
    RevisionNotPositive(String),

    /// The revision is all digits but too large for a PR number
    RevisionOutOfRange(String),

    /// The application is protected and the user may not deploy it
    Unauthorized {
        user: String,
        application: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Usage => f.write_str(USAGE),
            Rejection::WrongArgCount(count) => write!(
                f,
                "Wrong number of arguments ({} given, 2 expected). {}",
                count.saturating_sub(1),
                USAGE
            ),
            Rejection::UnknownApplication {
                application,
                supported,
            } => write!(
                f,
                "Unrecognized application `{}`. Supported apps include {}",
                application,
                supported.join(", ")
            ),
            Rejection::RevisionNotANumber(revision) => write!(
                f,
                "`{}` is not a pull request number. You can only deploy a PR or the main branch",
                revision
            ),
            Rejection::RevisionNotPositive(revision) => write!(
                f,
                "`{}` is not a valid pull request number; PR numbers start at 1",
                revision
            ),
            Rejection::RevisionOutOfRange(revision) => write!(
                f,
                "`{}` is not a valid pull request number; it is out of range",
                revision
            ),
            Rejection::Unauthorized { user, application } => write!(
                f,
                "<@{}> is not authorized to deploy `{}`",
                user, application
            ),
        }
    }
}

/// Validates deploy commands against the configured applications
#[derive(Debug, Clone)]
pub struct CommandValidator {
    supported_apps: Vec<String>,
    protected_apps: Vec<String>,
    authorized_users: Vec<String>,
}

impl CommandValidator {
    pub fn new(
        supported_apps: Vec<String>,
        protected_apps: Vec<String>,
        authorized_users: Vec<String>,
    ) -> Self {
        Self {
            supported_apps,
            protected_apps,
            authorized_users,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.supported_apps.clone(),
            settings.protected_apps.clone(),
            settings.authorized_users.clone(),
        )
    }

    /// Parse `text` (the full mention, e.g. `<@BOT> time 42`) into an
    /// application and revision
    pub fn validate(&self, text: &str) -> Result<(String, Revision), Rejection> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.len() {
            0 | 1 => return Err(Rejection::Usage),
            3 => {}
            n => return Err(Rejection::WrongArgCount(n)),
        }

        let application = tokens[1];
        if !self.supported_apps.iter().any(|app| app == application) {
            return Err(Rejection::UnknownApplication {
                application: application.to_string(),
                supported: self.supported_apps.clone(),
            });
        }

        let revision = parse_revision(tokens[2])?;
        Ok((application.to_string(), revision))
    }

    /// Check that `user` may deploy `application`
    pub fn authorize(&self, user: &str, application: &str) -> Result<(), Rejection> {
        let protected = self.protected_apps.iter().any(|app| app == application);
        if protected && !self.is_authorized_user(user) {
            return Err(Rejection::Unauthorized {
                user: user.to_string(),
                application: application.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_authorized_user(&self, user: &str) -> bool {
        !user.is_empty() && self.authorized_users.iter().any(|u| u == user)
    }
}

fn parse_revision(token: &str) -> Result<Revision, Rejection> {
    if token == MAIN_REVISION {
        return Ok(Revision::Main);
    }

    // Only plain decimal digits, optionally negated; no `+`, no whitespace
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Rejection::RevisionNotANumber(token.to_string()));
    }
    if negative {
        return Err(Rejection::RevisionNotPositive(token.to_string()));
    }

    match digits.parse::<u64>() {
        Ok(0) => Err(Rejection::RevisionNotPositive(token.to_string())),
        Ok(number) if number <= i64::MAX as u64 => Ok(Revision::PullRequest(number)),
        _ => Err(Rejection::RevisionOutOfRange(token.to_string())),
    }
}
