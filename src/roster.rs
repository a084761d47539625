//! # Participant Roster
//!
//! Loads the workshop roster: a small comma-separated file with one
//! mandatory column (the participant's username on the remote host) and one
//! optional column (a contact email). An optional header row is recognized
//! and skipped. Rows with an empty username are dropped silently, as are
//! duplicate usernames - the roster is forgiving input, not a schema.
//!
//! ```text
//! username,email
//! alice,alice@example.com
//! bob,
//! carol
//! ```

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};

/// One workshop participant. Loaded once, read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Username on the remote host. Non-empty, unique, case-sensitive.
    pub username: String,
    /// Optional contact address. Unused by the orchestrator itself but
    /// carried through to the ledger for the operator's benefit.
    pub email: Option<String>,
}

/// Load participants from a roster file.
pub fn from_file(path: &Path) -> Result<Vec<Participant>> {
    let content = fs::read_to_string(path).map_err(|e| Error::Roster {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse(&content))
}

/// Parse roster content. Malformed rows never fail the load.
pub fn parse(content: &str) -> Vec<Participant> {
    let mut participants: Vec<Participant> = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.splitn(2, ',');
        let username = fields.next().unwrap_or("").trim();
        let email = fields
            .next()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from);

        // Header row
        if lineno == 0 && username.eq_ignore_ascii_case("username") {
            continue;
        }

        if username.is_empty() {
            debug!("roster line {}: empty username, skipping", lineno + 1);
            continue;
        }

        if participants.iter().any(|p| p.username == username) {
            warn!(
                "roster line {}: duplicate participant '{}', skipping",
                lineno + 1,
                username
            );
            continue;
        }

        participants.push(Participant {
            username: username.to_string(),
            email,
        });
    }

    participants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header_and_emails() {
        let roster = parse("username,email\nalice,alice@example.com\nbob,bob@example.com\n");
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].username, "alice");
        assert_eq!(roster[0].email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_parse_without_header() {
        let roster = parse("alice,alice@example.com\nbob\n");
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].username, "bob");
        assert_eq!(roster[1].email, None);
    }

    #[test]
    fn test_malformed_rows_dropped_silently() {
        let roster = parse("alice\n\n,orphan@example.com\n   \nbob,\n");
        let names: Vec<&str> = roster.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_duplicate_usernames_dropped() {
        let roster = parse("alice,a@x.com\nalice,b@x.com\n");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_usernames_are_case_sensitive() {
        let roster = parse("alice\nAlice\n");
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_empty_file() {
        assert!(parse("").is_empty());
    }
}
