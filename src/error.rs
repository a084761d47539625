//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `workshopctl` application. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur within the application. Each variant corresponds to a specific
//!   type of error and includes contextual information to aid in debugging.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the application to simplify function signatures.
//!
//! Two error families deserve a note:
//!
//! - **Configuration errors** (`ManifestParse`, `Roster`, `MissingCredentials`)
//!   are fatal and abort a run before any remote work starts.
//! - **Remote errors** (`Remote`) carry a [`crate::remote::RemoteError`] whose
//!   classification (hard rate limit, secondary throttling, not-found,
//!   transient) drives the retry policy. They are scoped to a single work
//!   item and never abort the run as a whole.

use thiserror::Error;

/// Main error type for workshopctl operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing the workshop manifest file.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Manifest parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ManifestParse {
        message: String,
        /// Optional hint for how to fix the manifest issue
        hint: Option<String>,
    },

    /// An error occurred while loading the participant roster.
    #[error("Roster error for {path}: {message}")]
    Roster { path: String, message: String },

    /// Required remote-API credentials were not supplied.
    #[error("Missing credentials: {message}\n  hint: set the WORKSHOPCTL_TOKEN environment variable or pass --token")]
    MissingCredentials { message: String },

    /// An error returned by the remote hosting API.
    #[error("Remote API error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    /// An error occurred while executing a git command.
    #[error("Git command failed in {dir}: git {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// A template repository's source directory is missing from the
    /// extracted content root, so there is nothing to populate.
    #[error("Template source missing for {repo}: {path}")]
    TemplateSourceMissing { repo: String, path: String },

    /// An error occurred during placeholder rendering.
    #[error("Template rendering error in {path}: {message}")]
    Render { path: String, message: String },

    /// Teardown was refused because the confirmation token did not match.
    #[error("Deletion not confirmed: expected the literal token '{expected}'")]
    NotConfirmed { expected: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lock was poisoned by a panicking thread.
    #[error("Lock poisoned: {message}")]
    LockPoisoned { message: String },
}

/// Type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a manifest parsing error with a hint.
    pub fn manifest_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::ManifestParse {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}
