//! Error types for itermctl.
//!
//! All errors are represented by [`CtlError`], which covers target resolution,
//! alias and profile execution, transport failures and configuration problems.

use std::path::PathBuf;
use thiserror::Error;

/// All possible errors that can occur in itermctl.
#[derive(Error, Debug)]
pub enum CtlError {
    /// No explicit target was given and nothing of that kind has focus.
    #[error("No current {0}")]
    NoCurrentTarget(&'static str),

    /// An entity disappeared between listing and use.
    #[error("{kind} '{id}' vanished while resolving its parent")]
    TargetVanished {
        /// Entity kind (`window`, `tab`, `session`).
        kind: &'static str,
        /// The child entity ID whose parent could not be found.
        id: String,
    },

    /// The application has no entity with this ID.
    #[error("{} '{id}' not found", capitalize(.kind))]
    EntityNotFound {
        /// Entity kind (`window`, `tab`, `session`).
        kind: &'static str,
        /// The requested ID.
        id: String,
    },

    /// Requested alias does not exist in config.
    #[error("Alias not found: {0}")]
    UnknownAlias(String),

    /// Alias references form a cycle (a -> b -> a).
    #[error("Alias cycle detected: {0}")]
    AliasCycle(String),

    /// Alias expansion nested deeper than the configured limit.
    #[error("Alias '{alias}' exceeds the recursion limit of {limit}")]
    AliasRecursionLimit {
        /// The alias being expanded when the limit was hit.
        alias: String,
        /// The configured depth cap.
        limit: usize,
    },

    /// An alias line cannot be expanded.
    #[error("Invalid alias '{alias}': {reason}")]
    InvalidAlias {
        /// The alias containing the bad line.
        alias: String,
        /// What is wrong with it.
        reason: String,
    },

    /// One or more lines of a continue-on-error alias failed.
    #[error("Alias '{alias}': {failed} of {total} commands failed")]
    AliasFailed {
        /// The alias that was run.
        alias: String,
        /// Number of failed lines.
        failed: usize,
        /// Number of lines run.
        total: usize,
    },

    /// Requested profile does not exist in config.
    #[error("Profile not found: {0}")]
    UnknownProfile(String),

    /// A split directive is neither an orientation nor a `CxR` grid.
    #[error("Invalid split spec: {0}")]
    InvalidSplitSpec(String),

    /// A pane step addressed an index no split has created yet.
    #[error("Pane {0} is not bound (only panes created by earlier splits can be addressed)")]
    PaneIndexNotBound(usize),

    /// A profile stopped at a failing step.
    #[error("Profile '{profile}' failed at step {step} after {steps_run} steps: {source}")]
    ProfileStepFailed {
        /// The profile being run.
        profile: String,
        /// 1-based position of the failing step.
        step: usize,
        /// Steps completed before the failure.
        steps_run: usize,
        /// The step's error.
        #[source]
        source: Box<CtlError>,
    },

    /// A transport call did not finish in time.
    #[error("Timed out after {0}s waiting for iTerm2")]
    TransportTimeout(u64),

    /// The automation endpoint is unreachable.
    #[error("Cannot reach iTerm2: {0}")]
    TransportDisconnected(String),

    /// The application refused the operation.
    #[error("iTerm2 rejected the request: {0}")]
    RejectedByApplication(String),

    /// A `--pattern` is not a valid regular expression.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The user declined a confirmation prompt.
    #[error("Aborted: {0}")]
    Aborted(String),

    /// An expanded command line could not be parsed.
    #[error("{0}")]
    Usage(String),

    /// Config file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Could not determine the user's config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The config parsed but is not valid.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl CtlError {
    /// Process exit code for this error.
    ///
    /// `2` when iTerm2 cannot be reached, `3` for target errors, `4` for usage
    /// and config errors, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CtlError::TransportDisconnected(_) | CtlError::TransportTimeout(_) => 2,
            CtlError::NoCurrentTarget(_)
            | CtlError::TargetVanished { .. }
            | CtlError::EntityNotFound { .. } => 3,
            CtlError::UnknownAlias(_)
            | CtlError::AliasCycle(_)
            | CtlError::AliasRecursionLimit { .. }
            | CtlError::InvalidAlias { .. }
            | CtlError::UnknownProfile(_)
            | CtlError::InvalidSplitSpec(_)
            | CtlError::PaneIndexNotBound(_)
            | CtlError::InvalidPattern(_)
            | CtlError::Usage(_)
            | CtlError::ConfigNotFound(_)
            | CtlError::ParseError(_)
            | CtlError::InvalidConfig(_) => 4,
            CtlError::ProfileStepFailed { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convenient Result type alias for itermctl operations.
pub type Result<T> = std::result::Result<T, CtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = CtlError::EntityNotFound {
            kind: "window",
            id: "non-existent-window".into(),
        };
        assert_eq!(err.to_string(), "Window 'non-existent-window' not found");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_step_failure_exit_code_follows_source() {
        let err = CtlError::ProfileStepFailed {
            profile: "dev".into(),
            step: 3,
            steps_run: 2,
            source: Box::new(CtlError::PaneIndexNotBound(4)),
        };
        assert_eq!(err.exit_code(), 4);

        let err = CtlError::ProfileStepFailed {
            profile: "dev".into(),
            step: 1,
            steps_run: 0,
            source: Box::new(CtlError::TransportTimeout(10)),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_connection_failures_exit_2() {
        assert_eq!(
            CtlError::TransportDisconnected("iTerm2 is not running".into()).exit_code(),
            2
        );
        assert_eq!(CtlError::TransportTimeout(10).exit_code(), 2);
        assert_eq!(
            CtlError::RejectedByApplication("nope".into()).exit_code(),
            1
        );
        assert_eq!(CtlError::Aborted("Quit iTerm2?".into()).exit_code(), 1);
    }
}
