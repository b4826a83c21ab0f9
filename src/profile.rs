//! Profile execution.
//!
//! A profile is an ordered list of steps run against one tab. Panes are
//! addressed by 1-based index: index 1 is the pane that had focus in the
//! target tab when the run started, and every pane created by a `split` step
//! takes the next index in creation order. Steps run strictly in sequence
//! and the first failure stops the run. Panes created before the failure
//! are left in place.
//!
//! # Split specs
//!
//! - `vertical` / `v`: one new pane beside the current one
//! - `horizontal` / `h`: one new pane below the current one
//! - `CxR` (e.g. `2x2`): turn the current pane into a grid of `C` columns and
//!   `R` rows. Columns are created first, each by splitting the previous new
//!   column; then each column, left to right, is split downwards `R-1`
//!   times. New panes are bound in exactly that order.

use crate::client::AutomationClient;
use crate::config::{Config, Step};
use crate::error::{CtlError, Result};
use crate::target;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Largest number of columns or rows a grid split may ask for.
pub const MAX_GRID_DIM: usize = 8;

/// A parsed `split` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSpec {
    /// New pane beside the current one.
    Vertical,
    /// New pane below the current one.
    Horizontal,
    /// A grid of columns x rows.
    Grid { cols: usize, rows: usize },
}

impl SplitSpec {
    /// Parse a split directive.
    ///
    /// # Errors
    ///
    /// [`CtlError::InvalidSplitSpec`] for anything other than an orientation or
    /// a `CxR` grid with both dimensions in `1..=MAX_GRID_DIM`.
    pub fn parse(spec: &str) -> Result<Self> {
        let normalized = spec.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "vertical" | "v" => return Ok(SplitSpec::Vertical),
            "horizontal" | "h" => return Ok(SplitSpec::Horizontal),
            _ => {}
        }

        let invalid = || CtlError::InvalidSplitSpec(spec.to_string());
        let (cols, rows) = normalized.split_once('x').ok_or_else(invalid)?;
        let cols: usize = cols.trim().parse().map_err(|_| invalid())?;
        let rows: usize = rows.trim().parse().map_err(|_| invalid())?;
        if !(1..=MAX_GRID_DIM).contains(&cols) || !(1..=MAX_GRID_DIM).contains(&rows) {
            return Err(invalid());
        }
        Ok(SplitSpec::Grid { cols, rows })
    }
}

/// Run-scoped map from pane index to session ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneBindings {
    sessions: Vec<String>,
}

impl PaneBindings {
    /// Bindings with `origin` at index 1.
    pub fn with_origin(origin: String) -> Self {
        Self {
            sessions: vec![origin],
        }
    }

    /// Bind a new pane at the next index and return that index.
    pub fn push(&mut self, session: String) -> usize {
        self.sessions.push(session);
        self.sessions.len()
    }

    /// Session bound at a 1-based index.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.sessions.get(i))
            .map(String::as_str)
    }

    /// The most recently bound pane.
    pub fn current(&self) -> Option<&str> {
        self.sessions.last().map(String::as_str)
    }

    /// Bound sessions, index 1 first.
    pub fn sessions(&self) -> &[String] {
        &self.sessions
    }
}

/// A step failure.
#[derive(Debug)]
pub struct StepFailure {
    /// 1-based position of the failing step.
    pub step: usize,
    pub error: CtlError,
}

/// Outcome of a profile run.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Number of steps that completed.
    pub steps_run: usize,
    pub first_failure: Option<StepFailure>,
    /// Pane bindings at the end of the run.
    pub panes: PaneBindings,
}

impl ExecutionResult {
    /// Turn a failed run into a [`CtlError::ProfileStepFailed`].
    pub fn into_result(self, profile: &str) -> Result<RunSummary> {
        match self.first_failure {
            None => Ok(RunSummary {
                profile: profile.to_string(),
                steps_run: self.steps_run,
                panes: self.panes.sessions,
            }),
            Some(failure) => Err(CtlError::ProfileStepFailed {
                profile: profile.to_string(),
                step: failure.step,
                steps_run: self.steps_run,
                source: Box::new(failure.error),
            }),
        }
    }
}

/// What a successful run reports to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub profile: String,
    pub steps_run: usize,
    /// Session IDs by pane index, index 1 first.
    pub panes: Vec<String>,
}

/// Render a `cd` step. A leading `~` stays unquoted so the shell expands it.
fn cd_command(path: &str) -> String {
    if path == "~" {
        return "cd ~".to_string();
    }
    match path.strip_prefix("~/") {
        Some("") => "cd ~/".to_string(),
        Some(rest) => format!("cd ~/{}", shell_words::quote(rest)),
        None => format!("cd {}", shell_words::quote(path)),
    }
}

/// Run profile `name` from `config` in `tab`. The tab's current session
/// becomes pane 1.
///
/// # Errors
///
/// Returns `Err` only when the run cannot start: [`CtlError::UnknownProfile`],
/// or a failure resolving the origin pane. Step failures are reported in
/// [`ExecutionResult::first_failure`].
pub fn run(
    name: &str,
    config: &Config,
    client: &dyn AutomationClient,
    tab: &str,
) -> Result<ExecutionResult> {
    let profile = config
        .get_profile(name)
        .ok_or_else(|| CtlError::UnknownProfile(name.to_string()))?;

    let origin = target::current_session_of_tab(client, tab)?;
    info!(profile = name, origin = %origin, steps = profile.steps.len(), "running profile");

    let mut panes = PaneBindings::with_origin(origin);
    let mut steps_run = 0;

    for (i, step) in profile.steps.iter().enumerate() {
        debug!(step = i + 1, ?step, "profile step");
        if let Err(error) = run_step(client, step, &mut panes) {
            warn!(profile = name, step = i + 1, %error, "profile step failed");
            return Ok(ExecutionResult {
                steps_run,
                first_failure: Some(StepFailure { step: i + 1, error }),
                panes,
            });
        }
        steps_run += 1;
    }

    Ok(ExecutionResult {
        steps_run,
        first_failure: None,
        panes,
    })
}

fn current_pane(panes: &PaneBindings) -> Result<String> {
    panes
        .current()
        .map(String::from)
        .ok_or(CtlError::PaneIndexNotBound(1))
}

fn run_step(client: &dyn AutomationClient, step: &Step, panes: &mut PaneBindings) -> Result<()> {
    match step {
        Step::ChangeDirectory(path) => {
            let session = current_pane(panes)?;
            client.send_text(&session, &cd_command(path), true)
        }
        Step::Command(text) => {
            let session = current_pane(panes)?;
            client.send_text(&session, text, true)
        }
        Step::PaneCommand(index, text) => {
            let session = panes
                .get(*index)
                .ok_or(CtlError::PaneIndexNotBound(*index))?;
            client.send_text(session, text, true)
        }
        Step::Split(spec) => {
            let spec = SplitSpec::parse(spec)?;
            let session = current_pane(panes)?;
            split(client, spec, &session, panes)
        }
    }
}

/// Perform a split from `session`, binding every new pane in creation order.
fn split(
    client: &dyn AutomationClient,
    spec: SplitSpec,
    session: &str,
    panes: &mut PaneBindings,
) -> Result<()> {
    match spec {
        SplitSpec::Vertical | SplitSpec::Horizontal => {
            let vertical = spec == SplitSpec::Vertical;
            let new_id = client.split_session(session, vertical, None)?;
            let index = panes.push(new_id);
            debug!(index, vertical, "bound pane");
        }
        SplitSpec::Grid { cols, rows } => {
            let mut columns = vec![session.to_string()];
            for _ in 1..cols {
                let from = columns.last().cloned().unwrap_or_else(|| session.to_string());
                let new_id = client.split_session(&from, true, None)?;
                panes.push(new_id.clone());
                columns.push(new_id);
            }
            for column in &columns {
                let mut from = column.clone();
                for _ in 1..rows {
                    let new_id = client.split_session(&from, false, None)?;
                    panes.push(new_id.clone());
                    from = new_id;
                }
            }
            debug!(cols, rows, panes = panes.sessions().len(), "grid split done");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{Call, FakeClient};
    use crate::config::Profile;

    fn config_with(name: &str, steps: Vec<Step>) -> Config {
        let mut config = Config::default();
        config.profiles.insert(
            name.to_string(),
            Profile {
                name: name.to_string(),
                steps,
            },
        );
        config
    }

    const HERE: &str = "t1";

    #[test]
    fn test_parse_split_spec() {
        assert_eq!(SplitSpec::parse("vertical").unwrap(), SplitSpec::Vertical);
        assert_eq!(SplitSpec::parse("H").unwrap(), SplitSpec::Horizontal);
        assert_eq!(
            SplitSpec::parse("2x3").unwrap(),
            SplitSpec::Grid { cols: 2, rows: 3 }
        );
        assert_eq!(
            SplitSpec::parse("1x1").unwrap(),
            SplitSpec::Grid { cols: 1, rows: 1 }
        );
        for bad in ["diagonal", "0x2", "2x", "x2", "9x1", "2x2x2", ""] {
            assert!(
                matches!(SplitSpec::parse(bad), Err(CtlError::InvalidSplitSpec(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_profile_has_no_side_effects() {
        let client = FakeClient::new();
        let err = run("nope", &Config::default(), &client, HERE).unwrap_err();
        assert!(matches!(err, CtlError::UnknownProfile(_)));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_origin_bound_to_pane_one() {
        let client = FakeClient::new();
        let config = config_with("p", vec![Step::PaneCommand(1, "echo hi".into())]);
        let result = run("p", &config, &client, HERE).unwrap();
        assert!(result.first_failure.is_none());
        assert_eq!(result.steps_run, 1);
        assert_eq!(client.sends(), vec![("s1".into(), "echo hi\n".into())]);
    }

    #[test]
    fn test_unbound_pane_without_split() {
        let client = FakeClient::new();
        let config = config_with("p", vec![Step::PaneCommand(2, "echo b".into())]);
        let result = run("p", &config, &client, HERE).unwrap();
        assert_eq!(result.steps_run, 0);
        let failure = result.first_failure.unwrap();
        assert_eq!(failure.step, 1);
        assert!(matches!(failure.error, CtlError::PaneIndexNotBound(2)));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_split_then_address_both_panes() {
        let client = FakeClient::new();
        let config = config_with(
            "p",
            vec![
                Step::Split("vertical".into()),
                Step::PaneCommand(1, "echo a".into()),
                Step::PaneCommand(2, "echo b".into()),
            ],
        );
        let result = run("p", &config, &client, HERE).unwrap();
        assert!(result.first_failure.is_none());
        assert_eq!(result.steps_run, 3);
        assert_eq!(result.panes.sessions().len(), 2);

        let new_pane = result.panes.get(2).unwrap().to_string();
        assert_eq!(client.sessions_in("t1"), vec!["s1".to_string(), new_pane.clone()]);
        assert_eq!(
            client.calls(),
            vec![
                Call::Split {
                    session: "s1".into(),
                    vertical: true
                },
                Call::Send {
                    session: "s1".into(),
                    text: "echo a\n".into()
                },
                Call::Send {
                    session: new_pane,
                    text: "echo b\n".into()
                },
            ]
        );
    }

    #[test]
    fn test_cd_and_command_go_to_current_pane() {
        let client = FakeClient::new();
        let config = config_with(
            "p",
            vec![
                Step::ChangeDirectory("~/src".into()),
                Step::Split("h".into()),
                Step::Command("make".into()),
            ],
        );
        let result = run("p", &config, &client, HERE).unwrap();
        assert!(result.first_failure.is_none());
        let new_pane = result.panes.get(2).unwrap().to_string();
        assert_eq!(
            client.sends(),
            vec![
                ("s1".into(), "cd ~/src\n".into()),
                (new_pane, "make\n".into()),
            ]
        );
    }

    #[test]
    fn test_grid_split_order() {
        let client = FakeClient::new();
        let config = config_with("p", vec![Step::Split("2x2".into())]);
        let result = run("p", &config, &client, HERE).unwrap();
        assert!(result.first_failure.is_none());
        assert_eq!(result.panes.sessions().len(), 4);

        let p = |i| result.panes.get(i).unwrap().to_string();
        assert_eq!(
            client.calls(),
            vec![
                // column 2 from the origin
                Call::Split {
                    session: "s1".into(),
                    vertical: true
                },
                // column 1 gets its second row
                Call::Split {
                    session: "s1".into(),
                    vertical: false
                },
                // column 2 gets its second row
                Call::Split {
                    session: p(2),
                    vertical: false
                },
            ]
        );
        assert_eq!(result.panes.current(), Some(p(4).as_str()));
    }

    #[test]
    fn test_invalid_split_fails_step() {
        let client = FakeClient::new();
        let config = config_with(
            "p",
            vec![Step::Command("ls".into()), Step::Split("sideways".into())],
        );
        let result = run("p", &config, &client, HERE).unwrap();
        assert_eq!(result.steps_run, 1);
        let failure = result.first_failure.unwrap();
        assert_eq!(failure.step, 2);
        assert!(matches!(failure.error, CtlError::InvalidSplitSpec(_)));
    }

    #[test]
    fn test_failure_stops_remaining_steps() {
        let client = FakeClient::new();
        client.fail_send_at(3);
        let config = config_with(
            "p",
            vec![
                Step::Command("one".into()),
                Step::Command("two".into()),
                Step::Command("three".into()),
                Step::Command("four".into()),
                Step::Command("five".into()),
            ],
        );
        let result = run("p", &config, &client, HERE).unwrap();
        assert_eq!(result.steps_run, 2);
        let failure = result.first_failure.as_ref().unwrap();
        assert_eq!(failure.step, 3);
        assert!(matches!(failure.error, CtlError::TransportTimeout(_)));
        assert_eq!(
            client.sends(),
            vec![
                ("s1".into(), "one\n".into()),
                ("s1".into(), "two\n".into()),
            ]
        );

        let err = result.into_result("p").unwrap_err();
        assert!(err.to_string().contains("failed at step 3 after 2 steps"));
    }

    #[test]
    fn test_split_panes_survive_failure() {
        let client = FakeClient::new();
        let config = config_with(
            "p",
            vec![Step::Split("v".into()), Step::PaneCommand(5, "x".into())],
        );
        let result = run("p", &config, &client, HERE).unwrap();
        assert_eq!(result.steps_run, 1);
        assert_eq!(client.sessions_in("t1").len(), 2);
    }

    #[test]
    fn test_cd_quotes_path() {
        assert_eq!(cd_command("~/src"), "cd ~/src");
        assert_eq!(cd_command("~/My Projects"), "cd ~/'My Projects'");
        assert_eq!(cd_command("/tmp/a b"), "cd '/tmp/a b'");
        assert_eq!(cd_command("~"), "cd ~");
        assert_eq!(cd_command("~/"), "cd ~/");

        let client = FakeClient::new();
        let config = config_with("p", vec![Step::ChangeDirectory("~/My Projects".into())]);
        run("p", &config, &client, HERE).unwrap();
        assert_eq!(
            client.sends(),
            vec![("s1".into(), "cd ~/'My Projects'\n".into())]
        );
    }

    #[test]
    fn test_missing_tab() {
        let client = FakeClient::new();
        let config = config_with("p", vec![Step::Command("pwd".into())]);
        let err = run("p", &config, &client, "t9").unwrap_err();
        assert!(matches!(err, CtlError::EntityNotFound { kind: "tab", .. }));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_bindings() {
        let mut panes = PaneBindings::with_origin("a".into());
        assert_eq!(panes.push("b".into()), 2);
        assert_eq!(panes.get(0), None);
        assert_eq!(panes.get(1), Some("a"));
        assert_eq!(panes.get(2), Some("b"));
        assert_eq!(panes.get(3), None);
        assert_eq!(panes.current(), Some("b"));
    }
}
