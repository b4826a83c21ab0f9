//! Target resolution.
//!
//! Decides which window, tab or session a command acts on. An explicit
//! `--window`/`--tab`/`--session` always wins; otherwise the entity that
//! currently has focus is used. There is no positional fallback: if nothing
//! of the requested kind has focus, resolution fails with
//! [`CtlError::NoCurrentTarget`].

use crate::client::{AutomationClient, Focus};
use crate::error::{CtlError, Result};
use serde::Serialize;

/// The three kinds of addressable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Window,
    Tab,
    Session,
}

impl Category {
    /// Lowercase name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Window => "window",
            Category::Tab => "tab",
            Category::Session => "session",
        }
    }
}

/// A tagged entity identifier issued by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Window(String),
    Tab(String),
    Session(String),
}

impl EntityRef {
    fn new(category: Category, id: String) -> Self {
        match category {
            Category::Window => EntityRef::Window(id),
            Category::Tab => EntityRef::Tab(id),
            Category::Session => EntityRef::Session(id),
        }
    }

    /// Consume into the raw ID.
    pub fn into_id(self) -> String {
        match self {
            EntityRef::Window(id) | EntityRef::Tab(id) | EntityRef::Session(id) => id,
        }
    }
}

/// Explicit targets given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSpec {
    pub window: Option<String>,
    pub tab: Option<String>,
    pub session: Option<String>,
}

/// `--session` value meaning the focused session.
pub const ACTIVE_SESSION: &str = "active";
/// `--session` value meaning every session (for `send` and `run`).
pub const ALL_SESSIONS: &str = "all";

impl TargetSpec {
    /// Whether `--session all` was given.
    pub fn all_sessions(&self) -> bool {
        self.session.as_deref() == Some(ALL_SESSIONS)
    }

    /// The explicit session, normalized. `active` counts as no explicit
    /// session.
    ///
    /// # Errors
    ///
    /// [`CtlError::Usage`] for `all`, which does not name a single session.
    fn explicit_session(&self) -> Result<Option<String>> {
        match self.session.as_deref() {
            None | Some(ACTIVE_SESSION) => Ok(None),
            Some(ALL_SESSIONS) => Err(CtlError::Usage(
                "--session all only applies to send and run".into(),
            )),
            Some(id) => Ok(Some(normalize_session_id(id))),
        }
    }
}

/// Resolve one target against a focus snapshot.
///
/// Explicit IDs are returned unchecked (session IDs are normalized); the next
/// client call validates existence.
pub fn resolve(category: Category, explicit: Option<&str>, focus: &Focus) -> Result<EntityRef> {
    if let Some(id) = explicit {
        let id = match category {
            Category::Session => normalize_session_id(id),
            _ => id.to_string(),
        };
        return Ok(EntityRef::new(category, id));
    }

    let focused = match category {
        Category::Window => &focus.window,
        Category::Tab => &focus.tab,
        Category::Session => &focus.session,
    };
    focused
        .clone()
        .map(|id| EntityRef::new(category, id))
        .ok_or(CtlError::NoCurrentTarget(category.as_str()))
}

/// Strip `ITERM_SESSION_ID` (`w0t0p0:UUID`) and termid (`w0t0p0.UUID`)
/// prefixes, leaving the bare UUID. Anything else is returned unchanged.
pub fn normalize_session_id(id: &str) -> String {
    if let Some(pos) = id.find([':', '.']) {
        let (prefix, rest) = (&id[..pos], &id[pos + 1..]);
        if is_position_prefix(prefix) && is_uuid(rest) {
            return rest.to_string();
        }
    }
    id.to_string()
}

/// Matches `w<digits>t<digits>p<digits>`.
fn is_position_prefix(s: &str) -> bool {
    let mut rest = s;
    for marker in ['w', 't', 'p'] {
        let Some(after) = rest.strip_prefix(marker) else {
            return false;
        };
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &after[digits..];
    }
    rest.is_empty()
}

fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let lens = [8, 4, 4, 4, 12];
    groups.len() == lens.len()
        && groups
            .iter()
            .zip(lens)
            .all(|(g, n)| g.len() == n && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// The tab containing `session`.
pub fn tab_of_session(client: &dyn AutomationClient, session: &str) -> Result<String> {
    client
        .list_sessions(None)?
        .into_iter()
        .find(|s| s.id == session)
        .map(|s| s.tab_id)
        .ok_or_else(|| CtlError::TargetVanished {
            kind: "session",
            id: session.to_string(),
        })
}

/// The window containing `tab`.
pub fn window_of_tab(client: &dyn AutomationClient, tab: &str) -> Result<String> {
    client
        .list_tabs(None)?
        .into_iter()
        .find(|t| t.id == tab)
        .map(|t| t.window_id)
        .ok_or_else(|| CtlError::TargetVanished {
            kind: "tab",
            id: tab.to_string(),
        })
}

/// The session that has focus within `tab`.
pub fn current_session_of_tab(client: &dyn AutomationClient, tab: &str) -> Result<String> {
    let info = client
        .list_tabs(None)?
        .into_iter()
        .find(|t| t.id == tab)
        .ok_or_else(|| CtlError::EntityNotFound {
            kind: "tab",
            id: tab.to_string(),
        })?;
    info.current_session
        .ok_or(CtlError::NoCurrentTarget("session"))
}

/// The tab that has focus within `window`.
pub fn current_tab_of_window(client: &dyn AutomationClient, window: &str) -> Result<String> {
    let info = client
        .list_windows()?
        .into_iter()
        .find(|w| w.id == window)
        .ok_or_else(|| CtlError::EntityNotFound {
            kind: "window",
            id: window.to_string(),
        })?;
    info.current_tab.ok_or(CtlError::NoCurrentTarget("tab"))
}

/// Resolve the tab a command should act on.
///
/// `--tab` wins, then the tab containing `--session`, then the current tab
/// of `--window`, then focus.
pub fn resolve_tab(client: &dyn AutomationClient, spec: &TargetSpec) -> Result<String> {
    if let Some(tab) = &spec.tab {
        return Ok(tab.clone());
    }
    if let Some(session) = spec.explicit_session()? {
        return tab_of_session(client, &session);
    }
    if let Some(window) = &spec.window {
        return current_tab_of_window(client, window);
    }
    resolve(Category::Tab, None, &client.focus()?).map(EntityRef::into_id)
}

/// Resolve the window a command should act on.
///
/// `--window` wins, then the parent of `--tab`, then the parent of the tab
/// containing `--session`, then focus.
pub fn resolve_window(client: &dyn AutomationClient, spec: &TargetSpec) -> Result<String> {
    if let Some(window) = &spec.window {
        return Ok(window.clone());
    }
    if let Some(tab) = &spec.tab {
        return window_of_tab(client, tab);
    }
    if let Some(session) = spec.explicit_session()? {
        let tab = tab_of_session(client, &session)?;
        return window_of_tab(client, &tab);
    }
    resolve(Category::Window, None, &client.focus()?).map(EntityRef::into_id)
}

/// Resolve the session a command should act on.
///
/// `--session` wins (`active` falls through to focus), then the current session of `--tab`, then of the current
/// tab of `--window`, then focus.
pub fn resolve_session(client: &dyn AutomationClient, spec: &TargetSpec) -> Result<String> {
    if let Some(session) = spec.explicit_session()? {
        return Ok(session);
    }
    if let Some(tab) = &spec.tab {
        return current_session_of_tab(client, tab);
    }
    if let Some(window) = &spec.window {
        let tab = current_tab_of_window(client, window)?;
        return current_session_of_tab(client, &tab);
    }
    resolve(Category::Session, None, &client.focus()?).map(EntityRef::into_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;

    const UUID: &str = "0C3F5B1A-9E2D-4F6B-8A7C-1D2E3F4A5B6C";

    fn focused() -> Focus {
        Focus {
            window: Some("w1".into()),
            tab: Some("t1".into()),
            session: Some("s1".into()),
        }
    }

    #[test]
    fn test_explicit_wins_over_focus() {
        for focus in [focused(), Focus::default()] {
            assert_eq!(
                resolve(Category::Window, Some("w9"), &focus).unwrap(),
                EntityRef::Window("w9".into())
            );
            assert_eq!(
                resolve(Category::Tab, Some("t9"), &focus).unwrap(),
                EntityRef::Tab("t9".into())
            );
            assert_eq!(
                resolve(Category::Session, Some("s9"), &focus).unwrap(),
                EntityRef::Session("s9".into())
            );
        }
    }

    #[test]
    fn test_focus_used_when_no_explicit() {
        assert_eq!(
            resolve(Category::Session, None, &focused()).unwrap(),
            EntityRef::Session("s1".into())
        );
    }

    #[test]
    fn test_missing_focus_never_guesses() {
        let focus = Focus {
            window: Some("w1".into()),
            tab: None,
            session: None,
        };
        assert!(matches!(
            resolve(Category::Tab, None, &focus),
            Err(CtlError::NoCurrentTarget("tab"))
        ));
        assert!(matches!(
            resolve(Category::Session, None, &focus),
            Err(CtlError::NoCurrentTarget("session"))
        ));
        assert!(matches!(
            resolve(Category::Window, None, &Focus::default()),
            Err(CtlError::NoCurrentTarget("window"))
        ));
    }

    #[test]
    fn test_normalize_session_id() {
        assert_eq!(normalize_session_id(&format!("w0t1p2:{}", UUID)), UUID);
        assert_eq!(normalize_session_id(&format!("w10t0p3.{}", UUID)), UUID);
        assert_eq!(normalize_session_id(UUID), UUID);
        assert_eq!(normalize_session_id("wxt0p0:abc"), "wxt0p0:abc");
        assert_eq!(normalize_session_id("w0t0p0:not-a-uuid"), "w0t0p0:not-a-uuid");
        assert_eq!(
            resolve(Category::Session, Some(&format!("w0t0p0:{}", UUID)), &Focus::default())
                .unwrap()
                .into_id(),
            UUID
        );
    }

    #[test]
    fn test_parent_lookups() {
        let client = FakeClient::new();
        assert_eq!(tab_of_session(&client, "s1").unwrap(), "t1");
        assert_eq!(window_of_tab(&client, "t1").unwrap(), "w1");
        assert!(matches!(
            tab_of_session(&client, "gone"),
            Err(CtlError::TargetVanished { kind: "session", .. })
        ));
        assert!(matches!(
            window_of_tab(&client, "gone"),
            Err(CtlError::TargetVanished { kind: "tab", .. })
        ));
    }

    #[test]
    fn test_resolve_window_from_session() {
        let client = FakeClient::new();
        let spec = TargetSpec {
            session: Some("s1".into()),
            ..TargetSpec::default()
        };
        assert_eq!(resolve_window(&client, &spec).unwrap(), "w1");
        assert_eq!(resolve_tab(&client, &spec).unwrap(), "t1");
    }

    #[test]
    fn test_resolve_session_through_window() {
        let client = FakeClient::new();
        let spec = TargetSpec {
            window: Some("w1".into()),
            ..TargetSpec::default()
        };
        assert_eq!(resolve_session(&client, &spec).unwrap(), "s1");
    }

    #[test]
    fn test_no_focus_on_empty_app() {
        let client = FakeClient::empty();
        assert!(matches!(
            resolve_session(&client, &TargetSpec::default()),
            Err(CtlError::NoCurrentTarget("session"))
        ));
        assert!(matches!(
            resolve_window(&client, &TargetSpec::default()),
            Err(CtlError::NoCurrentTarget("window"))
        ));
    }

    #[test]
    fn test_session_sentinels() {
        let client = FakeClient::new();
        let active = TargetSpec {
            session: Some("active".into()),
            ..TargetSpec::default()
        };
        assert_eq!(resolve_session(&client, &active).unwrap(), "s1");
        assert_eq!(resolve_window(&client, &active).unwrap(), "w1");
        assert!(!active.all_sessions());

        let all = TargetSpec {
            session: Some("all".into()),
            ..TargetSpec::default()
        };
        assert!(all.all_sessions());
        assert!(matches!(
            resolve_session(&client, &all),
            Err(CtlError::Usage(_))
        ));
    }
}
