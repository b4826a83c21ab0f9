//! Alias expansion.
//!
//! An alias expands to one or more command lines. Every line is parsed as a
//! full command line; a line that parses to an alias invocation is expanded
//! in place, recursively, and everything else (including `load <profile>`)
//! is kept literally for the dispatcher. A fully expanded alias therefore
//! contains only valid, non-alias commands.
//!
//! # Example
//!
//! ```toml
//! [aliases]
//! deploy = 'session run "deploy.sh" --all'
//! morning = ["load dev", "deploy"]   # expands to both lines
//! ```
//!
//! Expansion walks an explicit frame stack instead of recursing, so the
//! active path (for cycle detection) and the depth budget are plain data.

use crate::cli::{Cli, Command};
use crate::config::{Alias, Config};
use crate::error::{CtlError, Result};
use clap::Parser;
use std::collections::HashMap;

/// A parsed alias line.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasLine {
    /// A literal command line for the dispatcher.
    Command(String),
    /// A reference to another alias.
    AliasRef(String),
}

/// Split an alias line into shell words and parse it as a full command line.
///
/// # Errors
///
/// [`CtlError::InvalidAlias`] if the line cannot be split into shell words,
/// [`CtlError::Usage`] if the words are not a valid command.
pub fn parse_command_line(owner: &str, line: &str) -> Result<Cli> {
    let words = shell_words::split(line).map_err(|e| CtlError::InvalidAlias {
        alias: owner.to_string(),
        reason: format!("cannot parse '{}': {}", line, e),
    })?;
    if words.is_empty() {
        return Err(CtlError::InvalidAlias {
            alias: owner.to_string(),
            reason: "empty command line".into(),
        });
    }
    Cli::try_parse_from(std::iter::once("itermctl".to_string()).chain(words)).map_err(|e| {
        let message = e.to_string();
        let first = message.lines().next().unwrap_or_default().trim();
        CtlError::Usage(format!("alias '{}': '{}': {}", owner, line, first))
    })
}

/// Classify one alias line against the alias table.
///
/// The line is parsed exactly as the dispatcher will parse it, so anything
/// that would run as an alias is seen here as an alias reference.
///
/// # Errors
///
/// - [`CtlError::InvalidAlias`] for unsplittable lines, and for alias
///   references carrying flags or arguments
/// - [`CtlError::UnknownAlias`] if the line names an alias that does not exist
/// - [`CtlError::Usage`] if the line is not a valid command
pub fn parse_line(owner: &str, line: &str, table: &HashMap<String, Alias>) -> Result<AliasLine> {
    let cli = parse_command_line(owner, line)?;
    let Command::Alias(args) = cli.command else {
        return Ok(AliasLine::Command(line.to_string()));
    };

    let name = args.first().cloned().unwrap_or_default();
    if !table.contains_key(&name) {
        return Err(CtlError::UnknownAlias(name));
    }
    // Nested aliases are expanded in place, so there is nowhere for flags
    // or arguments on the reference to go.
    let words = shell_words::split(line).unwrap_or_default();
    if words.len() != 1 {
        return Err(CtlError::InvalidAlias {
            alias: owner.to_string(),
            reason: format!("alias reference '{}' cannot carry flags or arguments", line),
        });
    }
    Ok(AliasLine::AliasRef(name))
}

struct Frame<'a> {
    name: &'a str,
    lines: &'a [String],
    next: usize,
}

/// Expand `name` into the flat list of command lines it runs, in order.
///
/// # Errors
///
/// - [`CtlError::UnknownAlias`] if `name` is not in the table
/// - [`CtlError::AliasCycle`] if an alias reaches itself
/// - [`CtlError::AliasRecursionLimit`] if nesting exceeds `max_depth`
/// - [`CtlError::InvalidAlias`] / [`CtlError::Usage`] for malformed lines
pub fn expand(name: &str, table: &HashMap<String, Alias>, max_depth: usize) -> Result<Vec<String>> {
    let (root_name, root) = table
        .get_key_value(name)
        .ok_or_else(|| CtlError::UnknownAlias(name.to_string()))?;

    let mut result = Vec::new();
    let mut stack = vec![Frame {
        name: root_name,
        lines: &root.commands,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(line) = frame.lines.get(frame.next) else {
            stack.pop();
            continue;
        };
        frame.next += 1;
        let owner = frame.name;

        match parse_line(owner, line, table)? {
            AliasLine::Command(cmd) => result.push(cmd),
            AliasLine::AliasRef(child) => {
                if let Some(start) = stack.iter().position(|f| f.name == child) {
                    let mut path: Vec<&str> = stack[start..].iter().map(|f| f.name).collect();
                    path.push(&child);
                    return Err(CtlError::AliasCycle(path.join(" -> ")));
                }
                if stack.len() >= max_depth {
                    return Err(CtlError::AliasRecursionLimit {
                        alias: name.to_string(),
                        limit: max_depth,
                    });
                }
                let (child_name, alias) = table
                    .get_key_value(&child)
                    .ok_or_else(|| CtlError::UnknownAlias(child.clone()))?;
                stack.push(Frame {
                    name: child_name,
                    lines: &alias.commands,
                    next: 0,
                });
            }
        }
    }

    Ok(result)
}

/// Expand an alias using the config's table and depth setting.
pub fn expand_in(config: &Config, name: &str) -> Result<Vec<String>> {
    expand(name, &config.aliases, config.settings.alias_depth)
}
