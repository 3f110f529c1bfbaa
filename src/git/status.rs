//! Porcelain status parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::error::ParseError;

/// `XY path` with an optional ` -> destination` for renames and copies
static STATUS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.)(.) (.*?)(?: -> (.*))?$").expect("Invalid regex pattern"));

const CONFLICT_CODES: &[&str] = &["DD", "AU", "UD", "UA", "DU", "AA", "UU"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    /// Unmerged paths
    Conflict,
    /// Untracked paths
    Unknown,
    /// Work tree differs from the index
    Changed,
    /// Index differs from HEAD
    Indexed,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Conflict => "conflict",
            StatusCategory::Unknown => "unknown",
            StatusCategory::Changed => "changed",
            StatusCategory::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub category: StatusCategory,
    /// One status letter, or two for conflicts
    pub code: String,
    pub from: String,
    pub to: Option<String>,
}

impl StatusEntry {
    fn new(category: StatusCategory, code: impl Into<String>, from: &str, to: Option<&str>) -> Self {
        Self {
            category,
            code: code.into(),
            from: from.to_string(),
            to: to.map(str::to_string),
        }
    }

    /// Human readable meaning of the status code
    pub fn description(&self) -> &'static str {
        match self.code.as_str() {
            "M" => "modified",
            "T" => "type changed",
            "A" => "added",
            "D" => "deleted",
            "R" => "renamed",
            "C" => "copied",
            "U" => "updated but unmerged",
            "?" => "untracked",
            "DD" => "both deleted",
            "AA" => "both added",
            "UU" => "both modified",
            "AU" => "added by us",
            "DU" => "deleted by us",
            "UA" => "added by them",
            "UD" => "deleted by them",
            _ => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCollection {
    /// Branch from a `## branch...upstream` header, when requested
    pub branch: Option<String>,
    entries: Vec<StatusEntry>,
}

impl StatusCollection {
    pub fn get(&self, category: StatusCategory) -> Vec<&StatusEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.category == category)
            .collect()
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatusEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Any path at all shows up, untracked ones included
    pub fn is_dirty(&self) -> bool {
        !self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a StatusCollection {
    type Item = &'a StatusEntry;
    type IntoIter = std::slice::Iter<'a, StatusEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse a git status branch line (format: "## branch...upstream")
fn parse_branch_line(line: &str) -> Option<String> {
    line.strip_prefix("## ")
        .and_then(|branch_info| branch_info.split("...").next())
        .map(|s| s.to_string())
}

/// Classify one porcelain line; a line yields zero, one or two entries
fn parse_status_line(line: &str, into: &mut Vec<StatusEntry>) -> Result<(), ParseError> {
    let caps = STATUS_LINE
        .captures(line)
        .ok_or_else(|| ParseError::MalformedStatusLine {
            line: line.to_string(),
        })?;

    let x = &caps[1];
    let y = &caps[2];
    let from = caps.get(3).map_or("", |m| m.as_str());
    let to = caps.get(4).map(|m| m.as_str());
    let code = format!("{x}{y}");

    if CONFLICT_CODES.contains(&code.as_str()) {
        into.push(StatusEntry::new(StatusCategory::Conflict, code, from, to));
    } else if code == "??" {
        into.push(StatusEntry::new(StatusCategory::Unknown, "?", from, to));
    } else {
        if y != " " {
            into.push(StatusEntry::new(StatusCategory::Changed, y, from, to));
        }
        if x != " " {
            into.push(StatusEntry::new(StatusCategory::Indexed, x, from, to));
        }
    }

    Ok(())
}

/// Parse `git status --porcelain` output.
///
/// Blank lines are skipped; any other line that is not `XY path` fails the
/// whole parse.
pub fn parse_status(lines: &[String]) -> Result<StatusCollection, ParseError> {
    let mut status = StatusCollection::default();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        if let Some(branch) = parse_branch_line(line) {
            status.branch = Some(branch);
            continue;
        }

        parse_status_line(line, &mut status.entries)?;
    }

    Ok(status)
}
