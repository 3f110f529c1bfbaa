//! Parsing of `git log --pretty=medium` output

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::iter::Peekable;

use super::error::ParseError;

static COMMIT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^commit (\S+)").expect("Invalid regex pattern"));

static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+):\s+(.+)$").expect("Invalid regex pattern"));

/// `:oldmode newmode oldblob newblob X[score]<TAB>path`; blob ids may carry
/// the `...` ellipsis older git versions print after abbreviated ids
static RAW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:(\d{6}) (\d{6}) ([0-9a-f]+)(?:\.\.\.)? ([0-9a-f]+)(?:\.\.\.)? ([A-Z])\d*\t(.*)$")
        .expect("Invalid regex pattern")
});

/// One file's entry from `--raw` diff output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawModification {
    pub old_mode: String,
    pub new_mode: String,
    pub old_blob: String,
    pub new_blob: String,
    /// `A`, `M`, `D`, `R`, `C`, `T`, ...
    pub change_type: String,
    /// For renames and copies, source and destination separated by a tab
    pub path: String,
}

impl RawModification {
    pub fn parse(line: &str) -> Option<Self> {
        let caps = RAW_LINE.captures(line)?;
        Some(Self {
            old_mode: caps[1].to_string(),
            new_mode: caps[2].to_string(),
            old_blob: caps[3].to_string(),
            new_blob: caps[4].to_string(),
            change_type: caps[5].to_string(),
            path: caps[6].to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: String,
    /// Header attributes keyed by lower-cased name (`author`, `date`, `merge`)
    pub attr: BTreeMap<String, String>,
    /// Message body with the common indentation removed, one `\n` per line
    pub message: String,
    /// Populated only when raw output was requested
    pub modifications: Vec<RawModification>,
}

impl LogEntry {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            attr: BTreeMap::new(),
            message: String::new(),
            modifications: Vec::new(),
        }
    }

    pub fn author(&self) -> Option<&str> {
        self.attr.get("author").map(String::as_str)
    }

    pub fn date(&self) -> Option<&str> {
        self.attr.get("date").map(String::as_str)
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn is_commit_line(line: &str) -> bool {
    COMMIT_LINE.is_match(line)
}

fn parse_entry<'a, I>(header: &str, lines: &mut Peekable<I>, raw: bool) -> Result<LogEntry, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let id = COMMIT_LINE
        .captures(header)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ParseError::UnhandledLogLine {
            line: header.to_string(),
        })?;
    let mut entry = LogEntry::new(id.as_str());

    while let Some(line) = lines.next_if(|line| HEADER_LINE.is_match(line)) {
        if let Some(caps) = HEADER_LINE.captures(line) {
            entry
                .attr
                .insert(caps[1].to_lowercase(), caps[2].to_string());
        }
    }

    match lines.next() {
        Some(separator) if !separator.is_empty() => {
            return Err(ParseError::MissingSeparator {
                line: separator.to_string(),
            });
        }
        _ => {}
    }

    let indent = lines.peek().map_or("", |line| leading_whitespace(*line));
    while let Some(line) = lines.next_if(|line| !line.is_empty() && !is_commit_line(line)) {
        entry.message.push_str(line.strip_prefix(indent).unwrap_or(line));
        entry.message.push('\n');
    }
    lines.next_if(|line| line.is_empty());

    if raw {
        while let Some(modification) = lines.peek().and_then(|line| RawModification::parse(line)) {
            entry.modifications.push(modification);
            lines.next();
        }
        if !entry.modifications.is_empty() {
            lines.next_if(|line| line.is_empty());
        }
    }

    Ok(entry)
}

/// Parse medium-format log output into entries, in output order
pub fn parse_log(lines: &[String], raw: bool) -> Result<Vec<LogEntry>, ParseError> {
    let mut lines = lines.iter().map(String::as_str).peekable();
    let mut entries = Vec::new();

    while let Some(header) = lines.next() {
        entries.push(parse_entry(header, &mut lines, raw)?);
    }

    Ok(entries)
}
