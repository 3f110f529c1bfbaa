//! Turning option sets into git argument vectors

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// `true` emits the bare switch, `false` emits nothing
    Flag(bool),
    Value(String),
}

/// Ordered command options plus an optional stdin payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOptions {
    entries: Vec<(String, OptionValue)>,
    stdin: Option<String>,
}

fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}

impl GitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, name: &str, enabled: bool) -> Self {
        self.set(name, OptionValue::Flag(enabled));
        self
    }

    pub fn value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, OptionValue::Value(value.into()));
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Insert or replace an option, keeping the position of an existing entry
    pub fn set(&mut self, name: &str, value: OptionValue) {
        let name = normalize_name(name);
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.stdin.is_none()
    }

    /// Option switches in insertion order
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (name, value) in &self.entries {
            let short = name.chars().count() == 1;
            let switch = if short {
                format!("-{name}")
            } else {
                format!("--{name}")
            };

            match value {
                OptionValue::Flag(true) => args.push(switch),
                OptionValue::Flag(false) => {}
                OptionValue::Value(value) if short => {
                    args.push(switch);
                    args.push(value.clone());
                }
                OptionValue::Value(value) => args.push(format!("{switch}={value}")),
            }
        }
        args
    }

    /// `[subcommand, options..., positional...]` and the stdin payload
    pub fn serialize(&self, subcommand: &str, positional: &[&str]) -> (Vec<String>, Option<String>) {
        let mut args = vec![subcommand.to_string()];
        args.extend(self.to_args());
        args.extend(positional.iter().map(|arg| arg.to_string()));
        (args, self.stdin.clone())
    }
}
