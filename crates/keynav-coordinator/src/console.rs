//! Console line parsing and command name resolution.

/// A parsed console line: `[count]name [args]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Leading repeat count.
    pub count: Option<u32>,
    /// Command name as typed.
    pub name: String,
    /// Everything after the name, trimmed.
    pub args: String,
}

/// Split a console line. Blank input (or a bare count) yields `None`.
pub fn parse_line(line: &str) -> Option<ConsoleLine> {
    let line = line.trim();
    let digits = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    let (count, rest) = line.split_at(digits);
    let count = if count.is_empty() {
        None
    } else {
        Some(count.parse().unwrap_or(u32::MAX))
    };

    let rest = rest.trim_start();
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(ConsoleLine {
        count,
        name: name.to_string(),
        args: args.to_string(),
    })
}

/// How typed input maps onto the known command names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly a command name.
    Exact(String),
    /// A prefix of exactly one command name.
    Prefix(String),
    /// A prefix of several names, sorted.
    Ambiguous(Vec<String>),
    /// Matches nothing.
    Unknown,
}

/// Resolve `input` against `names`. An exact match wins; otherwise a
/// case-insensitive prefix must pick out a single name.
pub fn resolve<S: AsRef<str>>(names: &[S], input: &str) -> Resolution {
    if let Some(exact) = names.iter().find(|n| n.as_ref() == input) {
        return Resolution::Exact(exact.as_ref().to_string());
    }
    let needle = input.to_lowercase();
    let mut matches: Vec<String> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|n| n.to_lowercase().starts_with(&needle))
        .map(str::to_string)
        .collect();
    matches.sort();
    matches.dedup();
    match matches.len() {
        0 => Resolution::Unknown,
        1 => Resolution::Prefix(matches.remove(0)),
        _ => Resolution::Ambiguous(matches),
    }
}
