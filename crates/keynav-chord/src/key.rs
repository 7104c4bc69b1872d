//! Key token regulation.
//!
//! Every key press becomes a canonical token string before it reaches a
//! [`ChordMapper`](crate::ChordMapper):
//!
//! - printable characters stand for themselves (`a`, `G`, `/`); a Shift
//!   modifier is folded into the character
//! - named keys and modified keys use angle brackets (`<Esc>`, `<CR>`,
//!   `<C-a>`, `<C-S-Tab>`), with modifiers always in `C-A-M-S` order
//! - space and `<` are spelled `<Space>` and `<lt>` so sequences stay
//!   unambiguous
//!
//! Key sequences in settings use the same notation, so `parse_sequence("gg")`
//! and two regulated `g` presses produce identical token lists.

use thiserror::Error;

/// Modifier state of a key event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct Modifiers {
    /// Control.
    pub ctrl: bool,
    /// Alt / Option.
    pub alt: bool,
    /// Meta / Command.
    pub meta: bool,
    /// Shift.
    pub shift: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        meta: false,
        shift: false,
    };

    /// Control only.
    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    /// Whether no modifier is held.
    pub const fn is_empty(self) -> bool {
        !(self.ctrl || self.alt || self.meta || self.shift)
    }
}

/// A key sequence string from settings that cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KeySequenceError {
    /// The sequence string is empty.
    #[error("empty key sequence")]
    Empty,
    /// A `<` has no closing `>`.
    #[error("unterminated '<' in key sequence '{input}'")]
    Unterminated {
        /// The full sequence string.
        input: String,
    },
    /// A modifier letter other than `C`, `A`, `M` or `S`.
    #[error("unknown modifier '{modifier}' in key sequence '{input}'")]
    UnknownModifier {
        /// Offending modifier.
        modifier: String,
        /// The full sequence string.
        input: String,
    },
    /// A bracketed key name that is not recognised.
    #[error("unknown key '<{key}>' in key sequence '{input}'")]
    UnknownKey {
        /// Offending key name.
        key: String,
        /// The full sequence string.
        input: String,
    },
}

/// Named keys: canonical spelling and accepted aliases (lowercase).
///
/// Aliases include the DOM `KeyboardEvent.key` names so the same table
/// serves [`regulate`] and [`parse_sequence`].
const NAMED_KEYS: &[(&str, &[&str])] = &[
    ("CR", &["cr", "enter", "return"]),
    ("Esc", &["esc", "escape"]),
    ("Tab", &["tab"]),
    ("Space", &["space", "spacebar"]),
    ("BS", &["bs", "backspace"]),
    ("Del", &["del", "delete"]),
    ("Insert", &["insert", "ins"]),
    ("Up", &["up", "arrowup"]),
    ("Down", &["down", "arrowdown"]),
    ("Left", &["left", "arrowleft"]),
    ("Right", &["right", "arrowright"]),
    ("Home", &["home"]),
    ("End", &["end"]),
    ("PageUp", &["pageup"]),
    ("PageDown", &["pagedown"]),
    ("lt", &["lt"]),
];

/// Keys that only change modifier state and never form a token.
const MODIFIER_KEYS: &[&str] = &[
    "Shift", "Control", "Alt", "AltGraph", "Meta", "OS", "CapsLock", "Fn",
];

fn canonical_name(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    if let Some((canonical, _)) = NAMED_KEYS
        .iter()
        .find(|(_, aliases)| aliases.contains(&lower.as_str()))
    {
        return Some((*canonical).to_string());
    }
    let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&n).then(|| format!("F{n}"))
}

fn format_token(mods: Modifiers, key: &str) -> String {
    let mut out = String::from("<");
    if mods.ctrl {
        out.push_str("C-");
    }
    if mods.alt {
        out.push_str("A-");
    }
    if mods.meta {
        out.push_str("M-");
    }
    if mods.shift {
        out.push_str("S-");
    }
    out.push_str(key);
    out.push('>');
    out
}

fn printable_token(c: char, mods: Modifiers) -> String {
    let mut mods = mods;
    let mut c = c;
    if mods.shift {
        mods.shift = false;
        if c.is_lowercase() {
            c = c.to_uppercase().next().unwrap_or(c);
        }
    }
    match c {
        ' ' => format_token(mods, "Space"),
        '<' => format_token(mods, "lt"),
        _ if mods.is_empty() => c.to_string(),
        _ => format_token(mods, &c.to_string()),
    }
}

fn named_token(name: &str, mods: Modifiers) -> String {
    match name {
        "Space" => printable_token(' ', mods),
        "lt" => printable_token('<', mods),
        _ => format_token(mods, name),
    }
}

/// Turn a key event into its canonical token.
///
/// `key` is the key's value as the page reports it (`"a"`, `"A"`,
/// `"Enter"`, `"ArrowDown"`). Returns `None` for bare modifier presses and
/// keys with no token form.
pub fn regulate(key: &str, mods: Modifiers) -> Option<String> {
    if MODIFIER_KEYS.contains(&key) {
        return None;
    }
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if !c.is_control() {
            return Some(printable_token(c, mods));
        }
    }
    let name = canonical_name(key)?;
    Some(named_token(&name, mods))
}

fn parse_bracket(body: &str, input: &str) -> Result<String, KeySequenceError> {
    let mut mods = Modifiers::NONE;
    let mut rest = body;
    while rest.len() > 2 && rest.as_bytes()[1] == b'-' {
        let modifier = char::from(rest.as_bytes()[0]);
        match modifier.to_ascii_uppercase() {
            'C' => mods.ctrl = true,
            'A' => mods.alt = true,
            'M' => mods.meta = true,
            'S' => mods.shift = true,
            _ => {
                return Err(KeySequenceError::UnknownModifier {
                    modifier: modifier.to_string(),
                    input: input.to_string(),
                });
            }
        }
        rest = &rest[2..];
    }

    let mut chars = rest.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(printable_token(c, mods));
    }
    canonical_name(rest)
        .map(|name| named_token(&name, mods))
        .ok_or_else(|| KeySequenceError::UnknownKey {
            key: rest.to_string(),
            input: input.to_string(),
        })
}

/// Parse a key sequence string such as `gg`, `<C-w>h` or `<Space>f` into
/// canonical tokens.
pub fn parse_sequence(input: &str) -> Result<Vec<String>, KeySequenceError> {
    if input.is_empty() {
        return Err(KeySequenceError::Empty);
    }
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        if c == '<' {
            let after = &rest[1..];
            let end = after
                .find('>')
                .ok_or_else(|| KeySequenceError::Unterminated {
                    input: input.to_string(),
                })?;
            tokens.push(parse_bracket(&after[..end], input)?);
            rest = &after[end + 1..];
        } else {
            tokens.push(printable_token(c, Modifiers::NONE));
            rest = &rest[c.len_utf8()..];
        }
    }
    Ok(tokens)
}
