use serde::Serialize;
use std::fmt;

/// A `key: value` line from the header region of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderLine {
    /// Header key (e.g., "Type", "Size in memory")
    pub key: String,
    /// Everything after the first colon, trimmed
    pub value: String,
}

impl HeaderLine {
    /// Split a raw header line on its first colon
    pub fn parse(line: &str) -> Self {
        match line.split_once(':') {
            Some((key, value)) => HeaderLine {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => HeaderLine {
                key: line.trim().to_string(),
                value: String::new(),
            },
        }
    }
}

impl fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

/// A named token trailing a member value or inside the flag header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub name: String,
    /// `None` for bare flags such as `nomatch` or `counters`
    pub value: Option<String>,
}

/// One member line: the primary value and its option tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEntry {
    /// Address, network, port or tuple the member describes
    pub primary: String,
    pub options: Vec<Token>,
    /// The line as it appeared in the listing
    pub raw: String,
}

impl MemberEntry {
    /// Parse a member line. `valueless` names the option tokens that are
    /// bare flags.
    pub fn parse(line: &str, valueless: &[String]) -> Self {
        let raw = line.trim();
        let words = split_preserving_quotes(raw);
        let (primary, rest) = match words.split_first() {
            Some((first, rest)) => (first.clone(), rest),
            None => (String::new(), &[][..]),
        };

        MemberEntry {
            primary,
            options: pair_tokens(rest, valueless),
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for MemberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One set's full listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    pub name: String,
    pub header_lines: Vec<HeaderLine>,
    pub member_lines: Vec<MemberEntry>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Block {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Value of the first header line with this exact key
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header_lines
            .iter()
            .find(|line| line.key == key)
            .map(|line| line.value.as_str())
    }
}

/// Split the value of the flag header line into tokens
pub fn parse_flag_tokens(value: &str, valueless: &[String]) -> Vec<Token> {
    pair_tokens(&split_preserving_quotes(value), valueless)
}

/// Pair up words as name/value tokens. Names listed in `valueless` stand
/// alone; every other name takes the following word as its value.
fn pair_tokens(words: &[String], valueless: &[String]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut iter = words.iter();

    while let Some(name) = iter.next() {
        let value = if valueless.iter().any(|flag| flag == name) {
            None
        } else {
            iter.next().cloned()
        };
        tokens.push(Token {
            name: name.clone(),
            value,
        });
    }

    tokens
}

/// Split a string by whitespace while keeping double-quoted segments
/// together. The quotes themselves are dropped.
fn split_preserving_quotes(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    parts.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        parts.push(current);
    }

    parts
}
