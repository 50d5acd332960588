//! Release descriptions that carry their own asset list.
//!
//! Backends without native asset storage keep uploads as a trailing
//! markdown section:
//!
//! ```text
//! Release notes...
//! Downloads:
//!  * [app.zip](/uploads/0a1b/app.zip)
//! ```

use regex::Regex;
use std::fmt::{self, Write};
use std::sync::OnceLock;

pub const DOWNLOADS_HEADER: &str = "Downloads:";

/// One `[name](uri)` bullet of the downloads section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    pub name: String,
    pub uri: String,
}

impl DownloadLink {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        DownloadLink {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

/// A release body split into free text and its downloads section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseBody {
    pub description: String,
    pub assets: Vec<DownloadLink>,
}

fn bullet_regex() -> &'static Regex {
    static BULLET: OnceLock<Regex> = OnceLock::new();
    BULLET.get_or_init(|| {
        Regex::new(
            r"^\s*\*\s*\[(?P<name>(?:[^\\\[\]]|\\.)+)\]\((?:<(?P<quoted>(?:[^\\<>]|\\.)*)>|(?P<bare>[^\s()<>\\]+))\)\s*$",
        )
        .expect("downloads bullet pattern is valid")
    })
}

/// Backslash-escape every char of `special` (and the backslash itself).
fn escape(text: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unescape(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => plain.extend(chars.next()),
            other => plain.push(other),
        }
    }
    plain
}

/// Link text with `[` and `]` escaped.
fn render_name(name: &str) -> String {
    escape(name, &['[', ']'])
}

/// Plain destination when it needs no quoting, otherwise `<...>` with `<`
/// and `>` escaped.
fn render_uri(uri: &str) -> String {
    let needs_brackets = uri.is_empty()
        || uri
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>' | '\\'));
    if needs_brackets {
        format!("<{}>", escape(uri, &['<', '>']))
    } else {
        uri.to_string()
    }
}

impl ReleaseBody {
    pub fn new(description: impl Into<String>, assets: Vec<DownloadLink>) -> Self {
        ReleaseBody {
            description: description.into(),
            assets,
        }
    }

    /// Split `text` at its last `Downloads:` line.
    ///
    /// The downloads section is that line plus the bullet lines directly
    /// following it; lines after the bullets stay part of the description.
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let Some(header) = lines.iter().rposition(|line| line.trim() == DOWNLOADS_HEADER) else {
            return ReleaseBody::new(text, Vec::new());
        };

        let mut assets = Vec::new();
        let mut end = header + 1;
        while let Some(caps) = lines.get(end).and_then(|line| bullet_regex().captures(line)) {
            let uri = match caps.name("quoted") {
                Some(quoted) => unescape(quoted.as_str()),
                None => caps["bare"].to_string(),
            };
            assets.push(DownloadLink::new(unescape(&caps["name"]), uri));
            end += 1;
        }

        let description = lines[..header]
            .iter()
            .chain(&lines[end..])
            .copied()
            .collect::<Vec<_>>()
            .join("\n");

        ReleaseBody {
            description,
            assets,
        }
    }

    pub fn find(&self, name: &str) -> Option<&DownloadLink> {
        self.assets.iter().find(|link| link.name == name)
    }

    /// Replace the link with the same name in place, or append it.
    pub fn upsert(&mut self, link: DownloadLink) {
        match self.assets.iter_mut().find(|existing| existing.name == link.name) {
            Some(existing) => *existing = link,
            None => self.assets.push(link),
        }
    }

    /// Drop the link with this name; true if one was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.assets.len();
        self.assets.retain(|link| link.name != name);
        self.assets.len() != before
    }
}

impl fmt::Display for ReleaseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = self.description.trim_end_matches('\n');
        if !description.is_empty() {
            f.write_str(description)?;
            f.write_char('\n')?;
        }
        if !self.assets.is_empty() {
            writeln!(f, "{}", DOWNLOADS_HEADER)?;
            for link in &self.assets {
                writeln!(f, " * [{}]({})", render_name(&link.name), render_uri(&link.uri))?;
            }
        }
        Ok(())
    }
}
