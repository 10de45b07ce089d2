use crate::models::HostRecord;
use std::str::Lines;

/// Split a config line into its keyword and the rest of the line.
///
/// Accepts both `Key Value` and `Key=Value`. Returns `None` for blank and
/// comment lines; the value may be empty.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let key_end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let (key, rest) = line.split_at(key_end);
    let rest = rest.trim_start();
    let value = rest.strip_prefix('=').unwrap_or(rest).trim();

    Some((key, value))
}

fn is_pattern(name: &str) -> bool {
    name.contains('*') || name.contains('?') || name.starts_with('!')
}

/// Whether the text contains at least one `Host <name>` line
pub fn looks_like_ssh_config(content: &str) -> bool {
    content.lines().any(|line| {
        matches!(
            split_directive(line),
            Some((key, value)) if key.eq_ignore_ascii_case("host") && !value.is_empty()
        )
    })
}

/// Parse SSH config text into host records.
///
/// The returned iterator is lazy; calling this again on the same text yields
/// the same sequence.
pub fn parse_ssh_config(content: &str) -> HostBlocks<'_> {
    HostBlocks {
        lines: content.lines(),
        current: None,
    }
}

pub struct HostBlocks<'a> {
    lines: Lines<'a>,
    // `None` while outside a usable host block (before the first `Host`,
    // after a `Match`, or inside a pattern block)
    current: Option<HostRecord>,
}

impl HostBlocks<'_> {
    /// Start a new block from a `Host` line, returning the block it closes
    fn open_block(&mut self, value: &str) -> Option<HostRecord> {
        let closed = self.current.take();

        let mut tokens = value.split_whitespace();
        let Some(name) = tokens.next() else {
            tracing::warn!("Ignoring `Host` line without a name");
            return closed;
        };

        let extra: Vec<&str> = tokens.collect();
        if !extra.is_empty() {
            tracing::warn!(
                "Host '{}': ignoring additional patterns {:?}",
                name,
                extra
            );
        }

        if is_pattern(name) {
            tracing::debug!("Skipping pattern host '{}'", name);
        } else {
            self.current = Some(HostRecord::new(name));
        }

        closed
    }
}

impl Iterator for HostBlocks<'_> {
    type Item = HostRecord;

    fn next(&mut self) -> Option<HostRecord> {
        while let Some(line) = self.lines.next() {
            let Some((key, value)) = split_directive(line) else {
                continue;
            };

            if key.eq_ignore_ascii_case("host") {
                if let Some(closed) = self.open_block(value) {
                    return Some(closed);
                }
            } else if key.eq_ignore_ascii_case("match") {
                if let Some(closed) = self.current.take() {
                    return Some(closed);
                }
            } else if let Some(host) = &mut self.current {
                if !value.is_empty() {
                    host.set(key, value);
                }
            }
        }

        self.current.take()
    }
}
