//! Line-window helpers shared by the source extractors.

use crate::core::lookback;

/// Forward window, in lines, for event bodies and handler method lookup.
pub const FORWARD_WINDOW: usize = 50;
/// How far above and below a handler match to look for its class declaration.
pub const CLASS_SEARCH_RADIUS: usize = 5;
/// Registration context spans this many lines before a match...
pub const REGISTRATION_LOOKBEHIND: usize = 10;
/// ...and this many after it.
pub const REGISTRATION_LOOKAHEAD: usize = 3;
/// Maximum non-blank lines copied into a handler body snippet.
pub const SNIPPET_MAX_LINES: usize = 15;

/// Read-only view over the lines of one unit.
#[derive(Debug, Clone, Copy)]
pub struct SourceWindow<'a> {
    lines: &'a [&'a str],
}

impl<'a> SourceWindow<'a> {
    pub fn new(lines: &'a [&'a str]) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&'a str> {
        self.lines.get(index).copied()
    }

    /// Lines from `before` above `index` to `after` below it, clamped to the unit.
    pub fn context(&self, index: usize, before: usize, after: usize) -> &'a [&'a str] {
        if self.lines.is_empty() {
            return &[];
        }
        let start = index.saturating_sub(before);
        let end = (index + after + 1).min(self.lines.len());
        if start >= end {
            return &[];
        }
        &self.lines[start..end]
    }

    /// Nearest line before `index`, at most `window` back, for which `project` yields a value.
    pub fn scan_backward<R, F>(&self, index: usize, window: usize, mut project: F) -> Option<R>
    where
        F: FnMut(&'a str) -> Option<R>,
    {
        lookback::find_map_nearest(self.lines, index, Some(window), |_, line| project(*line))
    }

    /// First line in `[from, from + window)` matching `predicate`.
    pub fn scan_forward<P>(&self, from: usize, window: usize, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&str) -> bool,
    {
        let end = from.saturating_add(window).min(self.lines.len());
        (from..end).find(|&i| predicate(self.lines[i]))
    }

    /// Search outward from `index`, nearest lines first (the line itself, then
    /// one above, one below, two above, ...), up to `radius` lines away.
    pub fn scan_around<R, F>(&self, index: usize, radius: usize, mut project: F) -> Option<R>
    where
        F: FnMut(&'a str) -> Option<R>,
    {
        for distance in 0..=radius {
            if let Some(found) = index
                .checked_sub(distance)
                .and_then(|i| self.line(i))
                .and_then(&mut project)
            {
                return Some(found);
            }
            if distance == 0 {
                continue;
            }
            if let Some(found) = self.line(index + distance).and_then(&mut project) {
                return Some(found);
            }
        }
        None
    }

    /// Whether the line at `index` sits inside a dependency-registration call:
    /// any line from ten above to three below mentions a registration keyword.
    pub fn in_registration_context(&self, index: usize, keywords: &[String]) -> bool {
        self.context(index, REGISTRATION_LOOKBEHIND, REGISTRATION_LOOKAHEAD)
            .iter()
            .any(|line| {
                keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .any(|k| line.contains(k.as_str()))
            })
    }

    /// Copy the body that follows a signature line: up to `max_lines` non-blank
    /// lines, ending with the brace that closes the body or before any closing
    /// brace that has no opener in the copied text.
    pub fn body_after(&self, signature: usize, max_lines: usize) -> Vec<String> {
        let mut snippet = Vec::new();
        let mut depth: i32 = brace_delta(self.line(signature).unwrap_or_default());
        let mut opened = depth > 0;

        for line in self.lines.iter().skip(signature + 1) {
            if snippet.len() >= max_lines {
                break;
            }
            let next_depth = depth + brace_delta(line);
            if next_depth < 0 {
                break;
            }
            if !line.trim().is_empty() {
                snippet.push(line.trim_end().to_string());
            }
            depth = next_depth;
            if line.contains('{') {
                opened = true;
            }
            if opened && depth == 0 {
                break;
            }
        }

        snippet
    }
}

fn brace_delta(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// True when the first `}` on the line has no `{` before it.
pub fn closes_block(line: &str) -> bool {
    match line.find('}') {
        Some(close) => !line[..close].contains('{'),
        None => false,
    }
}
