use regex::Regex;
use std::sync::OnceLock;

/// Running declaration context while scanning a unit top to bottom.
///
/// Each field holds the last declaration seen and is replaced only when a newer
/// declaration appears; closing braces never reset it. A fresh state is created
/// per unit, so nothing leaks between units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub namespace: Option<String>,
    pub current_class: Option<String>,
    pub current_method: Option<String>,
}

fn namespace_regex() -> &'static Regex {
    static NAMESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
    NAMESPACE_REGEX.get_or_init(|| {
        Regex::new(r"^\s*namespace\s+([\w.]+)").expect("Invalid namespace regex")
    })
}

fn type_regex() -> &'static Regex {
    static TYPE_REGEX: OnceLock<Regex> = OnceLock::new();
    TYPE_REGEX.get_or_init(|| {
        Regex::new(r"\b(?:class|interface|record|struct)\s+([A-Za-z_]\w*)")
            .expect("Invalid type declaration regex")
    })
}

fn method_regex() -> &'static Regex {
    static METHOD_REGEX: OnceLock<Regex> = OnceLock::new();
    METHOD_REGEX.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:public|private|protected|internal|static|async|virtual|override|sealed|abstract|extern|unsafe|partial)\s+)+(?:[\w.<>\[\],?]+\s+)?([A-Za-z_]\w*)\s*(?:<[^>()]*>)?\s*\(",
        )
        .expect("Invalid method signature regex")
    })
}

/// Class name declared on `line`, if any.
pub fn declared_type(line: &str) -> Option<String> {
    type_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after observing `line`.
    pub fn advance(&self, line: &str) -> ScanState {
        let mut next = self.clone();

        if let Some(caps) = namespace_regex().captures(line) {
            next.namespace = Some(caps[1].trim_end_matches(';').to_string());
            return next;
        }

        if let Some(name) = declared_type(line) {
            next.current_class = Some(name);
            return next;
        }

        if let Some(caps) = method_regex().captures(line) {
            next.current_method = Some(caps[1].to_string());
        }

        next
    }

    pub fn class_or_unknown(&self) -> String {
        self.current_class
            .clone()
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn method_or_unknown(&self) -> String {
        self.current_method
            .clone()
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
