//! Static content rules and syntax checker table

use std::sync::LazyLock;

use regex::Regex;

/// An option that still parses but is deprecated or removed upstream.
#[derive(Debug)]
pub struct DeprecatedOption {
    /// Component name fragments the rule applies to
    pub areas: &'static [&'static str],
    pub option: &'static str,
    pattern: &'static str,
    pub suggestion: &'static str,
}

const DATABASE: &[&str] = &["mysql", "mariadb", "my.cnf"];

pub const DEPRECATED_OPTIONS: &[DeprecatedOption] = &[
    DeprecatedOption {
        areas: DATABASE,
        option: "query_cache_size",
        pattern: r"^\s*query[_-]cache[_-]size\s*(=|$)",
        suggestion: "The query cache was removed in MySQL 8.0; delete this option",
    },
    DeprecatedOption {
        areas: DATABASE,
        option: "query_cache_type",
        pattern: r"^\s*query[_-]cache[_-]type\s*(=|$)",
        suggestion: "The query cache was removed in MySQL 8.0; delete this option",
    },
    DeprecatedOption {
        areas: DATABASE,
        option: "log_warnings",
        pattern: r"^\s*log[_-]warnings\s*(=|$)",
        suggestion: "Use log_error_verbosity instead",
    },
    DeprecatedOption {
        areas: &["nginx"],
        option: "ssl on",
        pattern: r"^\s*ssl\s+on\s*;",
        suggestion: "Use the 'ssl' parameter of the listen directive instead",
    },
    DeprecatedOption {
        areas: &["ssh"],
        option: "Protocol",
        pattern: r"^\s*Protocol\s+\S+",
        suggestion: "Only protocol 2 is supported; delete this option",
    },
];

/// Compiled patterns, index-aligned with [`DEPRECATED_OPTIONS`].
static DEPRECATED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEPRECATED_OPTIONS
        .iter()
        .filter_map(|rule| Regex::new(rule.pattern).ok())
        .collect()
});

static MALFORMED_MAX_CONNECTIONS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*max[_-]connection\s*=").ok());

impl DeprecatedOption {
    pub fn applies_to(&self, component: &str) -> bool {
        let lower = component.to_lowercase();
        self.areas.iter().any(|area| lower.contains(area))
    }
}

/// Whether `component` names a database configuration area.
pub fn is_database_area(component: &str) -> bool {
    let lower = component.to_lowercase();
    DATABASE.iter().any(|area| lower.contains(area))
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

/// Line numbers (1-based) carrying the malformed `max_connection` directive.
pub fn find_malformed_directive(content: &str) -> Vec<usize> {
    let Some(re) = MALFORMED_MAX_CONNECTIONS.as_ref() else {
        return Vec::new();
    };
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !is_comment(line) && re.is_match(line))
        .map(|(i, _)| i + 1)
        .collect()
}

/// `(rule, line)` pairs for deprecated options found in `content`.
pub fn find_deprecated(component: &str, content: &str) -> Vec<(&'static DeprecatedOption, usize)> {
    let mut hits = Vec::new();
    for (rule, re) in DEPRECATED_OPTIONS.iter().zip(DEPRECATED_PATTERNS.iter()) {
        if !rule.applies_to(component) {
            continue;
        }
        for (i, line) in content.lines().enumerate() {
            if !is_comment(line) && re.is_match(line) {
                hits.push((rule, i + 1));
            }
        }
    }
    hits
}

/// External tool that can verify a component's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxChecker {
    pub areas: &'static [&'static str],
    pub tool: &'static str,
    pub args: &'static [&'static str],
}

pub const SYNTAX_CHECKERS: &[SyntaxChecker] = &[
    SyntaxChecker {
        areas: &["nginx"],
        tool: "nginx",
        args: &["-t"],
    },
    SyntaxChecker {
        areas: &["apache2", "httpd"],
        tool: "apachectl",
        args: &["configtest"],
    },
    SyntaxChecker {
        areas: &["ssh"],
        tool: "sshd",
        args: &["-t"],
    },
    SyntaxChecker {
        areas: DATABASE,
        tool: "mysqld",
        args: &["--validate-config"],
    },
];

/// Checker responsible for `component`, if any.
pub fn checker_for(component: &str) -> Option<&'static SyntaxChecker> {
    let lower = component.to_lowercase();
    SYNTAX_CHECKERS
        .iter()
        .find(|checker| checker.areas.iter().any(|area| lower.contains(area)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_deprecated_pattern_compiles() {
        assert_eq!(DEPRECATED_PATTERNS.len(), DEPRECATED_OPTIONS.len());
    }

    #[test]
    fn malformed_directive_ignores_correct_spelling_and_comments() {
        let content = "[mysqld]\nmax_connections = 200\n# max_connection = 1\nmax_connection = 100\n";
        assert_eq!(find_malformed_directive(content), vec![4]);
    }

    #[test]
    fn deprecated_options_are_scoped_to_their_area() {
        let content = "query_cache_size = 0\nssl on;\n";
        let mysql: Vec<_> = find_deprecated("mysql", content)
            .into_iter()
            .map(|(rule, line)| (rule.option, line))
            .collect();
        assert_eq!(mysql, vec![("query_cache_size", 1)]);

        let nginx: Vec<_> = find_deprecated("nginx", content)
            .into_iter()
            .map(|(rule, line)| (rule.option, line))
            .collect();
        assert_eq!(nginx, vec![("ssl on", 2)]);
    }

    #[test]
    fn checker_lookup() {
        assert_eq!(checker_for("nginx").map(|c| c.tool), Some("nginx"));
        assert_eq!(checker_for("httpd").map(|c| c.tool), Some("apachectl"));
        assert_eq!(checker_for("mariadb").map(|c| c.tool), Some("mysqld"));
        assert!(checker_for("redis").is_none());
    }
}
