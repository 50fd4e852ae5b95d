//! Engine option strings such as `Threads=2 Hash=64 "SyzygyPath=/tb"`.

use std::sync::OnceLock;

use regex::Regex;

/// Reads the value of `name=` from an option string.
///
/// Double-quoted, single-quoted and bare values are accepted, in that
/// order of preference.
pub fn extract_option(options: &str, name: &str) -> Option<String> {
    let name = regex::escape(name);
    let patterns = [
        format!(r#"(?:^|\s){}="([^"]*)""#, name),
        format!(r"(?:^|\s){}='([^']*)'", name),
        format!(r"(?:^|\s){}=(\S*)", name),
    ];

    patterns.iter().find_map(|pattern| {
        Regex::new(pattern)
            .ok()?
            .captures(options)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// `Threads=` of an option string; engines default to one thread.
pub fn option_threads(options: &str) -> u32 {
    extract_option(options, "Threads")
        .and_then(|v| v.parse().ok())
        .filter(|&t| t > 0)
        .unwrap_or(1)
}

/// Splits an option string on whitespace, keeping double-quoted runs intact.
pub fn tokenize_options(options: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r#""[^"]*"|\S+"#).expect("Valid regex"))
        .find_iter(options)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_value() {
        assert_eq!(extract_option("Threads=4 Hash=64", "Threads").as_deref(), Some("4"));
        assert_eq!(extract_option("Threads=4 Hash=64", "Hash").as_deref(), Some("64"));
        assert_eq!(extract_option("Threads=4", "Hash"), None);
    }

    #[test]
    fn test_extract_quoted_values() {
        let options = r#"Threads=1 "Eval File"=x SyzygyPath="/tb/a b" Name='my engine'"#;
        assert_eq!(extract_option(options, "SyzygyPath").as_deref(), Some("/tb/a b"));
        assert_eq!(extract_option(options, "Name").as_deref(), Some("my engine"));
    }

    #[test]
    fn test_extract_does_not_match_suffix() {
        assert_eq!(extract_option("MaxThreads=8 Threads=2", "Threads").as_deref(), Some("2"));
    }

    #[test]
    fn test_threads_default() {
        assert_eq!(option_threads("Hash=16"), 1);
        assert_eq!(option_threads("Threads=0"), 1);
        assert_eq!(option_threads("Threads=8 Hash=16"), 8);
    }

    #[test]
    fn test_tokenize_respects_quotes() {
        let tokens = tokenize_options(r#"Threads=1 "SyzygyPath=/a b" Hash=8"#);
        assert_eq!(tokens, vec!["Threads=1", "\"SyzygyPath=/a b\"", "Hash=8"]);
    }
}
