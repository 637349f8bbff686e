//! Input screening for chat messages.
//!
//! Two independent checks: the danger filter runs on the raw message at the
//! HTTP boundary and rejects it outright; the sanitizer strips comment and
//! statement markers from whatever reaches the model.

use regex::Regex;
use std::sync::LazyLock;

pub const DANGEROUS_KEYWORDS: [&str; 13] = [
    "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE", "SHUTDOWN", "KILL",
];

const STRIPPED_MARKERS: [&str; 6] = [";", "--", "/*", "*/", "xp_", "sp_"];

const DANGEROUS_PATTERN_SRC: &str = r"\b(DELETE|DROP|TRUNCATE|ALTER|CREATE|INSERT|UPDATE|EXEC|EXECUTE|GRANT|REVOKE|SHUTDOWN|KILL)\b";

// Constant pattern; compiling it cannot fail.
static DANGEROUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DANGEROUS_PATTERN_SRC).expect("danger filter pattern compiles"));

/// Remove every stripped marker, then trim.
///
/// Removal repeats until nothing changes, so `-;-` cannot collapse into a
/// fresh `--`.
pub fn sanitize_input(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = STRIPPED_MARKERS
            .iter()
            .fold(current.clone(), |acc, marker| acc.replace(marker, ""));
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

pub fn is_dangerous_query(query: &str) -> bool {
    dangerous_keyword(query).is_some()
}

/// The first denylisted keyword that appears as a whole word, in any case.
pub fn dangerous_keyword(query: &str) -> Option<&'static str> {
    if query.trim().is_empty() {
        return None;
    }
    let upper = query.to_uppercase();
    let found = DANGEROUS_PATTERN.captures(&upper)?.get(1)?.as_str();
    DANGEROUS_KEYWORDS.into_iter().find(|kw| *kw == found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_covers_exactly_the_keyword_list() {
        assert_eq!(
            DANGEROUS_PATTERN_SRC,
            format!(r"\b({})\b", DANGEROUS_KEYWORDS.join("|"))
        );
    }

    #[test]
    fn keywords_match_as_whole_words_in_any_case() {
        assert_eq!(dangerous_keyword("DELETE all users"), Some("DELETE"));
        assert_eq!(dangerous_keyword("please drop the orders table"), Some("DROP"));
        assert_eq!(dangerous_keyword("Exec sp_who"), Some("EXEC"));
        assert_eq!(dangerous_keyword("execute this"), Some("EXECUTE"));
        assert_eq!(dangerous_keyword("users;DELETE"), Some("DELETE"));
        for kw in DANGEROUS_KEYWORDS {
            assert!(is_dangerous_query(&format!("x {} y", kw.to_lowercase())), "{kw}");
        }
    }

    #[test]
    fn substrings_of_longer_words_are_not_dangerous() {
        for query in [
            "How many orders were UPDATED last week?",
            "show created_at for recent users",
            "who are the top executives by spend",
            "dropdown totals",
            "skilled customers",
            "",
        ] {
            assert!(!is_dangerous_query(query), "{query}");
        }
    }

    #[test]
    fn sanitize_strips_markers_and_trims() {
        assert_eq!(sanitize_input("  how many users; -- now  "), "how many users  now");
        assert_eq!(sanitize_input("/* hi */ sales"), "hi  sales");
        assert_eq!(sanitize_input("run xp_cmdshell and sp_who"), "run cmdshell and who");
        assert_eq!(sanitize_input(";;--"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["-;-", "x/;*y", "sp;_", "x_p_", " plain question ", "a--;--b"] {
            let once = sanitize_input(input);
            assert_eq!(sanitize_input(&once), once, "{input:?}");
            for marker in STRIPPED_MARKERS {
                assert!(!once.contains(marker), "{input:?} kept {marker}");
            }
        }
    }
}
