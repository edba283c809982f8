//! Injection guard: literal escaping and keyword-injection heuristics.
//!
//! Values are interpolated into SQL text as literals, so every user-originated
//! string must pass through exactly one of the escapers below. Escaping is not
//! idempotent: escaping twice doubles every backslash.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static SQL_SYNTAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(insert|delete|update|select|create|drop|truncate|grant|alter|deny|revoke|call|execute|exec|declare|show|rename|set)\s+.*(into|from|set|where|table|database|view|index|on|cursor|procedure|trigger|for|password|union|and|or)|(select\s*\*\s*from\s+)|(and|or)\s+.*",
    )
    .expect("static regex must compile")
});

static SQL_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)'.*(or|union|--|#|/\*|;)").expect("static regex must compile")
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'(.+)'$").expect("static regex must compile"));

fn needs_escape(c: char) -> bool {
    matches!(c, '\0' | '\n' | '\r' | '\\' | '\'' | '"' | '\x1a')
}

/// Escape control and quote characters with backslash sequences. No quotes are added.
///
/// Strings without any of `NUL`, `\n`, `\r`, `\`, `'`, `"` or Ctrl-Z are
/// returned borrowed and unchanged.
pub fn escape_raw_string(input: &str) -> Cow<'_, str> {
    if !input.chars().any(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut buf = String::with_capacity(input.len() + input.len() / 10 + 1);
    for c in input.chars() {
        match c {
            '\0' => buf.push_str("\\0"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\\' => buf.push_str("\\\\"),
            '\'' => buf.push_str("\\'"),
            '"' => buf.push_str("\\\""),
            '\x1a' => buf.push_str("\\Z"),
            c => buf.push(c),
        }
    }
    Cow::Owned(buf)
}

/// Escape a string and wrap it in single quotes.
///
/// One layer of pre-existing surrounding single quotes is stripped first, so
/// `'bob'` and `bob` both render as `'bob'`.
pub fn escape_string(input: &str) -> String {
    let inner = match QUOTED_RE.captures(input).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => input,
    };
    format!("'{}'", escape_raw_string(inner))
}

/// Heuristic keyword/comment injection detector.
///
/// Returns `true` when the value looks like DML/DDL (`select * from ...`,
/// `drop table ...`), a boolean tautology tail (`or 1=1`), or a quote followed
/// by a comment/union/statement terminator. This is not a parser: encoded or
/// obfuscated payloads slip through, and ordinary prose such as
/// `"salt and pepper"` is flagged. Never treat a `false` as proof of safety.
pub fn check(value: &str) -> bool {
    SQL_COMMENT_RE.is_match(value) || SQL_SYNTAX_RE.is_match(value)
}

/// Strip every single and double quote.
pub fn remove_escape_character(text: &str) -> String {
    text.replace(['"', '\''], "")
}

/// Standard-SQL escaping: quotes are doubled rather than backslashed.
pub fn escape_sql(input: &str) -> String {
    // Backslash first so later replacements are not re-escaped.
    input
        .replace('\\', "\\\\")
        .replace('\0', "\\0")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\x1a', "\\Z")
        .replace('\'', "''")
        .replace('"', "\\\"")
}

/// Escape a value for use inside a `LIKE` pattern.
///
/// `%` and `_` are prefixed with `escape_char`; the generated clause must carry
/// `ESCAPE '<escape_char>'`.
pub fn escape_sql_for_like(input: &str, escape_char: char) -> String {
    let escaped = escape_sql(input);
    let mut out = String::with_capacity(escaped.len());
    for c in escaped.chars() {
        if c == '%' || c == '_' {
            out.push(escape_char);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_string_unchanged_without_specials() {
        let s = "plain ascii and ünïcødé 漢字";
        assert!(matches!(escape_raw_string(s), Cow::Borrowed(_)));
        assert_eq!(escape_raw_string(s), s);
    }

    #[test]
    fn test_raw_string_escapes_every_special() {
        assert_eq!(
            escape_raw_string("a\0b\nc\rd\\e'f\"g\x1ah"),
            "a\\0b\\nc\\rd\\\\e\\'f\\\"g\\Zh"
        );
    }

    #[test]
    fn test_raw_string_is_not_idempotent() {
        let once = escape_raw_string("a\\b").into_owned();
        let twice = escape_raw_string(&once).into_owned();
        assert_eq!(once, "a\\\\b");
        assert_eq!(twice, "a\\\\\\\\b");
    }

    #[test]
    fn test_escape_string_wraps_and_strips_one_layer() {
        assert_eq!(escape_string("bob"), "'bob'");
        assert_eq!(escape_string("'bob'"), "'bob'");
        assert_eq!(escape_string("''bob''"), "'\\'bob\\''");
        assert_eq!(escape_string("o'neil"), "'o\\'neil'");
        assert_eq!(escape_string("'"), "'\\''");
        assert_eq!(escape_string(""), "''");
    }

    #[test]
    fn test_check_flags_injection() {
        assert!(check("SELECT * FROM users"));
        assert!(check("drop table users"));
        assert!(check("1 or 1=1"));
        assert!(check("x' --"));
        assert!(check("abc'; delete"));
    }

    #[test]
    fn test_check_passes_plain_text() {
        assert!(!check("hello world"));
        assert!(!check("jetty"));
        assert!(!check("42"));
    }

    #[test]
    fn test_escape_sql_doubles_quotes() {
        assert_eq!(escape_sql("it's"), "it''s");
        assert_eq!(escape_sql("a\\b"), "a\\\\b");
        assert_eq!(escape_sql("say \"hi\""), "say \\\"hi\\\"");
    }

    #[test]
    fn test_escape_for_like() {
        assert_eq!(escape_sql_for_like("100%_off", '\\'), "100\\%\\_off");
        assert_eq!(escape_sql_for_like("a_b", '!'), "a!_b");
        assert_eq!(escape_sql_for_like("it's 5%", '!'), "it''s 5!%");
    }

    #[test]
    fn test_remove_escape_character() {
        assert_eq!(remove_escape_character("'a\"b'"), "ab");
    }
}
