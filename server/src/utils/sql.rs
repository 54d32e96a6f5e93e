//! SQL text helpers for DuckDB statements
//!
//! Values always travel as bound parameters; these helpers cover the pieces that
//! cannot be bound (identifiers, JSON paths) and LIKE patterns.

/// Escape LIKE metacharacters (`%`, `_`, `\`) for use with `ESCAPE '\'`
///
/// ```
/// use spanlens_server::utils::sql::escape_like_pattern;
///
/// assert_eq!(escape_like_pattern("100% match_test"), "100\\% match\\_test");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Substring pattern: `%<escaped>%`
pub fn contains_pattern(s: &str) -> String {
    format!("%{}%", escape_like_pattern(s))
}

/// Double-quoted identifier, embedded quotes doubled
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// String literal holding the JSON path of a top-level key.
///
/// The key is quoted inside the path so dotted keys (`http.route`) are not
/// read as nested lookups.
pub fn json_key_path(key: &str) -> String {
    let key = key.replace('\\', "\\\\").replace('"', "\\\"");
    format!("'$.\"{}\"'", key.replace('\'', "''"))
}
