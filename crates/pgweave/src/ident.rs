//! SQL identifier quoting.
//!
//! Table and column names are opaque identifiers and are emitted
//! double-quoted. Dotted references (`table.col`) are split on `.` and each
//! part is quoted independently, so `users.id` renders as `"users"."id"`.

/// Quote a plain identifier, doubling any embedded double quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Quote a possibly dotted column reference.
pub(crate) fn quote_column(reference: &str) -> String {
    reference
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a selection expression.
///
/// Expressions containing `(`, a space, or starting with `"` pass through
/// unquoted so callers can write aggregates like `COUNT(*) AS total`
/// inline; a lone `*` passes through as well. Everything else is treated as
/// a (possibly dotted) column reference.
pub(crate) fn quote_expr(expr: &str) -> String {
    if expr == "*" || expr.contains('(') || expr.contains(' ') || expr.starts_with('"') {
        return expr.to_string();
    }
    quote_column(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_are_quoted() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_expr("id"), "\"id\"");
    }

    #[test]
    fn dotted_references_quote_each_part() {
        assert_eq!(quote_column("users.id"), "\"users\".\"id\"");
        assert_eq!(quote_expr("orders.total"), "\"orders\".\"total\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn aggregates_and_star_pass_through() {
        assert_eq!(quote_expr("*"), "*");
        assert_eq!(quote_expr("COUNT(*) AS total"), "COUNT(*) AS total");
        assert_eq!(quote_expr("price * qty"), "price * qty");
        assert_eq!(quote_expr("\"already\""), "\"already\"");
    }
}
