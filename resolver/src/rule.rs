//! Parser for Traefik routing-rule expressions.
//!
//! The grammar is a tree of `Predicate(args)` terms joined by `&&`/`||`.
//! Only `Host`, `Path` and `PathPrefix` predicates matter here; everything
//! else is scanned over. The parser is resilient, not strict: malformed or
//! unmatched predicates contribute no entries.

/// One `Name(...)` occurrence with the raw text between its parentheses.
#[derive(Debug, PartialEq, Eq)]
struct Predicate<'a> {
    name: &'a str,
    args: &'a str,
}

/// Scans a rule for `Identifier(...)` occurrences, capturing the argument
/// text up to the matching close paren. Parens inside backtick or
/// double-quoted literals do not count towards nesting. An identifier whose
/// paren never closes is dropped.
fn scan_predicates(rule: &str) -> Vec<Predicate<'_>> {
    let bytes = rule.as_bytes();
    let mut predicates = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
            i += 1;
        }

        if i >= bytes.len() || bytes[i] != b'(' {
            continue;
        }

        match capture_args(bytes, i) {
            Some(end) => {
                predicates.push(Predicate {
                    name: &rule[start..i],
                    args: &rule[i + 1..end],
                });
                i = end + 1;
            }
            None => i += 1,
        }
    }

    predicates
}

/// Returns the index of the close paren matching the open paren at `open`.
fn capture_args(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'`' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }

    None
}

/// Strips whitespace, line breaks and quoting characters, then lowercases.
fn normalize(args: &str) -> String {
    args.chars()
        .filter(|c| !c.is_whitespace() && *c != '`' && *c != '"')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Extracts all hostnames matched by the rule's `Host(...)` predicates.
///
/// Alternation inside one predicate may be written with `||` or comma.
/// Multiple `Host` occurrences (e.g. joined by `&&`) contribute the union
/// of their hostnames in first-seen order.
pub fn parse_hosts(rule: &str) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();

    for predicate in scan_predicates(rule) {
        if predicate.name != "Host" {
            continue;
        }

        let normalized = normalize(predicate.args);
        for host in normalized.split(',').flat_map(|part| part.split("||")) {
            if host.is_empty() {
                continue;
            }
            if !hosts.iter().any(|seen| seen == host) {
                hosts.push(host.to_string());
            }
        }
    }

    hosts
}

/// Extracts the path prefixes matched by `Path(...)` and `PathPrefix(...)`
/// predicates, each taking one backtick-quoted literal. A rule without any
/// path predicate yields exactly `["/"]`.
pub fn parse_paths(rule: &str) -> Vec<String> {
    let mut paths = Vec::new();

    for predicate in scan_predicates(rule) {
        if predicate.name != "Path" && predicate.name != "PathPrefix" {
            continue;
        }
        if let Some(literal) = first_quoted_literal(predicate.args) {
            paths.push(literal.to_string());
        }
    }

    if paths.is_empty() {
        paths.push("/".to_string());
    }

    paths
}

fn first_quoted_literal(args: &str) -> Option<&str> {
    let start = args.find('`')?;
    let rest = &args[start + 1..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}
