//! Statement command classification.
//!
//! Works on SQL text rather than AST variants so it can classify both
//! parsed-and-rendered statements and generated host SQL with one code path.

/// Identify the key SQL command of a statement, e.g. `CREATE SCHEMA`,
/// `SELECT`, `DROP TABLE`.
///
/// Used for status-string selection and for qualification-check messages.
pub fn key_command(sql: &str) -> String {
    let mut words = sql
        .split_whitespace()
        .map(|w| w.trim_end_matches(['(', ';']).to_uppercase());

    let first = match words.next() {
        Some(w) if !w.is_empty() => w,
        _ => return String::new(),
    };

    match first.as_str() {
        "CREATE" => {
            let mut kind = words.next().unwrap_or_default();
            // modifiers between CREATE and the object kind
            while matches!(
                kind.as_str(),
                "OR" | "REPLACE" | "TEMP" | "TEMPORARY" | "TRANSIENT" | "SECURE" | "MATERIALIZED"
            ) {
                kind = words.next().unwrap_or_default();
            }
            format!("CREATE {kind}")
        }
        "DROP" | "ALTER" | "USE" => {
            let kind = words.next().unwrap_or_default();
            format!("{first} {kind}")
        }
        "TRUNCATE" => "TRUNCATE TABLE".to_string(),
        "WITH" => "SELECT".to_string(),
        "BEGIN" | "START" => "BEGIN".to_string(),
        "DESC" => "DESCRIBE".to_string(),
        "COPY" => "COPY INTO".to_string(),
        _ => first,
    }
}

/// Extract the object name a DDL statement operates on, as Snowflake reports
/// it: the last path segment, quoted names verbatim, unquoted upper-cased.
///
/// `CREATE TABLE db1.schema1.t1 (...)` → `T1`
pub fn object_name(sql: &str) -> Option<String> {
    let token = object_token(sql)?;
    let last = split_object_parts(&token).pop()?;
    Some(if last.starts_with('"') && last.ends_with('"') && last.len() >= 2 {
        last[1..last.len() - 1].to_string()
    } else {
        last.to_uppercase()
    })
}

/// Count the path segments of the object name a DDL statement operates on.
///
/// `CREATE SCHEMA s1` → 1, `CREATE SCHEMA db1.s1` → 2, no name → 0.
pub fn object_name_parts(sql: &str) -> usize {
    object_token(sql)
        .map(|t| split_object_parts(&t).len())
        .unwrap_or(0)
}

fn object_token(sql: &str) -> Option<String> {
    let kind = key_command(sql);
    let mut rest = sql.trim_start();
    for _ in kind.split_whitespace() {
        rest = rest.trim_start();
        let end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest = rest.trim_start();
    loop {
        let upper = rest.to_uppercase();
        if let Some(stripped) = ["IF ", "NOT ", "EXISTS "]
            .iter()
            .find_map(|kw| upper.starts_with(kw).then(|| &rest[kw.len()..]))
        {
            rest = stripped.trim_start();
        } else {
            break;
        }
    }
    read_name_token(rest)
}

/// Read a (possibly qualified, possibly quoted) name token from the start of
/// `s`, stopping at whitespace or `(` outside quotes.
fn read_name_token(s: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = s.chars();
    let mut in_quotes = false;
    for c in chars.by_ref() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            c if !in_quotes && (c.is_whitespace() || c == '(' || c == ';') => break,
            c => out.push(c),
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Split a dotted object name into parts, keeping quotes on quoted parts.
pub fn split_object_parts(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in name.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
