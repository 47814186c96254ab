//! COPY INTO analysis.
//!
//! Parses the load statement into a [`CopyInto`] plan: target, source,
//! explicit file list, file format, and the FORCE/PURGE/ON_ERROR options.
//! Execution (stage resolution, globbing, load history) lives in the engine;
//! this module only decides *what* to load and how each file reads.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{SqlError, SqlResult};
use crate::ident::IdentPart;

/// File format driving the host reader function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    Csv {
        skip_header: bool,
        quote: Option<String>,
        delimiter: Option<String>,
    },
    Parquet,
}

impl Default for FileFormat {
    fn default() -> Self {
        // the target dialect defaults to CSV when no format is given
        FileFormat::Csv {
            skip_header: false,
            quote: None,
            delimiter: None,
        }
    }
}

impl FileFormat {
    /// Render the host reader call for one URL.
    pub fn read_sql(&self, url: &str) -> String {
        match self {
            FileFormat::Csv {
                skip_header,
                quote,
                delimiter,
            } => {
                // keep generated column names (column0..) rather than
                // consuming the header row as names
                let mut args = vec![format!("'{url}'"), "header = false".to_string()];
                if *skip_header {
                    args.push("skip = 1".to_string());
                }
                if let Some(quote) = quote {
                    args.push(format!("quote = '{}'", quote.replace('\'', "''")));
                }
                if let Some(delimiter) = delimiter {
                    if delimiter != "," {
                        args.push(format!("sep = '{}'", delimiter.replace('\'', "''")));
                    }
                }
                format!("read_csv({})", args.join(", "))
            }
            FileFormat::Parquet => format!("read_parquet('{url}')"),
        }
    }
}

/// A parsed COPY INTO statement.
#[derive(Debug, Clone)]
pub struct CopyInto {
    /// Target table path (1-3 parts, case-normalised)
    pub table: Vec<IdentPart>,
    /// Explicit target column list, case-normalised
    pub columns: Vec<String>,
    /// Projection rendered from a copy-transformation subquery
    pub transform_select: Option<String>,
    /// Raw source: a URL, or a stage reference starting with `@`
    pub source: String,
    /// Explicit FILES list
    pub files: Vec<String>,
    pub format: FileFormat,
    pub force: bool,
    pub purge: bool,
}

impl CopyInto {
    /// Render the INSERT that loads one resolved URL.
    pub fn insert_sql(&self, url: &str) -> String {
        let table = self
            .table
            .iter()
            .map(|p| p.sql())
            .collect::<Vec<_>>()
            .join(".");
        let columns = if self.columns.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.columns.join(", "))
        };
        let projection = match &self.transform_select {
            Some(select) => select.clone(),
            None if !self.columns.is_empty() => (0..self.columns.len())
                .map(|i| format!("column{i}"))
                .collect::<Vec<_>>()
                .join(", "),
            None => "*".to_string(),
        };
        format!(
            "INSERT INTO {table}{columns} SELECT {projection} FROM {}",
            self.format.read_sql(url)
        )
    }
}

struct Regexes {
    main: Regex,
    subquery: Regex,
    item: Regex,
    files: Regex,
    file_format: Regex,
    format_type: Regex,
    skip_header: Regex,
    delimiter: Regex,
    enclosed_by: Regex,
    force: Regex,
    purge: Regex,
    on_error: Regex,
}

/// The COPY INTO grammar subset, compiled once.
static REGEXES: LazyLock<Regexes> = LazyLock::new(|| Regexes {
    main: Regex::new(
        r"(?is)^COPY\s+INTO\s+(?P<table>[^\s(]+)\s*(?:\((?P<cols>[^)]*)\)\s*)?FROM\s+(?P<rest>.+)$",
    )
    .expect("valid regex literal"),
    subquery: Regex::new(r"(?is)^SELECT\s+(?P<items>.+?)\s+FROM\s+(?P<from>\S+)\s*$")
        .expect("valid regex literal"),
    item: Regex::new(r#"(?i)^\$1\s*[:.]\s*"?(?P<key>\w+)"?\s*(?P<cast>::\s*[\w\s(),]+)?$"#)
        .expect("valid regex literal"),
    files: Regex::new(r"(?is)\bFILES\s*=\s*\((?P<list>[^)]*)\)").expect("valid regex literal"),
    file_format: Regex::new(r"(?is)\bFILE_FORMAT\s*=\s*\((?P<body>[^)]*)\)")
        .expect("valid regex literal"),
    format_type: Regex::new(r"(?i)\bTYPE\s*=\s*'?(?P<t>\w+)'?").expect("valid regex literal"),
    skip_header: Regex::new(r"(?i)\bSKIP_HEADER\s*=\s*(?P<n>\d+)").expect("valid regex literal"),
    delimiter: Regex::new(r"(?i)\bFIELD_DELIMITER\s*=\s*'(?P<d>[^']*)'")
        .expect("valid regex literal"),
    enclosed_by: Regex::new(r"(?i)\bFIELD_OPTIONALLY_ENCLOSED_BY\s*=\s*(?:'(?P<q>[^']*)'|NONE)")
        .expect("valid regex literal"),
    force: Regex::new(r"(?i)\bFORCE\s*=\s*(?P<v>TRUE|FALSE)").expect("valid regex literal"),
    purge: Regex::new(r"(?i)\bPURGE\s*=\s*(?P<v>TRUE|FALSE)").expect("valid regex literal"),
    on_error: Regex::new(r"(?i)\bON_ERROR\s*=\s*'?(?P<v>\w+)'?").expect("valid regex literal"),
});

/// Parse a COPY INTO statement; `None` when `sql` is not COPY INTO.
pub fn parse_copy_into(sql: &str) -> SqlResult<Option<CopyInto>> {
    let re = &*REGEXES;
    let Some(caps) = re.main.captures(sql.trim()) else {
        return Ok(None);
    };

    let table: Vec<IdentPart> = crate::command::split_object_parts(&caps["table"])
        .iter()
        .map(|p| IdentPart::parse(p))
        .collect();
    let columns: Vec<String> = caps
        .name("cols")
        .map(|c| {
            split_top_level(c.as_str())
                .iter()
                .map(|c| IdentPart::parse(c.trim()).sql())
                .collect()
        })
        .unwrap_or_default();

    let rest = caps["rest"].trim().to_string();
    let (source, transform_select, options) = parse_source(&rest)?;

    let mut copy = CopyInto {
        table,
        columns,
        transform_select,
        source,
        files: Vec::new(),
        format: FileFormat::default(),
        force: false,
        purge: false,
    };

    if let Some(files) = re.files.captures(&options) {
        copy.files = split_top_level(&files["list"])
            .iter()
            .map(|f| f.trim().trim_matches('\'').to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }

    if let Some(format) = re.file_format.captures(&options) {
        let body = &format["body"];
        let format_type = re
            .format_type
            .captures(body)
            .map(|c| c["t"].to_uppercase())
            .ok_or_else(|| SqlError::Unsupported("FILE_FORMAT without TYPE".to_string()))?;
        copy.format = match format_type.as_str() {
            "CSV" => FileFormat::Csv {
                skip_header: re
                    .skip_header
                    .captures(body)
                    .map(|c| &c["n"] != "0")
                    .unwrap_or(false),
                quote: re
                    .enclosed_by
                    .captures(body)
                    .and_then(|c| c.name("q").map(|q| q.as_str().to_string())),
                delimiter: re.delimiter.captures(body).map(|c| c["d"].to_string()),
            },
            "PARQUET" => FileFormat::Parquet,
            other => {
                return Err(SqlError::Unsupported(format!(
                    "{other} FILE_FORMAT"
                )))
            }
        };
    }

    copy.force = re
        .force
        .captures(&options)
        .map(|c| c["v"].eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    copy.purge = re
        .purge
        .captures(&options)
        .map(|c| c["v"].eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if let Some(on_error) = re.on_error.captures(&options) {
        if !on_error["v"].eq_ignore_ascii_case("ABORT_STATEMENT") {
            return Err(SqlError::Unsupported(format!(
                "ON_ERROR = {}",
                &on_error["v"]
            )));
        }
    }

    if copy.format == FileFormat::Parquet && copy.transform_select.is_none() {
        return Err(SqlError::ParquetLoadRequiresSelect);
    }

    Ok(Some(copy))
}

/// Split `FROM <source> [options]` into the source, an optional
/// transformation projection, and the trailing options text.
fn parse_source(rest: &str) -> SqlResult<(String, Option<String>, String)> {
    let re = &*REGEXES;

    if let Some(inner_end) = rest.starts_with('(').then(|| matching_paren(rest)).flatten() {
        let inner = &rest[1..inner_end];
        let options = rest[inner_end + 1..].to_string();
        let caps = re
            .subquery
            .captures(inner.trim())
            .ok_or_else(|| SqlError::InvalidUrlPrefix(inner.trim().to_string()))?;
        let from = caps["from"].trim().to_string();
        if !from.starts_with('@') {
            return Err(SqlError::InvalidUrlPrefix(from));
        }
        let items: Vec<String> = split_top_level(&caps["items"])
            .iter()
            .map(|item| {
                let item = item.trim();
                re.item
                    .captures(item)
                    .map(|c| {
                        let cast = c.name("cast").map(|m| m.as_str()).unwrap_or("");
                        format!("\"{}\"{}", &c["key"], cast.replace(' ', ""))
                    })
                    .ok_or_else(|| {
                        SqlError::Unsupported(format!("copy transformation item {item}"))
                    })
            })
            .collect::<SqlResult<_>>()?;
        return Ok((from, Some(items.join(", ")), options));
    }

    if let Some(stripped) = rest.strip_prefix('\'') {
        let end = stripped
            .find('\'')
            .ok_or_else(|| SqlError::InvalidUrlPrefix(rest.to_string()))?;
        let url = stripped[..end].to_string();
        return Ok((url, None, stripped[end + 1..].to_string()));
    }

    if rest.starts_with('@') {
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        return Ok((rest[..end].to_string(), None, rest[end..].to_string()));
    }

    Err(SqlError::InvalidUrlPrefix(
        rest.split_whitespace().next().unwrap_or(rest).to_string(),
    ))
}

/// Byte index of the `)` matching the `(` at index 0.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas outside parentheses and string literals.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    for c in s.chars() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if !in_string && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}
