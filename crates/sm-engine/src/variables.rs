//! Session variables.
//!
//! A session-scoped name → literal map. `$name` references are inlined into
//! the raw SQL before parsing because the target dialect allows them in
//! positions the parser rejects.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{EngineError, EngineResult};

/// Session variable store. Lives until the session closes.
#[derive(Debug, Default)]
pub struct Variables {
    variables: HashMap<String, String>,
}

/// A run of dollars followed by a name; a single dollar is a variable
/// reference, `$$` starts a dollar-quoted block and is left alone.
static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$+[A-Za-z_]\w*").expect("valid regex literal"));

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SET name = value`. Names are case-insensitive.
    pub fn set(&mut self, name: &str, value: &str) {
        self.variables
            .insert(name.to_uppercase(), value.to_string());
    }

    /// `UNSET name`. Unsetting an unknown name is a no-op.
    pub fn unset(&mut self, name: &str) {
        self.variables.remove(&name.to_uppercase());
    }

    /// Replace every `$name` reference with its stored literal.
    ///
    /// A reference that remains unresolved after substitution is an error.
    pub fn inline(&self, sql: &str) -> EngineResult<String> {
        let mut out = String::with_capacity(sql.len());
        let mut last = 0;

        for m in REFERENCE_RE.find_iter(sql) {
            out.push_str(&sql[last..m.start()]);
            last = m.end();

            let matched = m.as_str();
            let dollars = matched.chars().take_while(|c| *c == '$').count();
            if dollars != 1 {
                // $$-quoted text, not a variable reference
                out.push_str(matched);
                continue;
            }
            let name = matched[1..].to_uppercase();
            match self.variables.get(&name) {
                Some(value) => out.push_str(value),
                None => return Err(EngineError::VariableNotSet(format!("${name}"))),
            }
        }
        out.push_str(&sql[last..]);
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
