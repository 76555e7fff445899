//! Variable substitution for command text.
//!
//! Three reference syntaxes are understood: `${NAME}`, bare `$NAME`, and
//! `{process.env.NAME}`. Substitution runs in a fixed order:
//!
//! 1. custom variables, `${NAME}` then word-bounded `$NAME`, in table order;
//! 2. `{process.env.NAME}` from the environment;
//! 3. `${NAME}` from the environment;
//! 4. `$NAME` from the environment.
//!
//! Because step 1 consumes its matches first, a custom variable shadows an
//! environment variable of the same name for the `${}` and bare forms only.
//! References that resolve to nothing are left exactly as written.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::variables::VariableTable;

static PROCESS_ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{process\.env\.([^}]+)\}").expect("process.env regex is a valid constant")
});

static BRACED_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("braced variable regex is a valid constant"));

static BARE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").expect("bare variable regex is a valid constant")
});

/// Source of environment variable values.
pub trait EnvLookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads the environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Expand variable references in `command`. See the module docs for the
/// order in which syntaxes are tried.
pub fn expand_variables<E>(command: &str, custom: &VariableTable, env: &E) -> String
where
    E: EnvLookup + ?Sized,
{
    let mut result = command.to_string();

    for (name, value) in custom.iter() {
        result = result.replace(&format!("${{{name}}}"), value);
        result = replace_bare(&result, name, value);
    }

    let result = substitute(&PROCESS_ENV_REF, &result, env);
    let result = substitute(&BRACED_REF, &result, env);
    substitute(&BARE_REF, &result, env)
}

/// Replace every match of `pattern` whose first group names a set,
/// non-empty environment variable.
fn substitute<E>(pattern: &Regex, text: &str, env: &E) -> String
where
    E: EnvLookup + ?Sized,
{
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            env.lookup(&caps[1])
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace `$name` where it is not the prefix of a longer identifier.
fn replace_bare(text: &str, name: &str, value: &str) -> String {
    let needle = format!("${name}");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(&needle) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + needle.len()..];
        if after.chars().next().is_none_or(|c| !is_identifier_char(c)) {
            out.push_str(value);
        } else {
            out.push_str(&needle);
        }
        rest = after;
    }

    out.push_str(rest);
    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
