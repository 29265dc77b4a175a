use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Substitute `{{ env.VAR }}` placeholders in raw config text
///
/// `{{ env.VAR | default("value") }}` falls back to `value` when `VAR` is
/// unset. Comment lines are left untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut lines = Vec::new();
    for line in input.split('\n') {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
        } else {
            lines.push(expand_line(line)?);
        }
    }
    Ok(lines.join("\n"))
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\)\s*)?\}\}"#)
            .expect("placeholder pattern is valid")
    })
}

fn expand_line(line: &str) -> Result<String, String> {
    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;

    for caps in placeholder().captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&line[cursor..whole.start()]);
        out.push_str(&resolve(&caps)?);
        cursor = whole.end();
    }

    out.push_str(&line[cursor..]);
    Ok(out)
}

fn resolve(caps: &Captures<'_>) -> Result<String, String> {
    let key = caps.get(1).map_or("", |m| m.as_str());
    let fallback = caps.get(2).map(|m| m.as_str());

    let Some(var) = key.strip_prefix("env.").filter(|v| !v.is_empty() && !v.contains('.')) else {
        return Err(format!("unsupported placeholder `{key}`, expected `env.NAME`"));
    };

    match (std::env::var(var), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => Err(format!("environment variable `{var}` is not set")),
    }
}
