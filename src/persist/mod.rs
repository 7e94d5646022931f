//! Convar persistence.
//!
//! Flat `qualified.name -> value` maps in one of three formats, chosen by file
//! extension:
//!
//!   .yaml / .yml   mapping (nested mappings flatten to dotted keys)
//!   .json          object  (same flattening)
//!   anything else  `.cfg` script: one `name value` pair per line, shell-quoted,
//!                  `#` starts a comment line
//!
//! Loading applies values through the same text assignment rule as the line
//! protocol, so a bad value drives its convar to the zero value and is
//! reported to the context. Unknown keys are skipped with a warning.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result, anyhow};

use crate::console::Console;
use crate::console::context::Context;
use crate::console::convar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Cfg,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Format::Yaml,
            Some("json") => Format::Json,
            _ => Format::Cfg,
        }
    }
}

/// Apply every known key in `path` to the console's convars.
/// Returns how many values were assigned successfully.
pub fn load(path: impl AsRef<Path>, console: &Console, ctx: &mut Context) -> Result<usize> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read convar file: {}", path.display()))?;
    let entries = parse(&raw, Format::from_path(path))
        .with_context(|| format!("failed to parse convar file: {}", path.display()))?;

    let mut applied = 0;
    for (key, text) in entries {
        let Some(convar) = console.convar(&key) else {
            tracing::warn!(key = %key, file = %path.display(), "ignoring unknown convar");
            continue;
        };
        if convar::assign_reporting(&convar, ctx, &text) {
            applied += 1;
        }
    }
    tracing::debug!(applied, file = %path.display(), "convars loaded");
    Ok(applied)
}

/// Write every convar's current value to `path`. Returns the number written.
pub fn save(path: impl AsRef<Path>, console: &Console) -> Result<usize> {
    let path = path.as_ref();
    let convars = console.convars();
    let body = match Format::from_path(path) {
        Format::Cfg => {
            let mut out = String::from("# devconsole convars\n");
            for c in &convars {
                let value = c.value().to_string();
                out.push_str(&format!(
                    "{} {}\n",
                    c.qualified_name(),
                    shell_words::quote(&value)
                ));
            }
            out
        }
        format => {
            let mut map = BTreeMap::new();
            for c in &convars {
                let value = serde_json::to_value(c.value())
                    .with_context(|| format!("failed to encode {}", c.qualified_name()))?;
                map.insert(c.qualified_name().to_string(), value);
            }
            if format == Format::Yaml {
                serde_yaml::to_string(&map).context("failed to encode YAML")?
            } else {
                serde_json::to_string_pretty(&map).context("failed to encode JSON")?
            }
        }
    };
    std::fs::write(path, body)
        .with_context(|| format!("failed to write convar file: {}", path.display()))?;
    tracing::debug!(count = convars.len(), file = %path.display(), "convars saved");
    Ok(convars.len())
}

/// Ordered `(key, text)` pairs from a file body.
fn parse(raw: &str, format: Format) -> Result<Vec<(String, String)>> {
    let value: serde_json::Value = match format {
        Format::Cfg => return parse_cfg(raw),
        Format::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid YAML")?;
            if yaml.is_null() {
                return Ok(Vec::new());
            }
            serde_json::to_value(yaml).context("failed to convert YAML to JSON")?
        }
        Format::Json => serde_json::from_str(raw).context("invalid JSON")?,
    };
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("convar file root must be a mapping"))?;
    let mut out = Vec::new();
    flatten("", obj, &mut out);
    Ok(out)
}

fn flatten(
    prefix: &str,
    obj: &serde_json::Map<String, serde_json::Value>,
    out: &mut Vec<(String, String)>,
) {
    for (k, v) in obj {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            serde_json::Value::Object(inner) => flatten(&key, inner, out),
            serde_json::Value::String(s) => out.push((key, s.clone())),
            other => out.push((key, other.to_string())),
        }
    }
}

fn parse_cfg(raw: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words =
            shell_words::split(line).with_context(|| format!("line {}: bad quoting", idx + 1))?;
        match words.as_slice() {
            [key, value] => out.push((key.clone(), value.clone())),
            _ => {
                tracing::warn!(line = idx + 1, "expected `name value`; skipping");
            }
        }
    }
    Ok(out)
}
