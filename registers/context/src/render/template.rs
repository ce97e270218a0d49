// Licensed under the Apache-2.0 license

//! Template engine seam and the built-in file-system engine.

use super::TemplateSet;
use crate::config::GeneratorConfig;
use crate::error::{ContextError, ContextResult};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Manifest file of every template set.
pub const MANIFEST_FILE: &str = "include.txt";

/// Expands templates against a JSON context.
///
/// The dispatcher only needs two things from an engine: the expanded
/// manifest text of a set, and the expanded text of one template of that
/// set. Engines are shared between render workers.
pub trait TemplateEngine: Send + Sync {
    fn manifest(&self, set: TemplateSet, context: &Value) -> ContextResult<String>;

    fn render(&self, set: TemplateSet, template: &str, context: &Value) -> ContextResult<String>;
}

/// Reads sets from `<templates_dir>/<format>/` and `<libraries_dir>/<format>/`
/// and expands `{{ dotted.path }}` placeholders.
#[derive(Clone, Debug)]
pub struct FsTemplateEngine {
    tpl_dir: PathBuf,
    lib_dir: PathBuf,
}

impl FsTemplateEngine {
    pub fn new(tpl_dir: impl Into<PathBuf>, lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            tpl_dir: tpl_dir.into(),
            lib_dir: lib_dir.into(),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(&config.templates_dir, &config.libraries_dir)
    }

    fn set_dir(&self, set: TemplateSet) -> PathBuf {
        let root = if set.library {
            &self.lib_dir
        } else {
            &self.tpl_dir
        };
        root.join(set.format.name())
    }

    fn load(&self, set: TemplateSet, name: &str) -> ContextResult<String> {
        let path = self.set_dir(set).join(name);
        read_template(set, &path)
    }
}

fn read_template(set: TemplateSet, path: &Path) -> ContextResult<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ContextError::TemplateResolution(
            format!("'{set}' template {} not found", path.display()),
        )),
        Err(e) => Err(ContextError::io(path, e)),
    }
}

impl TemplateEngine for FsTemplateEngine {
    fn manifest(&self, set: TemplateSet, context: &Value) -> ContextResult<String> {
        let text = self.load(set, MANIFEST_FILE)?;
        expand(&text, context)
    }

    fn render(&self, set: TemplateSet, template: &str, context: &Value) -> ContextResult<String> {
        let text = self.load(set, template)?;
        expand(&text, context)
    }
}

/// Replace every `{{ path }}` in `template` with the value at `path`.
///
/// Path segments are object keys, or list positions when numeric. Strings
/// are inserted as they are, any other value as JSON.
///
/// ```
/// use registers_context::render::expand;
/// use serde_json::json;
///
/// let context = json!({"inst_name": "top", "regs": [{"address_offset": 16}]});
/// let text = expand("{{ inst_name }} @ {{regs.0.address_offset}}", &context).unwrap();
/// assert_eq!(text, "top @ 16");
/// ```
pub fn expand(template: &str, context: &Value) -> ContextResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(ContextError::TemplateResolution(
                "unterminated placeholder".to_string(),
            ));
        };
        let path = after[..end].trim();
        match lookup(context, path) {
            Some(Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_string()),
            None => {
                return Err(ContextError::TemplateResolution(format!(
                    "undefined placeholder '{path}'"
                )))
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup<'v>(context: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(context, |value, segment| match value {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
