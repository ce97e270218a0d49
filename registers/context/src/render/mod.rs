// Licensed under the Apache-2.0 license

//! Render dispatch.
//!
//! Decides which template set runs over which context and where the results
//! go. Per-map formats run once for every address map, root formats run once
//! over the aggregate after the whole tree has been walked:
//!
//! ```text
//! TopContext
//! ├── addrmaps[i]  → vhdl (unless generation is disabled), adoc
//! └── aggregate    → vhdl library set, map, h, tcl
//! ```
//!
//! Every set is described by a manifest of `(template, output path)` pairs.
//! Rendered files land in `<out_dir>/<format>/<output path>`, and one list
//! file `gen_files_<format>.txt` per requested format records them in
//! generation order.

mod template;

pub use template::{expand, FsTemplateEngine, TemplateEngine, MANIFEST_FILE};

use crate::config::GeneratorConfig;
use crate::context::{AddrMapContext, TopContext};
use crate::error::{ContextError, ContextResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Name of the library unit in [`GeneratedFiles::vhdl_units`].
pub const LIBRARY_UNIT: &str = "library";

//=============================================================================
// Formats and template sets
//=============================================================================

/// A requested output kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Hardware description sources, per map plus a library set.
    Vhdl,
    /// Address-map listing.
    Map,
    /// C header.
    H,
    /// AsciiDoc documentation, per map.
    Adoc,
    /// Tcl script.
    Tcl,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Vhdl,
        OutputFormat::Map,
        OutputFormat::H,
        OutputFormat::Adoc,
        OutputFormat::Tcl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Vhdl => "vhdl",
            OutputFormat::Map => "map",
            OutputFormat::H => "h",
            OutputFormat::Adoc => "adoc",
            OutputFormat::Tcl => "tcl",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| ContextError::Configuration(format!("unknown output format '{s}'")))
    }
}

/// Templates for one format, either the regular set or its library set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TemplateSet {
    pub format: OutputFormat,
    pub library: bool,
}

impl TemplateSet {
    pub fn regular(format: OutputFormat) -> Self {
        Self {
            format,
            library: false,
        }
    }

    pub fn library(format: OutputFormat) -> Self {
        Self {
            format,
            library: true,
        }
    }
}

impl fmt::Display for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.library {
            write!(f, "{}_lib", self.format)
        } else {
            write!(f, "{}", self.format)
        }
    }
}

/// One `(template, output path)` pair of a manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestEntry {
    pub template: String,
    pub output: PathBuf,
}

/// Split an expanded manifest into entries.
///
/// Lines starting with `#` are dropped, the remaining whitespace separated
/// tokens are taken in pairs. Output paths must stay below the format
/// directory: absolute paths and `..` components are rejected.
pub fn parse_manifest(set: TemplateSet, text: &str) -> ContextResult<Vec<ManifestEntry>> {
    let tokens: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(str::split_whitespace)
        .collect();
    if tokens.len() % 2 != 0 {
        return Err(ContextError::TemplateResolution(format!(
            "manifest of '{set}' has an odd number of entries ({})",
            tokens.len()
        )));
    }
    tokens
        .chunks_exact(2)
        .map(|pair| {
            let output = PathBuf::from(pair[1]);
            let contained = output
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if !contained {
                return Err(ContextError::TemplateResolution(format!(
                    "manifest of '{set}' writes '{}' outside its output directory",
                    output.display()
                )));
            }
            Ok(ManifestEntry {
                template: pair[0].to_string(),
                output,
            })
        })
        .collect()
}

//=============================================================================
// Generated file bookkeeping
//=============================================================================

/// Hardware sources belonging to one map, or to the library set.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct VhdlUnit {
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// Files produced so far, per format, in generation order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct GeneratedFiles {
    pub vhdl: Vec<PathBuf>,
    pub map: Vec<PathBuf>,
    pub h: Vec<PathBuf>,
    pub adoc: Vec<PathBuf>,
    pub tcl: Vec<PathBuf>,
    /// Library unit first, then one unit per map with generated sources.
    pub vhdl_units: Vec<VhdlUnit>,
}

impl GeneratedFiles {
    pub fn files(&self, format: OutputFormat) -> &[PathBuf] {
        match format {
            OutputFormat::Vhdl => &self.vhdl,
            OutputFormat::Map => &self.map,
            OutputFormat::H => &self.h,
            OutputFormat::Adoc => &self.adoc,
            OutputFormat::Tcl => &self.tcl,
        }
    }

    fn files_mut(&mut self, format: OutputFormat) -> &mut Vec<PathBuf> {
        match format {
            OutputFormat::Vhdl => &mut self.vhdl,
            OutputFormat::Map => &mut self.map,
            OutputFormat::H => &mut self.h,
            OutputFormat::Adoc => &mut self.adoc,
            OutputFormat::Tcl => &mut self.tcl,
        }
    }
}

/// Per-map results, kept apart until they are merged in visitation order.
#[derive(Debug)]
struct MapOutputs {
    name: String,
    vhdl: Option<Vec<PathBuf>>,
    adoc: Option<Vec<PathBuf>>,
}

fn to_context<T: Serialize>(value: &T) -> ContextResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ContextError::TemplateResolution(format!("cannot serialize context: {e}")))
}

//=============================================================================
// Dispatcher
//=============================================================================

/// Runs template sets over finished contexts and writes the results.
pub struct Renderer<'a> {
    config: &'a GeneratorConfig,
    engine: &'a dyn TemplateEngine,
    out_dir: PathBuf,
}

impl<'a> Renderer<'a> {
    /// Creates the output root and resolves it to an absolute path.
    pub fn new(
        config: &'a GeneratorConfig,
        engine: &'a dyn TemplateEngine,
    ) -> ContextResult<Self> {
        std::fs::create_dir_all(&config.out_dir)
            .map_err(|e| ContextError::io(&config.out_dir, e))?;
        let out_dir = config
            .out_dir
            .canonicalize()
            .map_err(|e| ContextError::io(&config.out_dir, e))?;
        Ok(Self {
            config,
            engine,
            out_dir,
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Render every entry of a set's manifest against `context`.
    ///
    /// Returns the written paths in manifest order.
    pub fn render_templates(
        &self,
        set: TemplateSet,
        context: &Value,
    ) -> ContextResult<Vec<PathBuf>> {
        let manifest = self.engine.manifest(set, context)?;
        let entries = parse_manifest(set, &manifest)?;
        log::debug!("{set}: {} template(s)", entries.len());

        let format_dir = self.out_dir.join(set.format.name());
        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = format_dir.join(&entry.output);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ContextError::io(parent, e))?;
            }
            let text = self.engine.render(set, &entry.template, context)?;
            std::fs::write(&path, text).map_err(|e| ContextError::io(&path, e))?;
            log::debug!("{set}: {} -> {}", entry.template, path.display());
            files.push(path);
        }
        Ok(files)
    }

    fn render_map(&self, map: &AddrMapContext) -> ContextResult<MapOutputs> {
        let context = to_context(map)?;
        let mut outputs = MapOutputs {
            name: map.inst_name.clone(),
            vhdl: None,
            adoc: None,
        };
        if self.config.wants(OutputFormat::Vhdl) && map.generate_hdl {
            log::info!("VHDL for: {} ({})", map.inst_name, map.type_name);
            let set = TemplateSet::regular(OutputFormat::Vhdl);
            outputs.vhdl = Some(self.render_templates(set, &context)?);
        }
        if self.config.wants(OutputFormat::Adoc) {
            log::info!("ASCIIDOC for: {} ({})", map.inst_name, map.type_name);
            let set = TemplateSet::regular(OutputFormat::Adoc);
            outputs.adoc = Some(self.render_templates(set, &context)?);
        }
        Ok(outputs)
    }

    /// Per-map formats for every map, in visitation order.
    fn render_maps(&self, top: &TopContext) -> ContextResult<Vec<MapOutputs>> {
        if self.config.jobs <= 1 || top.addrmaps.len() <= 1 {
            return top.addrmaps.iter().map(|map| self.render_map(map)).collect();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
            .map_err(|e| {
                ContextError::Configuration(format!("cannot start render workers: {e}"))
            })?;
        // indexed collect keeps visitation order
        pool.install(|| {
            top.addrmaps
                .par_iter()
                .map(|map| self.render_map(map))
                .collect()
        })
    }

    /// Render all requested formats for the whole design.
    pub fn generate(&self, top: &TopContext) -> ContextResult<GeneratedFiles> {
        let mut generated = GeneratedFiles::default();
        if self.config.wants(OutputFormat::Vhdl) {
            generated.vhdl_units.push(VhdlUnit {
                name: LIBRARY_UNIT.to_string(),
                files: Vec::new(),
            });
        }

        for outputs in self.render_maps(top)? {
            if let Some(files) = outputs.vhdl {
                generated.vhdl.extend(files.iter().cloned());
                generated.vhdl_units.push(VhdlUnit {
                    name: outputs.name,
                    files,
                });
            }
            if let Some(files) = outputs.adoc {
                generated.adoc.extend(files);
            }
        }

        let mut root = to_context(top)?;
        if self.config.wants(OutputFormat::Vhdl) {
            set_generated_files(&mut root, &generated)?;
            let files = self.render_templates(TemplateSet::library(OutputFormat::Vhdl), &root)?;
            let maps = std::mem::replace(&mut generated.vhdl, files.clone());
            generated.vhdl.extend(maps);
            if let Some(unit) = generated.vhdl_units.first_mut() {
                unit.files = files;
            }
        }
        for format in [OutputFormat::Map, OutputFormat::H, OutputFormat::Tcl] {
            if self.config.wants(format) {
                log::info!("{} for: {}", format.name().to_uppercase(), top_name(top));
                set_generated_files(&mut root, &generated)?;
                let files = self.render_templates(TemplateSet::regular(format), &root)?;
                generated.files_mut(format).extend(files);
            }
        }
        Ok(generated)
    }

    /// Write `gen_files_<format>.txt` for every requested format.
    pub fn write_file_lists(&self, generated: &GeneratedFiles) -> ContextResult<Vec<PathBuf>> {
        let mut lists = Vec::new();
        for &format in &self.config.formats {
            let path = self.out_dir.join(format!("gen_files_{}.txt", format.name()));
            let contents: String = generated
                .files(format)
                .iter()
                .map(|file| format!("{}\n", file.display()))
                .collect();
            std::fs::write(&path, contents).map_err(|e| ContextError::io(&path, e))?;
            log::info!(
                "{} {} file(s) listed in {}",
                generated.files(format).len(),
                format,
                path.display()
            );
            lists.push(path);
        }
        Ok(lists)
    }
}

fn top_name(top: &TopContext) -> &str {
    top.top().map(|map| map.inst_name.as_str()).unwrap_or_default()
}

fn set_generated_files(root: &mut Value, generated: &GeneratedFiles) -> ContextResult<()> {
    if let Value::Object(fields) = root {
        fields.insert("generated_files".to_string(), to_context(generated)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        for format in OutputFormat::ALL {
            assert_eq!(format.name().parse::<OutputFormat>().unwrap(), format);
        }
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(TemplateSet::library(OutputFormat::Vhdl).to_string(), "vhdl_lib");
        assert_eq!(TemplateSet::regular(OutputFormat::H).to_string(), "h");
    }

    #[test]
    fn test_parse_manifest() {
        let text = "# generated sources\nregs.vhd.in top_regs.vhd\n  pkg.vhd.in   pkg/top_pkg.vhd\n";
        let entries = parse_manifest(TemplateSet::regular(OutputFormat::Vhdl), text).unwrap();
        assert_eq!(
            entries,
            vec![
                ManifestEntry {
                    template: "regs.vhd.in".to_string(),
                    output: PathBuf::from("top_regs.vhd"),
                },
                ManifestEntry {
                    template: "pkg.vhd.in".to_string(),
                    output: PathBuf::from("pkg/top_pkg.vhd"),
                },
            ]
        );
    }

    #[test]
    fn test_parse_manifest_odd_tokens() {
        let err = parse_manifest(TemplateSet::regular(OutputFormat::H), "a.h.in").unwrap_err();
        assert!(matches!(err, ContextError::TemplateResolution(_)));
    }

    #[test]
    fn test_parse_manifest_escaping_output() {
        let set = TemplateSet::regular(OutputFormat::Tcl);
        for text in ["a.tcl.in ../a.tcl", "a.tcl.in /tmp/a.tcl", "a.tcl.in x/../../a.tcl"] {
            let err = parse_manifest(set, text).unwrap_err();
            assert!(matches!(err, ContextError::TemplateResolution(_)), "{text}");
        }
        assert!(parse_manifest(set, "a.tcl.in ./scripts/a.tcl").is_ok());
    }

    #[test]
    fn test_generated_files_json() {
        let generated = GeneratedFiles {
            vhdl: vec![PathBuf::from("/out/vhdl/lib.vhd")],
            vhdl_units: vec![VhdlUnit {
                name: LIBRARY_UNIT.to_string(),
                files: vec![PathBuf::from("/out/vhdl/lib.vhd")],
            }],
            ..Default::default()
        };
        let json = to_context(&generated).unwrap();
        assert_eq!(json["vhdl"][0], "/out/vhdl/lib.vhd");
        assert_eq!(json["vhdl_units"][0]["name"], "library");
        assert!(json["tcl"].as_array().unwrap().is_empty());
    }
}
