// Licensed under the Apache-2.0 license

//! Register-map context builder and render dispatcher.
//!
//! This crate turns an elaborated register-map tree (address maps, register
//! files, memories, registers and fields, as dumped by an external
//! elaborator) into per-map context records, and runs template sets over
//! them to produce hardware sources, headers, listings, documentation and
//! scripts.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use registers_context::{FsTemplateEngine, GeneratorConfig, OutputFormat, World};
//!
//! let world = World::from_file(Path::new("design.json")).unwrap();
//! let config = GeneratorConfig::new()
//!     .add_format(OutputFormat::Vhdl)
//!     .add_format(OutputFormat::H)
//!     .out_dir("build/regs");
//! let engine = FsTemplateEngine::from_config(&config);
//! let generation = registers_context::generate(&world, &config, &engine).unwrap();
//! println!("{} header(s)", generation.files.h.len());
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: The elaborated tree ([`World`]) and its loader
//! - [`value`]: Property values and the property schema
//! - [`util`]: Bit masks, signed normalization, access and data-type helpers
//! - [`context`]: Context records and the tree walker ([`build_contexts`])
//! - [`render`]: Template sets, the engine seam and the dispatcher
//! - [`config`]: Generator options ([`GeneratorConfig`])

pub mod config;
pub mod context;
pub mod error;
pub mod render;
pub mod types;
pub mod util;
pub mod value;

pub use config::GeneratorConfig;
pub use context::{build_contexts, AddrMapContext, ItemContext, Lint, TopContext};
pub use error::{ContextError, ContextResult};
pub use render::{FsTemplateEngine, GeneratedFiles, OutputFormat, Renderer, TemplateEngine};
pub use types::World;

use std::path::PathBuf;

/// Outcome of a [`generate`] run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Generation {
    pub files: GeneratedFiles,
    /// One `gen_files_<format>.txt` per requested format, in request order.
    pub file_lists: Vec<PathBuf>,
    pub lints: Vec<Lint>,
}

/// Build all contexts, render every requested format and write the
/// per-format file lists.
pub fn generate(
    world: &World,
    config: &GeneratorConfig,
    engine: &dyn TemplateEngine,
) -> ContextResult<Generation> {
    config.validate()?;
    let top = build_contexts(world, &config.separator)?;
    let renderer = Renderer::new(config, engine)?;
    let files = renderer.generate(&top)?;
    let file_lists = renderer.write_file_lists(&files)?;
    Ok(Generation {
        files,
        file_lists,
        lints: top.lints,
    })
}
