// Licensed under the Apache-2.0 license

//! Generate all requested formats for one elaborated tree.

use crate::Cli;
use anyhow::{Context, Result};
use registers_context::{generate, FsTemplateEngine, GeneratorConfig, World};

/// Options from the config file (if any), overridden by command-line flags.
fn merge_config(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GeneratorConfig::new(),
    };

    for &format in &cli.formats {
        config = config.add_format(format);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.out_dir(dir);
    }
    if let Some(dir) = &cli.templates_dir {
        config = config.templates_dir(dir);
    }
    if let Some(dir) = &cli.libraries_dir {
        config = config.libraries_dir(dir);
    }
    if let Some(jobs) = cli.jobs {
        config = config.jobs(jobs);
    }

    Ok(config)
}

pub fn run(cli: &Cli) -> Result<()> {
    let config = merge_config(cli)?;
    log::info!("Generating registers from: {}", cli.input.display());
    log::debug!("{config:?}");

    let world = World::from_file(&cli.input)?;
    let engine = FsTemplateEngine::from_config(&config);
    let generation = generate(&world, &config, &engine)?;
    if !generation.lints.is_empty() {
        log::warn!(
            "{} field(s) writable by both hardware and software without 'we'",
            generation.lints.len()
        );
    }
    for list in &generation.file_lists {
        log::info!("Output written to: {}", list.display());
    }
    Ok(())
}
