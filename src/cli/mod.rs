pub mod build;
pub mod list;
pub mod programs;

use std::process;

use barray::TargetConfig;

/// Resolve `--target`, exiting with the loader's message on failure.
pub fn resolve_target(name: &str) -> TargetConfig {
    match TargetConfig::resolve(name) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e.message);
            for note in &e.notes {
                eprintln!("  note: {}", note);
            }
            if let Some(help) = &e.help {
                eprintln!("  help: {}", help);
            }
            process::exit(1);
        }
    }
}
