use std::path::PathBuf;
use std::process;

use clap::Args;

use barray::ir::optimize::fuse_reductions;

use super::programs;
use super::resolve_target;

#[derive(Args)]
pub struct BuildArgs {
    /// Sample program to build (see `barray list`)
    pub program: String,
    /// Comma-separated dimensions (default: the sample's own)
    #[arg(long, value_delimiter = ',')]
    pub dims: Vec<usize>,
    /// Run the computation on the device
    #[arg(long)]
    pub device: bool,
    /// Apply the fused-reduction rewrite
    #[arg(long)]
    pub fuse: bool,
    /// Threads per block (overrides the target's)
    #[arg(long, value_name = "N")]
    pub block_width: Option<u32>,
    /// Target configuration: built-in name or targets/<name>.toml
    #[arg(long, default_value = "cuda")]
    pub target: String,
    /// Write the program here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cmd_build(args: BuildArgs) {
    let BuildArgs {
        program,
        dims,
        device,
        fuse,
        block_width,
        target,
        output,
    } = args;

    let Some(sample) = programs::find(&program) else {
        eprintln!("error: unknown program '{}'", program);
        eprintln!("  help: run `barray list` to see the available programs");
        process::exit(1);
    };

    let dims = if dims.is_empty() {
        sample.dims.iter().map(|(_, d)| *d).collect()
    } else {
        dims
    };
    if dims.len() != sample.dims.len() {
        eprintln!(
            "error: '{}' takes {} dimensions, got {}",
            sample.name,
            sample.dims.len(),
            dims.len()
        );
        process::exit(1);
    }

    let mut config = resolve_target(&target);
    if let Some(width) = block_width {
        if width == 0 {
            eprintln!("error: --block-width must be positive");
            process::exit(1);
        }
        config = config.with_block_width(width);
    }
    if fuse {
        config = config.with_fuse_reductions(true);
    }

    let rewrite_config = config.clone();
    let result = barray::build_program(sample.name, config, |ctx| {
        (sample.build)(ctx, &dims, device)
    });
    let mut ir = match result {
        Ok(ir) => ir,
        Err(e) => {
            let source = e.source_text();
            if source.is_empty() {
                eprintln!("error: {}", e);
            } else {
                e.to_diagnostic().render(sample.name, &source);
            }
            process::exit(1);
        }
    };

    if rewrite_config.fuse_reductions {
        let n = fuse_reductions(&mut ir, &rewrite_config);
        eprintln!("fused {} reduction(s)", n);
    }

    let text = ir.to_string();
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &text) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
}
