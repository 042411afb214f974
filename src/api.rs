//! Entry points for building whole array programs.

use crate::config::TargetConfig;
use crate::error::BuildError;
use crate::ir::builder::BuildContext;
use crate::ir::optimize::fuse_reductions;
use crate::ir::Program;

/// Run one build pass of `body` and return the program it describes.
///
/// Arrays still live when `body` returns are released at the end of the
/// program.
pub fn build_program(
    name: &str,
    config: TargetConfig,
    body: impl FnOnce(&mut BuildContext) -> Result<(), BuildError>,
) -> Result<Program, BuildError> {
    let mut ctx = BuildContext::new(name, config);
    body(&mut ctx)?;
    Ok(ctx.finish())
}

/// Build `body`, apply the fused-reduction rewrite when the target asks
/// for it, and render the program text.
pub fn generate_program(
    name: &str,
    config: TargetConfig,
    body: impl FnOnce(&mut BuildContext) -> Result<(), BuildError>,
) -> Result<String, BuildError> {
    let fuse = config.fuse_reductions;
    let rewrite_config = config.clone();
    let mut program = build_program(name, config, body)?;
    if fuse {
        fuse_reductions(&mut program, &rewrite_config);
    }
    Ok(program.to_string())
}
