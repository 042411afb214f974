use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::span::Span;


/// Names of the symbolic runtime primitives a build records.
///
/// None of these are executed during a build; they appear as calls in
/// the IR and are resolved by the backend's runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeNames {
    pub malloc: String,
    pub free: String,
    pub device_malloc: String,
    pub device_free: String,
    pub copy_to_device: String,
    pub copy_to_host: String,
}

/// Target configuration for a build pass.
///
/// Everything the core would otherwise hardcode about the device
/// runtime and the fused reduction lives here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetConfig {
    /// Short identifier used in CLI and file paths (e.g. "cuda").
    pub name: String,
    pub runtime: RuntimeNames,
    /// Threads per block; passed to the fused reduction primitive.
    pub block_width: u32,
    /// Name of the fused block-wide dot-product primitive.
    pub fused_dot: String,
    /// Fold reads of constant-filled arrays and literal arithmetic.
    pub fold_constants: bool,
    /// Run the fused-reduction rewrite in `generate_program`.
    pub fuse_reductions: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::cuda()
    }
}

impl TargetConfig {
    /// Built-in CUDA configuration.
    pub fn cuda() -> Self {
        Self {
            name: "cuda".to_string(),
            runtime: RuntimeNames {
                malloc: "malloc".to_string(),
                free: "free".to_string(),
                device_malloc: "cuda_malloc".to_string(),
                device_free: "cuda_free".to_string(),
                copy_to_device: "cuda_memcpy_to_device".to_string(),
                copy_to_host: "cuda_memcpy_to_host".to_string(),
            },
            block_width: 32,
            fused_dot: "fused_dot".to_string(),
            fold_constants: true,
            fuse_reductions: false,
        }
    }

    pub fn with_block_width(mut self, width: u32) -> Self {
        self.block_width = width;
        self
    }

    pub fn with_fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    pub fn with_fuse_reductions(mut self, fuse: bool) -> Self {
        self.fuse_reductions = fuse;
        self
    }

    /// Load a target configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read target config '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse_toml(&content, path)
    }

    /// Resolve a target by name: built-in first, then `targets/{name}.toml`
    /// in the working directory.
    pub fn resolve(name: &str) -> Result<Self, Diagnostic> {
        if name.contains('/') || name.contains('\\') || name.contains("..") || name.starts_with('.')
        {
            return Err(Diagnostic::error(
                format!("invalid target name '{}'", name),
                Span::dummy(),
            ));
        }

        if name == "cuda" {
            return Ok(Self::cuda());
        }

        let path = std::path::PathBuf::from(format!("targets/{}.toml", name));
        if path.exists() {
            return Self::load(&path);
        }

        Err(Diagnostic::error(
            format!("unknown target '{}' (looked for '{}')", name, path.display()),
            Span::dummy(),
        )
        .with_help("available built-in targets: cuda".to_string()))
    }

    /// Parse the TOML subset used by target files. Keys missing from the
    /// file keep their built-in CUDA values.
    fn parse_toml(content: &str, path: &Path) -> Result<Self, Diagnostic> {
        let err =
            |msg: String| Diagnostic::error(format!("{}: {}", path.display(), msg), Span::dummy());

        let mut config = Self::cuda();
        config.name = String::new();
        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!("expected 'key = value', found '{}'", trimmed)));
            };
            let key = key.trim();
            let value = value.trim();
            let unquoted = value.trim_matches('"').to_string();

            match (section.as_str(), key) {
                ("target", "name") => config.name = unquoted,
                ("runtime", "malloc") => config.runtime.malloc = unquoted,
                ("runtime", "free") => config.runtime.free = unquoted,
                ("runtime", "device_malloc") => config.runtime.device_malloc = unquoted,
                ("runtime", "device_free") => config.runtime.device_free = unquoted,
                ("runtime", "copy_to_device") => config.runtime.copy_to_device = unquoted,
                ("runtime", "copy_to_host") => config.runtime.copy_to_host = unquoted,
                ("device", "block_width") => {
                    config.block_width = value
                        .parse()
                        .map_err(|_| err(format!("invalid device.block_width: {}", value)))?;
                }
                ("optimize", "fused_dot") => config.fused_dot = unquoted,
                ("optimize", "fold_constants") => {
                    config.fold_constants = parse_bool(value)
                        .ok_or_else(|| err(format!("invalid optimize.fold_constants: {}", value)))?;
                }
                ("optimize", "fuse_reductions") => {
                    config.fuse_reductions = parse_bool(value).ok_or_else(|| {
                        err(format!("invalid optimize.fuse_reductions: {}", value))
                    })?;
                }
                _ => {
                    return Err(err(format!("unknown key '{}' in [{}]", key, section)));
                }
            }
        }

        if config.name.is_empty() {
            return Err(err("missing target.name".to_string()));
        }
        if config.block_width == 0 {
            return Err(err("device.block_width must be > 0".to_string()));
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
