//! Symbolic runtime primitives.
//!
//! A build never allocates or copies memory. Each primitive returns the
//! IR call that the generated program will make at run time; names come
//! from the target's [`RuntimeNames`].

use crate::config::RuntimeNames;
use crate::ir::Expr;

/// `malloc(bytes)` → host buffer handle.
pub fn allocate(names: &RuntimeNames, bytes: usize) -> Expr {
    Expr::call(&names.malloc, vec![Expr::Int(bytes as i64)])
}

/// `cuda_malloc(bytes)` → device buffer handle.
pub fn allocate_device(names: &RuntimeNames, bytes: usize) -> Expr {
    Expr::call(&names.device_malloc, vec![Expr::Int(bytes as i64)])
}

pub fn free(names: &RuntimeNames, buffer: Expr) -> Expr {
    Expr::call(&names.free, vec![buffer])
}

pub fn free_device(names: &RuntimeNames, buffer: Expr) -> Expr {
    Expr::call(&names.device_free, vec![buffer])
}

/// Host → device copy of `bytes` bytes.
pub fn copy_to_device(names: &RuntimeNames, dst: Expr, src: Expr, bytes: usize) -> Expr {
    Expr::call(
        &names.copy_to_device,
        vec![dst, src, Expr::Int(bytes as i64)],
    )
}

/// Device → host copy of `bytes` bytes.
pub fn copy_to_host(names: &RuntimeNames, dst: Expr, src: Expr, bytes: usize) -> Expr {
    Expr::call(&names.copy_to_host, vec![dst, src, Expr::Int(bytes as i64)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;

    #[test]
    fn test_calls_render_with_target_names() {
        let names = TargetConfig::cuda().runtime;
        assert_eq!(allocate(&names, 64).to_string(), "malloc(64)");
        assert_eq!(allocate_device(&names, 64).to_string(), "cuda_malloc(64)");
        let copy = copy_to_device(&names, Expr::var("x_dev"), Expr::var("x"), 64);
        assert_eq!(copy.to_string(), "cuda_memcpy_to_device(x_dev, x, 64)");
        let back = copy_to_host(&names, Expr::var("x"), Expr::var("x_dev"), 64);
        assert_eq!(back.to_string(), "cuda_memcpy_to_host(x, x_dev, 64)");
        assert_eq!(free_device(&names, Expr::var("x_dev")).to_string(), "cuda_free(x_dev)");
    }
}
