mod common;

use barray::{build_program, BuildContext, BuildError, ElemType, Program, TargetConfig, Ty};
use common::{init_logger, Machine};
use rstest::rstest;

fn cross_program(
    config: TargetConfig,
    (m, n, o): (usize, usize, usize),
    device: bool,
) -> Program {
    build_program("cross", config, |ctx| {
        let lhs = ctx.param("arr1", Ty::Ptr(ElemType::Int));
        let rhs = ctx.param("arr2", Ty::Ptr(ElemType::Int));
        let out = ctx.param("arr_out", Ty::Ptr(ElemType::Int));
        let x = ctx.wrap_array("x", lhs, ElemType::Int, [m, n])?;
        let y = ctx.wrap_array("y", rhs, ElemType::Int, [n, o])?;
        let z = ctx.wrap_array("z", out, ElemType::Int, [m, o])?;
        if !device {
            return ctx.assign(z, |g| g.cross(x, y));
        }
        for id in [x, y, z] {
            ctx.to_device(id)?;
        }
        ctx.run_on_device(|ctx| ctx.assign(z, |g| g.cross(x, y)))?;
        ctx.to_host(z)
    })
    .unwrap()
}

fn matrix(rows: usize, cols: usize, seed: i64) -> Vec<f64> {
    (0..rows * cols)
        .map(|k| ((k as i64 * 7 + seed) % 11 - 5) as f64)
        .collect()
}

#[rstest]
#[case((2, 3, 4), false)]
#[case((3, 1, 2), false)]
#[case((4, 4, 4), true)]
#[case((1, 5, 3), true)]
fn cross_matches_sum_of_products(#[case] dims: (usize, usize, usize), #[case] device: bool) {
    init_logger();
    let (m, n, o) = dims;
    let program = cross_program(TargetConfig::cuda(), dims, device);
    let a = matrix(m, n, 1);
    let b = matrix(n, o, 4);
    let args = vec![a.clone(), b.clone(), vec![0.0; m * o]];
    let out = Machine::new(TargetConfig::cuda()).run(&program, args);
    for i in 0..m {
        for j in 0..o {
            let expected: f64 = (0..n).map(|k| a[i * n + k] * b[k * o + j]).sum();
            assert_eq!(out[2][i * o + j], expected, "z[{}][{}]", i, j);
        }
    }
}

fn add_program(config: TargetConfig, dims: &[usize], device: bool) -> Program {
    build_program("add", config, |ctx| {
        let buf = ctx.param("arr1", Ty::Ptr(ElemType::Int));
        let y = ctx.wrap_array("y", buf, ElemType::Int, dims.to_vec())?;
        let z = ctx.alloc_array("z", ElemType::Int, dims.to_vec())?;
        let w = ctx.alloc_array("w", ElemType::Int, dims.to_vec())?;
        ctx.fill(z, 0)?;
        ctx.fill(w, 1)?;
        if !device {
            return ctx.assign(y, |g| g.add(z, w));
        }
        for id in [y, z, w] {
            ctx.to_device(id)?;
        }
        ctx.run_on_device(|ctx| ctx.assign(y, |g| g.add(z, w)))?;
        ctx.to_host(y)
    })
    .unwrap()
}

#[rstest]
#[case(true, false)]
#[case(false, false)]
#[case(true, true)]
#[case(false, true)]
fn add_fills_with_ones(#[case] fold: bool, #[case] device: bool) {
    let config = TargetConfig::cuda().with_fold_constants(fold);
    let program = add_program(config.clone(), &[4, 3, 2], device);
    let out = Machine::new(config).run(&program, vec![vec![0.0; 24]]);
    assert!(out[0].iter().all(|v| *v == 1.0));
}

/// `y = z * 2 + f` after filling `z: int` with 1.5 and `f: float` with 2.
fn mixed_fill_program(config: TargetConfig) -> Program {
    build_program("mixed", config, |ctx| {
        let buf = ctx.param("arr1", Ty::Ptr(ElemType::Int));
        let y = ctx.wrap_array("y", buf, ElemType::Int, [3])?;
        let z = ctx.alloc_array("z", ElemType::Int, [3])?;
        let f = ctx.alloc_array("f", ElemType::Float, [3])?;
        ctx.fill(z, 1.5)?;
        ctx.fill(f, 2)?;
        ctx.assign(y, |g| {
            let twice = g.mul(z, 2)?;
            g.add(twice, f)
        })
    })
    .unwrap()
}

#[test]
fn folding_does_not_change_stored_values() {
    init_logger();
    let mut results = Vec::new();
    for fold in [true, false] {
        let config = TargetConfig::cuda().with_fold_constants(fold);
        let program = mixed_fill_program(config.clone());
        let out = Machine::new(config).run(&program, vec![vec![0.0; 3]]);
        results.push(out[0].clone());
    }
    assert_eq!(results[0], vec![4.0; 3]);
    assert_eq!(results[0], results[1]);
}

#[test]
fn add_program_text() {
    let program = add_program(TargetConfig::cuda(), &[2, 2], false);
    insta::assert_snapshot!(program.to_string(), @r"
    void add(int* arr1) {
      int* z = malloc(16);
      int* w = malloc(16);
      for (int i0 = 0; i0 < 4; i0++) {
        z[i0] = 0;
      }
      for (int i1 = 0; i1 < 4; i1++) {
        w[i1] = 1;
      }
      for (int i2 = 0; i2 < 2; i2++) {
        for (int i3 = 0; i3 < 2; i3++) {
          arr1[i3 + 2 * i2] = 1;
        }
      }
      free(w);
      free(z);
    }
    ");
}

#[test]
fn device_loop_nest_is_one_kernel_region() {
    let program = add_program(TargetConfig::cuda(), &[32, 16, 8], true);
    let regions = program.kernel_regions();
    assert_eq!(regions.len(), 1);
    let barray::Stmt::For { extent, body, .. } = regions[0] else {
        panic!("kernel region is not a loop");
    };
    assert_eq!(extent, &barray::Expr::Int(32));
    assert!(body.iter().all(|s| matches!(
        s,
        barray::Stmt::For { kernel: false, .. }
    )));
    assert_eq!(program.count_calls("cuda_malloc"), 3);
    assert_eq!(program.count_calls("cuda_memcpy_to_device"), 3);
    assert_eq!(program.count_calls("cuda_memcpy_to_host"), 1);
}

#[test]
fn host_program_has_no_kernel_regions() {
    let program = add_program(TargetConfig::cuda(), &[32, 16, 8], false);
    assert!(program.kernel_regions().is_empty());
    assert_eq!(program.count_calls("cuda_malloc"), 0);
}

fn with_failing_statement(ctx: &mut BuildContext, fail: bool) -> Result<(), BuildError> {
    let a = ctx.alloc_array("a", ElemType::Int, [3, 4])?;
    let b = ctx.alloc_array("b", ElemType::Int, [3, 5])?;
    let c = ctx.alloc_array("c", ElemType::Int, [3, 4])?;
    if fail {
        let err = ctx.assign(a, |g| {
            let sum = g.add(a, c)?;
            g.mul(sum, b)
        });
        assert!(matches!(err, Err(BuildError::ShapeMismatch { .. })));
        let err = ctx.copy(b, a);
        assert!(matches!(err, Err(BuildError::ShapeMismatch { .. })));
    }
    ctx.assign(c, |g| g.add(a, 1))
}

#[test]
fn failed_statements_leave_no_ir() {
    let clean = build_program("p", TargetConfig::cuda(), |ctx| {
        with_failing_statement(ctx, false)
    })
    .unwrap();
    let failed = build_program("p", TargetConfig::cuda(), |ctx| {
        with_failing_statement(ctx, true)
    })
    .unwrap();
    assert_eq!(clean.stmt_count(), failed.stmt_count());
    assert_eq!(clean.to_string(), failed.to_string());
}

#[test]
fn mismatch_diagnostic_points_at_operands() {
    let err = build_program("p", TargetConfig::cuda(), |ctx| {
        let x = ctx.alloc_array("x", ElemType::Int, [4, 3])?;
        let y = ctx.alloc_array("y", ElemType::Int, [2, 5])?;
        let z = ctx.alloc_array("z", ElemType::Int, [4, 5])?;
        ctx.assign(z, |g| {
            let prod = g.cross(x, y)?;
            g.mul(5, prod)
        })
    })
    .unwrap_err();
    assert!(matches!(err, BuildError::DimensionMismatch { .. }));
    assert_eq!(err.source_text(), "cross(x, y)");
    let text = err.to_diagnostic().render_to_string("p", &err.source_text());
    assert!(text.contains("dimension mismatch"));
    assert!(text.contains("has shape [4, 3]"));
    assert!(text.contains("has shape [2, 5]"));
}
