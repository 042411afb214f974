//! Built-in sample array programs.

use barray::{BuildContext, BuildError, Device, ElemType, Expr, Stmt, Ty};

/// A sample program. `build` receives the requested dimensions (already
/// checked against `dims`) and whether to run the computation on the
/// device.
pub struct Sample {
    pub name: &'static str,
    pub about: &'static str,
    /// Names of the dimensions, in order, with their defaults.
    pub dims: &'static [(&'static str, usize)],
    pub build: fn(&mut BuildContext, &[usize], bool) -> Result<(), BuildError>,
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "add",
        about: "y = z + w over a rank-3 array, z filled with 0 and w with 1",
        dims: &[("d1", 32), ("d2", 16), ("d3", 8)],
        build: build_add,
    },
    Sample {
        name: "cross",
        about: "z = 5 * cross(x, y) for x: MxN and y: NxO",
        dims: &[("M", 32), ("N", 16), ("O", 8)],
        build: build_cross,
    },
    Sample {
        name: "dot",
        about: "row-wise dot products out[i] = sum_j a[i*M + j] * b[i*M + j]",
        dims: &[("N", 512), ("M", 32)],
        build: build_dot,
    },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|s| s.name == name)
}

fn build_add(ctx: &mut BuildContext, dims: &[usize], device: bool) -> Result<(), BuildError> {
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
}

fn build_cross(ctx: &mut BuildContext, dims: &[usize], device: bool) -> Result<(), BuildError> {
    let (m, n, o) = (dims[0], dims[1], dims[2]);
    let lhs = ctx.param("arr1", Ty::Ptr(ElemType::Int));
    let rhs = ctx.param("arr2", Ty::Ptr(ElemType::Int));
    let out = ctx.param("arr_out", Ty::Ptr(ElemType::Int));
    let x = ctx.wrap_array("x", lhs, ElemType::Int, [m, n])?;
    let y = ctx.wrap_array("y", rhs, ElemType::Int, [n, o])?;
    let z = ctx.wrap_array("z", out, ElemType::Int, [m, o])?;
    if !device {
        return ctx.assign(z, |g| {
            let prod = g.cross(x, y)?;
            g.mul(5, prod)
        });
    }
    for id in [x, y, z] {
        ctx.to_device(id)?;
    }
    ctx.run_on_device(|ctx| {
        ctx.assign(z, |g| {
            let prod = g.cross(x, y)?;
            g.mul(5, prod)
        })
    })?;
    ctx.to_host(z)
}

/// Hand-written loops rather than array expressions. On the device the
/// inner index becomes the thread index and the row width is the
/// target's block width, which is the shape the reduction fusion
/// recognizes.
fn build_dot(ctx: &mut BuildContext, dims: &[usize], device: bool) -> Result<(), BuildError> {
    let n = dims[0];
    let m = if device {
        let width = ctx.config().block_width as usize;
        if dims[1] != width {
            log::warn!("dot: row width {} replaced by block width {}", dims[1], width);
        }
        width
    } else {
        dims[1]
    };

    let out_buf = ctx.param("arr_out", Ty::Ptr(ElemType::Int));
    let a_buf = ctx.param("arr1", Ty::Ptr(ElemType::Int));
    let b_buf = ctx.param("arr2", Ty::Ptr(ElemType::Int));
    let out = ctx.wrap_array("out", out_buf, ElemType::Int, [n])?;
    let a = ctx.wrap_array("a", a_buf, ElemType::Int, [n * m])?;
    let b = ctx.wrap_array("b", b_buf, ElemType::Int, [n * m])?;
    ctx.fill(out, 0)?;

    let place = if device { Device::Gpu } else { Device::Host };
    if device {
        for id in [out, a, b] {
            ctx.to_device(id)?;
        }
    }
    let out_v = ctx.array(out)?.buffer(place)?.clone();
    let a_v = ctx.array(a)?.buffer(place)?.clone();
    let b_v = ctx.array(b)?.buffer(place)?.clone();

    let i = ctx.fresh_name("i");
    let row = Expr::var(&i) * Expr::Int(m as i64);
    let acc = Expr::index(out_v, Expr::var(&i));
    let mac = move |col: Expr| Stmt::Assign {
        target: acc.clone(),
        value: acc.clone()
            + Expr::index(a_v.clone(), row.clone() + col.clone())
                * Expr::index(b_v.clone(), row.clone() + col),
    };

    if device {
        ctx.run_on_device(|ctx| {
            ctx.emit_for(&i, Expr::Int(n as i64), true, |ctx| {
                ctx.emit(mac(Expr::ThreadIdx));
                Ok(())
            })?;
            ctx.mark_written(out)
        })?;
        return ctx.to_host(out);
    }

    let j = ctx.fresh_name("j");
    ctx.emit_for(&i, Expr::Int(n as i64), false, |ctx| {
        ctx.emit_for(&j, Expr::Int(m as i64), false, |ctx| {
            ctx.emit(mac(Expr::var(&j)));
            Ok(())
        })
    })?;
    ctx.mark_written(out)
}
