//! Shape algebra: scalar broadcast, element-wise agreement, the
//! matrix-product rule and flat row-major addressing.

use std::fmt;

/// Ordered dimension extents. The empty shape is a scalar.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Shape(dims.into())
    }

    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Product of all extents (1 for a scalar).
    ///
    /// Shapes reaching this have passed [`Shape::checked_total_size`]
    /// when their array was declared.
    pub fn total_size(&self) -> usize {
        self.0.iter().product()
    }

    /// Product of all extents, or `None` if it overflows `usize`.
    pub fn checked_total_size(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Why two shapes could not be combined. Callers attach the operation
/// context and turn this into a `BuildError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeConflict {
    /// Ranks or some axis extent differ.
    Mismatch,
    /// An operand of a matrix product is not rank 2, or inner extents differ.
    Dimension,
}

/// Element-wise result shape: a scalar broadcasts against anything,
/// otherwise ranks and every extent must agree.
pub fn resolve_shapes(s1: &Shape, s2: &Shape) -> Result<Shape, ShapeConflict> {
    if s1.is_scalar() {
        return Ok(s2.clone());
    }
    if s2.is_scalar() {
        return Ok(s1.clone());
    }
    if s1.rank() != s2.rank() || s1.dims() != s2.dims() {
        return Err(ShapeConflict::Mismatch);
    }
    Ok(s1.clone())
}

/// `[M, N] x [N, O] -> [M, O]`.
pub fn cross_shape(s1: &Shape, s2: &Shape) -> Result<Shape, ShapeConflict> {
    if s1.rank() != 2 || s2.rank() != 2 || s1.dims()[1] != s2.dims()[0] {
        return Err(ShapeConflict::Dimension);
    }
    Ok(Shape(vec![s1.dims()[0], s2.dims()[1]]))
}

/// Numeric form of the addressing rule the loop inducer emits:
/// `flat = i[n-1] + D[n-1] * (i[n-2] + D[n-2] * (... i[0]))`.
///
/// The last declared dimension varies fastest and a rank-0 shape
/// addresses offset 0. Returns `None` when fewer than `shape.rank()`
/// indices are given; extra indices are ignored.
pub fn flat_offset(shape: &Shape, indices: &[usize]) -> Option<usize> {
    let dims = shape.dims();
    if indices.len() < dims.len() {
        return None;
    }
    let mut flat = 0;
    for (d, &i) in dims.iter().zip(indices) {
        flat = i + d * flat;
    }
    Some(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn scalar_broadcasts_both_ways() {
        let s = Shape::from([3, 4]);
        assert_eq!(resolve_shapes(&Shape::scalar(), &s), Ok(s.clone()));
        assert_eq!(resolve_shapes(&s, &Shape::scalar()), Ok(s.clone()));
        assert_eq!(
            resolve_shapes(&Shape::scalar(), &Shape::scalar()),
            Ok(Shape::scalar())
        );
    }

    #[test]
    fn equal_shapes_resolve() {
        let s = Shape::from([3, 4]);
        assert_eq!(resolve_shapes(&s, &s.clone()), Ok(s));
    }

    #[rstest]
    #[case(&[3, 4], &[3, 5])]
    #[case(&[3, 4], &[4, 3])]
    #[case(&[3, 4], &[3, 4, 1])]
    #[case(&[12], &[3, 4])]
    fn mismatched_shapes_fail(#[case] a: &[usize], #[case] b: &[usize]) {
        assert_eq!(
            resolve_shapes(&Shape::from(a), &Shape::from(b)),
            Err(ShapeConflict::Mismatch)
        );
    }

    #[test]
    fn cross_shape_rule() {
        let a = Shape::from([32, 16]);
        let b = Shape::from([16, 8]);
        assert_eq!(cross_shape(&a, &b), Ok(Shape::from([32, 8])));
    }

    #[rstest]
    #[case(&[4, 3], &[2, 5])]
    #[case(&[4], &[4, 5])]
    #[case(&[4, 3], &[3])]
    #[case(&[2, 2, 2], &[2, 2])]
    #[case(&[], &[3, 3])]
    fn cross_shape_rejects(#[case] a: &[usize], #[case] b: &[usize]) {
        assert_eq!(
            cross_shape(&Shape::from(a), &Shape::from(b)),
            Err(ShapeConflict::Dimension)
        );
    }

    #[test]
    fn flat_offset_example() {
        assert_eq!(flat_offset(&Shape::from([2, 3]), &[1, 2]), Some(5));
    }

    #[test]
    fn flat_offset_needs_an_index_per_axis() {
        let shape = Shape::from([2, 3, 4]);
        assert_eq!(flat_offset(&shape, &[1, 2]), None);
        assert_eq!(flat_offset(&shape, &[]), None);
        assert_eq!(flat_offset(&shape, &[1, 2, 3, 9]), Some(23));
    }

    #[test]
    fn checked_total_size_reports_overflow() {
        assert_eq!(Shape::from([32, 16, 8]).checked_total_size(), Some(4096));
        assert_eq!(Shape::scalar().checked_total_size(), Some(1));
        assert_eq!(Shape::from([usize::MAX, 2]).checked_total_size(), None);
    }

    /// Row-major reference: stride of axis d is the product of later extents.
    fn row_major(dims: &[usize], idx: &[usize]) -> usize {
        let mut off = 0;
        for d in 0..dims.len() {
            let stride: usize = dims[d + 1..].iter().product();
            off += idx[d] * stride;
        }
        off
    }

    fn all_indices(dims: &[usize]) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new()];
        for &d in dims {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    (0..d).map(move |i| {
                        let mut v = prefix.clone();
                        v.push(i);
                        v
                    })
                })
                .collect();
        }
        out
    }

    #[rstest]
    #[case(&[7])]
    #[case(&[2, 3])]
    #[case(&[4, 1, 5])]
    #[case(&[3, 2, 4])]
    fn flat_offset_matches_row_major(#[case] dims: &[usize]) {
        let shape = Shape::from(dims);
        let mut seen = vec![false; shape.total_size()];
        for idx in all_indices(dims) {
            let off = flat_offset(&shape, &idx).unwrap();
            assert_eq!(off, row_major(dims, &idx), "index {:?}", idx);
            assert!(!seen[off], "offset {} hit twice", off);
            seen[off] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn rank_zero_addresses_zero() {
        assert_eq!(flat_offset(&Shape::scalar(), &[]), Some(0));
        assert_eq!(Shape::scalar().total_size(), 1);
    }

    #[test]
    fn display() {
        assert_eq!(Shape::from([32, 16, 8]).to_string(), "[32, 16, 8]");
        assert_eq!(Shape::scalar().to_string(), "[]");
    }
}
