//! Geometric types and affine-matrix helpers.

/// A 2D point (x, y).
pub type Point = (f64, f64);

/// A rectangle (x0, y0, x1, y1) with x0 <= x1 and y0 <= y1 once normalized.
pub type Rect = (f64, f64, f64, f64);

/// A 6-element affine transformation matrix (a, b, c, d, e, f).
/// Transforms point (x, y) to (ax + cy + e, bx + dy + f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// Identity transformation matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Tolerance used when deciding whether a matrix is axis-aligned.
const AXIS_EPSILON: f64 = 1e-6;

/// Multiplies two matrices. The result applies `m1` first, then `m0`,
/// so `cm` updates the CTM as `mult_matrix(cm, ctm)`.
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Applies a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, (x, y): Point) -> Point {
    let (a, b, c, d, e, f) = m;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Bounding box of a rectangle after transformation.
pub fn apply_matrix_rect(m: Matrix, (x0, y0, x1, y1): Rect) -> Rect {
    get_bound([
        apply_matrix_pt(m, (x0, y0)),
        apply_matrix_pt(m, (x1, y0)),
        apply_matrix_pt(m, (x0, y1)),
        apply_matrix_pt(m, (x1, y1)),
    ])
}

/// `true` when the matrix maps axis-aligned rectangles onto axis-aligned
/// rectangles (no rotation other than multiples of 90 degrees, no skew).
pub fn is_axis_aligned(m: Matrix) -> bool {
    let (a, b, c, d, _, _) = m;
    (b.abs() < AXIS_EPSILON && c.abs() < AXIS_EPSILON)
        || (a.abs() < AXIS_EPSILON && d.abs() < AXIS_EPSILON)
}

/// Bounding rectangle of a set of points.
pub fn get_bound<I: IntoIterator<Item = Point>>(pts: I) -> Rect {
    let mut x0 = f64::INFINITY;
    let mut y0 = f64::INFINITY;
    let mut x1 = f64::NEG_INFINITY;
    let mut y1 = f64::NEG_INFINITY;
    for (x, y) in pts {
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }
    (x0, y0, x1, y1)
}

/// Orders the corners so that x0 <= x1 and y0 <= y1.
pub fn normalize_rect((x0, y0, x1, y1): Rect) -> Rect {
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

/// Intersection of two normalized rectangles, `None` when empty.
pub fn intersect_rect(r1: Rect, r2: Rect) -> Option<Rect> {
    let x0 = r1.0.max(r2.0);
    let y0 = r1.1.max(r2.1);
    let x1 = r1.2.min(r2.2);
    let y1 = r1.3.min(r2.3);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

/// `true` when `inner` lies inside `outer` grown by `margin` on every side.
pub fn rect_contains(outer: Rect, inner: Rect, margin: f64) -> bool {
    inner.0 >= outer.0 - margin
        && inner.1 >= outer.1 - margin
        && inner.2 <= outer.2 + margin
        && inner.3 <= outer.3 + margin
}

/// `true` when the rectangle has no area or is not finite.
pub fn is_degenerate((x0, y0, x1, y1): Rect) -> bool {
    !(x1 - x0 > 0.0 && y1 - y0 > 0.0) || ![x0, y0, x1, y1].iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mult_matrix_applies_first_argument_first() {
        let scale = (2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let translate = (1.0, 0.0, 0.0, 1.0, 10.0, 0.0);
        let m = mult_matrix(scale, translate);
        assert_eq!(apply_matrix_pt(m, (1.0, 1.0)), (12.0, 2.0));
        let m = mult_matrix(translate, scale);
        assert_eq!(apply_matrix_pt(m, (1.0, 1.0)), (22.0, 2.0));
    }

    #[test]
    fn test_apply_matrix_rect_rotation() {
        let rot90 = (0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let r = apply_matrix_rect(rot90, (0.0, 0.0, 10.0, 5.0));
        assert_eq!(r, (-5.0, 0.0, 0.0, 10.0));
        assert!(is_axis_aligned(rot90));
        assert!(!is_axis_aligned((0.7, 0.7, -0.7, 0.7, 0.0, 0.0)));
    }

    #[test]
    fn test_rect_contains_with_margin() {
        let outer = (10.0, 10.0, 20.0, 20.0);
        assert!(rect_contains(outer, (11.0, 11.0, 19.0, 19.0), 0.0));
        assert!(!rect_contains(outer, (9.0, 11.0, 19.0, 19.0), 0.0));
        assert!(rect_contains(outer, (9.0, 11.0, 19.0, 19.0), 1.5));
    }

    #[test]
    fn test_intersect_rect() {
        let a = (0.0, 0.0, 10.0, 10.0);
        assert_eq!(intersect_rect(a, (5.0, 5.0, 15.0, 15.0)), Some((5.0, 5.0, 10.0, 10.0)));
        assert_eq!(intersect_rect(a, (10.0, 0.0, 15.0, 15.0)), None);
    }

    #[test]
    fn test_degenerate() {
        assert!(is_degenerate((0.0, 0.0, 0.0, 5.0)));
        assert!(is_degenerate((0.0, 0.0, f64::INFINITY, 5.0)));
        assert!(!is_degenerate((0.0, 0.0, 1.0, 5.0)));
    }
}
