//! Geometric predicates and constructions used by the triangulation and the operators.
//!
//! Signs are computed with Shewchuk's adaptive exact predicates (`robust` crate), so the
//! combinatorial decisions of the triangulation never depend on rounding errors.

use crate::Real;
use na::{Point3, Vector3};
use robust::Coord3D;

fn coord(p: &Point3<Real>) -> Coord3D<Real> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

/// Orientation of the tetrahedron `(p, q, r, s)`.
///
/// Positive iff `s` lies on the positive side of the plane `(p, q, r)`, i.e., iff
/// `det[q - p, r - p, s - p] > 0`. Zero iff the four points are coplanar.
pub fn orientation(p: &Point3<Real>, q: &Point3<Real>, r: &Point3<Real>, s: &Point3<Real>) -> Real {
    // `robust::orient3d` uses the opposite sign convention.
    -robust::orient3d(coord(p), coord(q), coord(r), coord(s))
}

/// Is `e` strictly inside the sphere passing through `a`, `b`, `c`, `d`?
///
/// Works for both orientations of `(a, b, c, d)`. Returns `false` if the four points
/// are coplanar.
pub fn in_circumsphere(
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
    d: &Point3<Real>,
    e: &Point3<Real>,
) -> bool {
    let orient = robust::orient3d(coord(a), coord(b), coord(c), coord(d));
    let insphere = robust::insphere(coord(a), coord(b), coord(c), coord(d), coord(e));
    orient * insphere > 0.0
}

/// Are the three points collinear?
pub fn collinear(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> bool {
    let xy = |p: &Point3<Real>| robust::Coord { x: p.x, y: p.y };
    let yz = |p: &Point3<Real>| robust::Coord { x: p.y, y: p.z };
    let zx = |p: &Point3<Real>| robust::Coord { x: p.z, y: p.x };

    robust::orient2d(xy(a), xy(b), xy(c)) == 0.0
        && robust::orient2d(yz(a), yz(b), yz(c)) == 0.0
        && robust::orient2d(zx(a), zx(b), zx(c)) == 0.0
}

/// Center of the sphere passing through the four vertices of a non-degenerate tetrahedron.
pub fn tetrahedron_circumcenter(
    a: &Point3<Real>,
    b: &Point3<Real>,
    c: &Point3<Real>,
    d: &Point3<Real>,
) -> Point3<Real> {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;

    let ac_ad = ac.cross(&ad);
    let ad_ab = ad.cross(&ab);
    let ab_ac = ab.cross(&ac);
    let denom = 2.0 * ab.dot(&ac_ad);

    let num = ac_ad * ab.norm_squared() + ad_ab * ac.norm_squared() + ab_ac * ad.norm_squared();
    a + num / denom
}

/// Center of the circle passing through the three vertices of a non-degenerate triangle.
pub fn triangle_circumcenter(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Point3<Real> {
    let ab = b - a;
    let ac = c - a;
    let n = ab.cross(&ac);

    let num = n.cross(&ab) * ac.norm_squared() + ac.cross(&n) * ab.norm_squared();
    a + num / (2.0 * n.norm_squared())
}

/// Normal of the triangle `(a, b, c)` following the right-hand rule. Not normalized.
pub fn scaled_normal(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Vector3<Real> {
    (b - a).cross(&(c - a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orientation_sign_of_unit_tetrahedron() {
        let o = Point3::origin();
        let x = Point3::new(1.0, 0.0, 0.0);
        let y = Point3::new(0.0, 1.0, 0.0);
        let z = Point3::new(0.0, 0.0, 1.0);

        assert!(orientation(&o, &x, &y, &z) > 0.0);
        assert!(orientation(&o, &y, &x, &z) < 0.0);
        assert_eq!(orientation(&o, &x, &y, &Point3::new(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn circumsphere_membership() {
        let o = Point3::origin();
        let x = Point3::new(1.0, 0.0, 0.0);
        let y = Point3::new(0.0, 1.0, 0.0);
        let z = Point3::new(0.0, 0.0, 1.0);

        assert!(in_circumsphere(&o, &x, &y, &z, &Point3::new(0.25, 0.25, 0.25)));
        assert!(in_circumsphere(&o, &y, &x, &z, &Point3::new(0.25, 0.25, 0.25)));
        assert!(!in_circumsphere(&o, &x, &y, &z, &Point3::new(2.0, 2.0, 2.0)));
        // (1, 1, 1) is on the sphere.
        assert!(!in_circumsphere(&o, &x, &y, &z, &Point3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn circumcenters_are_equidistant() {
        let a = Point3::new(0.1, -0.3, 0.2);
        let b = Point3::new(1.2, 0.1, -0.4);
        let c = Point3::new(-0.2, 0.9, 0.3);
        let d = Point3::new(0.3, 0.2, 1.1);

        let center = tetrahedron_circumcenter(&a, &b, &c, &d);
        let r = na::distance(&center, &a);
        assert_relative_eq!(na::distance(&center, &b), r, epsilon = 1.0e-10);
        assert_relative_eq!(na::distance(&center, &c), r, epsilon = 1.0e-10);
        assert_relative_eq!(na::distance(&center, &d), r, epsilon = 1.0e-10);

        let center = triangle_circumcenter(&a, &b, &c);
        let r = na::distance(&center, &a);
        assert_relative_eq!(na::distance(&center, &b), r, epsilon = 1.0e-10);
        assert_relative_eq!(na::distance(&center, &c), r, epsilon = 1.0e-10);
        // The circumcenter lies on the triangle's plane.
        assert_relative_eq!(
            (center - a).dot(&scaled_normal(&a, &b, &c)),
            0.0,
            epsilon = 1.0e-10
        );
    }

    #[test]
    fn collinearity() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 2.0, 3.0);
        assert!(collinear(&a, &b, &Point3::new(2.0, 4.0, 6.0)));
        assert!(!collinear(&a, &b, &Point3::new(2.0, 4.0, 6.5)));
    }
}
