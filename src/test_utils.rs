use crate::Real;
use na::Point3;

/// Seeded pseudo-random points in the unit cube.
pub(crate) fn random_points(n: usize, seed: u64) -> Vec<Point3<Real>> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..n)
        .map(|_| Point3::new(rng.f64(), rng.f64(), rng.f64()))
        .collect()
}
