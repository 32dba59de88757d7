//! Point evaluation of the piecewise-linear implicit function.

use crate::triangulation::{CellId, Location, Triangulation};
use crate::Real;
use na::{Matrix3, Point3, Vector3};
use parry::shape::Tetrahedron;
use std::cell::Cell;

/// Value returned where the implicit function is undefined, i.e., outside of the convex
/// hull of the triangulation.
pub const UNDEFINED_VALUE: Real = 1.0e38;

/// Evaluates the implicit function by barycentric interpolation of its vertex values.
///
/// The evaluator remembers the last cell it located a point in, and starts the next
/// location from it. Consecutive queries close to each other are therefore cheap.
#[derive(Clone, Debug, Default)]
pub struct FieldEvaluator {
    hint: Cell<Option<CellId>>,
}

impl FieldEvaluator {
    /// An evaluator without location hint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the location hint.
    pub fn reset(&self) {
        self.hint.set(None);
    }

    /// The value of the implicit function at `pt`, or [`UNDEFINED_VALUE`] if `pt` is
    /// outside of the triangulation.
    pub fn evaluate(&self, tr: &Triangulation, pt: &Point3<Real>) -> Real {
        let Some(cell) = self.locate(tr, pt) else {
            return UNDEFINED_VALUE;
        };

        let weights = barycentric_coordinates(tr, cell, pt);
        tr.cell_vertices(cell)
            .iter()
            .zip(weights.iter())
            .map(|(v, w)| tr.vertex(*v).f * *w)
            .sum()
    }

    /// The gradient of the implicit function at `pt`, constant over each tetrahedron.
    ///
    /// Returns `None` if `pt` is outside of the triangulation.
    pub fn evaluate_gradient(&self, tr: &Triangulation, pt: &Point3<Real>) -> Option<Vector3<Real>> {
        let cell = self.locate(tr, pt)?;
        let [a, b, c, d] = tr.cell_vertices(cell).map(|v| tr.vertex(v));

        let edges = Matrix3::from_rows(&[
            (b.point - a.point).transpose(),
            (c.point - a.point).transpose(),
            (d.point - a.point).transpose(),
        ]);
        let df = Vector3::new(b.f - a.f, c.f - a.f, d.f - a.f);

        edges.lu().solve(&df)
    }

    fn locate(&self, tr: &Triangulation, pt: &Point3<Real>) -> Option<CellId> {
        match tr.locate(pt, self.hint.get()) {
            Location::Inside(cell) => {
                self.hint.set(Some(cell));
                Some(cell)
            }
            Location::Outside(cell) => {
                self.hint.set(Some(cell));
                None
            }
            Location::Empty => None,
        }
    }
}

/// Barycentric coordinates of `pt` relative to the four vertices of the finite `cell`.
///
/// Computed as the absolute values of the ratios between the signed volumes of the
/// sub-tetrahedra and the signed volume of `cell`, so they are nonnegative even if `pt`
/// is slightly outside of `cell`.
pub fn barycentric_coordinates(tr: &Triangulation, cell: CellId, pt: &Point3<Real>) -> [Real; 4] {
    let tetra = tr.tetrahedron(cell);
    let volume = tetra.signed_volume();

    if volume == 0.0 {
        return [0.25; 4];
    }

    let pts = [tetra.a, tetra.b, tetra.c, tetra.d];

    std::array::from_fn(|i| {
        let mut sub = pts;
        sub[i] = *pt;
        (Tetrahedron::new(sub[0], sub[1], sub[2], sub[3]).signed_volume() / volume).abs()
    })
}
