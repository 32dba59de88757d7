//! Delaunay refinement: breaks badly shaped or too large tetrahedra by inserting their
//! circumcenters.

use crate::triangulation::{CellId, Insertion, Triangulation, VertexId, VertexRole};
use crate::Real;
use itertools::Itertools;
use na::{Point3, Vector3};
use parry::bounding_volume::BoundingSphere;
use std::collections::VecDeque;

/// Inserts Steiner points until every finite tetrahedron with a circumcenter inside
/// `enlarged_sphere` satisfies both bounds, or until the triangulation reaches
/// `max_vertices` vertices.
///
/// A cell is bad if the ratio between its circumradius and its shortest edge exceeds
/// `radius_edge_ratio_bound`, or if its circumradius exceeds `cell_radius_bound`.
/// A bound set to zero is ignored. Steiner points get a zero normal.
///
/// Returns the number of inserted vertices.
pub fn delaunay_refinement(
    tr: &mut Triangulation,
    radius_edge_ratio_bound: Real,
    cell_radius_bound: Real,
    max_vertices: usize,
    enlarged_sphere: &BoundingSphere,
) -> usize {
    let criteria = CellCriteria {
        sq_ratio_bound: radius_edge_ratio_bound * radius_edge_ratio_bound,
        sq_radius_bound: cell_radius_bound * cell_radius_bound,
    };

    if criteria.sq_ratio_bound == 0.0 && criteria.sq_radius_bound == 0.0 {
        return 0;
    }

    // Entries store the cell’s vertices to detect the cells destroyed since they were pushed.
    let mut queue: VecDeque<(CellId, [VertexId; 4])> = tr
        .finite_cells()
        .map(|c| (c, tr.cell_vertices(c)))
        .collect();
    let mut num_inserted = 0;

    while let Some((cell, vertices)) = queue.pop_front() {
        if !tr.is_cell_alive(cell) || tr.cell_vertices(cell) != vertices {
            continue;
        }

        let Some(center) = refinement_point(tr, cell, &criteria, enlarged_sphere) else {
            continue;
        };

        if tr.number_of_vertices() >= max_vertices {
            log::debug!(
                "Delaunay refinement stopped: the budget of {} vertices is reached.",
                max_vertices
            );
            break;
        }

        if let Insertion::New { cells, .. } =
            tr.insert_with_hint(center, Vector3::zeros(), VertexRole::Steiner, Some(cell))
        {
            num_inserted += 1;

            for new_cell in cells {
                if !tr.is_infinite_cell(new_cell) {
                    queue.push_back((new_cell, tr.cell_vertices(new_cell)));
                }
            }
        }
    }

    num_inserted
}

/// Inserts the eight corners of the cube inscribed in `enlarged_sphere` as Steiner points,
/// so that the convex hull of the triangulation lies away from the input points.
///
/// Returns the number of inserted vertices.
pub fn insert_enclosing_points(
    tr: &mut Triangulation,
    enlarged_sphere: &BoundingSphere,
    max_vertices: usize,
) -> usize {
    let half_side = enlarged_sphere.radius() / (3.0 as Real).sqrt();

    if half_side <= 0.0 {
        return 0;
    }

    let center = enlarged_sphere.center();
    let mut num_inserted = 0;

    for i in 0..8 {
        if tr.number_of_vertices() >= max_vertices {
            break;
        }

        let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
        let corner = center + Vector3::new(sign(1), sign(2), sign(4)) * half_side;

        if let Insertion::New { .. } =
            tr.insert_with_hint(corner, Vector3::zeros(), VertexRole::Steiner, None)
        {
            num_inserted += 1;
        }
    }

    num_inserted
}

struct CellCriteria {
    sq_ratio_bound: Real,
    sq_radius_bound: Real,
}

impl CellCriteria {
    fn is_bad(&self, pts: &[Point3<Real>; 4], sq_radius: Real) -> bool {
        if self.sq_radius_bound > 0.0 && sq_radius > self.sq_radius_bound {
            return true;
        }

        if self.sq_ratio_bound > 0.0 {
            let min_sq_edge = pts
                .iter()
                .tuple_combinations()
                .map(|(a, b)| na::distance_squared(a, b))
                .fold(Real::MAX, Real::min);

            return sq_radius > self.sq_ratio_bound * min_sq_edge;
        }

        false
    }
}

// The circumcenter of `cell` if the cell must be refined.
fn refinement_point(
    tr: &Triangulation,
    cell: CellId,
    criteria: &CellCriteria,
    enlarged_sphere: &BoundingSphere,
) -> Option<Point3<Real>> {
    let pts = tr.cell_vertices(cell).map(|v| *tr.point(v));
    let center = tr.dual(cell);

    let sq_bound = enlarged_sphere.radius() * enlarged_sphere.radius();
    if na::distance_squared(&center, enlarged_sphere.center()) >= sq_bound {
        return None;
    }

    let sq_radius = na::distance_squared(&center, &pts[0]);
    criteria.is_bad(&pts, sq_radius).then_some(center)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_with_center() -> Triangulation {
        let mut tr = Triangulation::new();
        for i in 0..8 {
            let pt = Point3::new((i & 1) as Real, ((i >> 1) & 1) as Real, ((i >> 2) & 1) as Real);
            let _ = tr.insert(pt, Vector3::zeros(), VertexRole::Input);
        }
        let _ = tr.insert(Point3::new(0.48, 0.51, 0.53), Vector3::zeros(), VertexRole::Input);
        tr
    }

    fn enlarged_sphere(tr: &Triangulation, ratio: Real) -> BoundingSphere {
        let sphere = tr.input_points_bounding_sphere();
        BoundingSphere::new(*sphere.center(), sphere.radius() * ratio)
    }

    #[test]
    fn cells_are_refined_down_to_the_radius_bound() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);
        let radius_bound = 0.3;

        let added = delaunay_refinement(&mut tr, 0.0, radius_bound, usize::MAX, &sphere);
        assert!(added > 0);
        assert_eq!(tr.number_of_vertices(), 9 + added);
        assert!(tr.is_valid());

        for cell in tr.finite_cells() {
            let center = tr.dual(cell);
            if na::distance(&center, sphere.center()) < sphere.radius() * 0.999 {
                let radius = na::distance(&center, tr.point(tr.cell_vertices(cell)[0]));
                assert!(radius <= radius_bound * 1.0001);
            }
        }

        for v in tr.finite_vertices().skip(9) {
            assert_eq!(tr.vertex(v).role, VertexRole::Steiner);
            assert_eq!(tr.vertex(v).normal, Vector3::zeros());
            assert!(!tr.vertex(v).constrained);
        }
    }

    #[test]
    fn vertex_budget_is_respected() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);

        let added = delaunay_refinement(&mut tr, 2.5, 0.05, 40, &sphere);
        assert_eq!(added, 31);
        assert_eq!(tr.number_of_vertices(), 40);
        assert!(tr.is_valid());
    }

    #[test]
    fn zero_bounds_disable_refinement() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);
        assert_eq!(delaunay_refinement(&mut tr, 0.0, 0.0, usize::MAX, &sphere), 0);
        assert_eq!(tr.number_of_vertices(), 9);
    }

    #[test]
    fn enclosing_points_make_the_hull() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);
        assert_eq!(insert_enclosing_points(&mut tr, &sphere, usize::MAX), 8);
        assert!(tr.is_valid());

        for v in tr.incident_vertices(tr.infinite_vertex()) {
            assert_eq!(tr.vertex(v).role, VertexRole::Steiner);
            assert!((na::distance(tr.point(v), sphere.center()) - sphere.radius()).abs() < 1.0e-9);
        }

        let hull_vertex = tr.any_vertex_on_convex_hull().unwrap();
        assert_eq!(tr.vertex(hull_vertex).role, VertexRole::Steiner);
    }

    #[test]
    fn enclosing_points_respect_the_budget() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);
        assert_eq!(insert_enclosing_points(&mut tr, &sphere, 12), 3);
        assert_eq!(
            insert_enclosing_points(&mut tr, &BoundingSphere::new(Point3::origin(), 0.0), 100),
            0
        );
    }

    #[test]
    fn nothing_is_inserted_outside_of_the_enlarged_sphere() {
        let mut tr = cube_with_center();
        let sphere = enlarged_sphere(&tr, 1.5);
        let _ = delaunay_refinement(&mut tr, 2.5, 0.2, 2_000, &sphere);

        for v in tr.finite_vertices().skip(9) {
            assert!(na::distance(tr.point(v), sphere.center()) < sphere.radius());
        }
    }
}
