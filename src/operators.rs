//! Discrete differential operators on the Delaunay triangulation: divergence of the normal
//! field at a vertex, and cotangent weight of an edge.

use crate::config::DivergenceScheme;
use crate::predicates;
use crate::triangulation::{CellId, Edge, Triangulation, VertexId};
use crate::Real;
use itertools::Itertools;
use na::{Point3, Vector3};
use parry::shape::Triangle;

/// Divergence of the normal field at the vertex `v`.
///
/// Sums, over every finite cell incident to `v`, the flux of the cell’s averaged normal
/// through the face opposite to `v`.
pub fn divergence(tr: &Triangulation, v: VertexId, scheme: DivergenceScheme) -> Real {
    let x = *tr.point(v);
    let mut div = 0.0;

    for cell in tr.incident_cells(v) {
        if tr.is_infinite_cell(cell) {
            continue;
        }

        // Zero normal: no need to compute anything else.
        let Some(n) = cell_normal(tr, cell) else {
            continue;
        };
        let Some(index) = tr.index_in_cell(cell, v) else {
            continue;
        };

        let vertices = tr.cell_vertices(cell);
        let a = tr.point(vertices[(index + 1) % 4]);
        let b = tr.point(vertices[(index + 2) % 4]);
        let c = tr.point(vertices[(index + 3) % 4]);

        // The parity of the local index gives the ordering for which the face normal
        // points away from `v`.
        let nn = if index % 2 == 0 {
            predicates::scaled_normal(a, b, c)
        } else {
            predicates::scaled_normal(a, c, b)
        };
        let area = Triangle::new(*a, *b, *c).area();
        let flux = n.dot(&nn.normalize()) * area;

        div += match scheme {
            DivergenceScheme::Standard => flux,
            DivergenceScheme::Normalized => flux * 3.0 / spoke_length(&x, a, b, c),
            DivergenceScheme::SolidAngleNormalized => {
                flux * 3.0 / spoke_length(&x, a, b, c) * solid_angle(&x, a, b, c)
            }
        };
    }

    div
}

fn spoke_length(x: &Point3<Real>, a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Real {
    na::distance(x, a) + na::distance(x, b) + na::distance(x, c)
}

/// Solid angle subtended at `x` by the triangle `(a, b, c)` (Van Oosterom and Strackee).
pub fn solid_angle(x: &Point3<Real>, a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Real {
    let p = a - x;
    let q = b - x;
    let r = c - x;
    let (pn, qn, rn) = (p.norm(), q.norm(), r.norm());

    let numerator = p.dot(&q.cross(&r)).abs();
    let denominator = pn * qn * rn + p.dot(&q) * rn + q.dot(&r) * pn + r.dot(&p) * qn;
    2.0 * numerator.atan2(denominator)
}

/// Unit average of the four vertex normals of `cell`, or `None` if they sum to zero.
pub fn cell_normal(tr: &Triangulation, cell: CellId) -> Option<Vector3<Real>> {
    let n: Vector3<Real> = tr
        .cell_vertices(cell)
        .iter()
        .map(|v| tr.vertex(*v).normal)
        .sum();
    let sq_norm = n.norm_squared();

    if sq_norm != 0.0 {
        Some(n / sq_norm.sqrt())
    } else {
        None
    }
}

/// Cotangent weight of an edge: area of its dual Voronoi face divided by its length.
pub fn cotan_geometric(tr: &Triangulation, edge: Edge) -> Real {
    let vertices = tr.cell_vertices(edge.cell);
    let pi = tr.point(vertices[edge.i]);
    let pj = tr.point(vertices[edge.j]);
    area_voronoi_face(tr, edge) / na::distance(pi, pj)
}

/// Area of the Voronoi face dual to `edge`.
///
/// If the edge lies on the convex hull, its dual face is unbounded and
/// an approximation built from the finite incident cells is returned instead.
pub fn area_voronoi_face(tr: &Triangulation, edge: Edge) -> Real {
    let cells = tr.incident_cells_around_edge(edge);

    if cells.iter().any(|c| tr.is_infinite_cell(*c)) {
        return area_voronoi_face_boundary(tr, edge, &cells);
    }

    let voronoi_points: Vec<_> = cells.iter().map(|c| tr.dual(*c)).collect();
    debug_assert!(
        voronoi_points.len() >= 3,
        "An interior edge must have at least three incident cells."
    );

    if voronoi_points.len() < 3 {
        return 0.0;
    }

    // Fan triangulation of the (convex, planar) dual face.
    let a = voronoi_points[0];
    voronoi_points[1..]
        .iter()
        .tuple_windows()
        .map(|(b, c)| Triangle::new(a, *b, *c).area())
        .sum()
}

fn area_voronoi_face_boundary(tr: &Triangulation, edge: Edge, cells: &[CellId]) -> Real {
    let vertices = tr.cell_vertices(edge.cell);
    let vi = vertices[edge.i];
    let vj = vertices[edge.j];
    let pi = *tr.point(vi);
    let pj = *tr.point(vj);
    let m = na::center(&pi, &pj);
    let mut area = 0.0;

    for cell in cells {
        if tr.is_infinite_cell(*cell) {
            continue;
        }

        let (Some(i), Some(j)) = (tr.index_in_cell(*cell, vi), tr.index_in_cell(*cell, vj)) else {
            continue;
        };
        let (k, l) = Triangulation::other_two_indices(i, j);
        let cell_vertices = tr.cell_vertices(*cell);
        let (vk, vl) = (cell_vertices[k], cell_vertices[l]);
        debug_assert!(vk != vi && vk != vj && vl != vi && vl != vj);

        let pk = tr.point(vk);
        let pl = tr.point(vl);

        // The circumcenter of a sliver may lie far outside of it. Use the
        // centroid instead in that case.
        let mut c = tr.dual(*cell);
        if tr.has_on_unbounded_side(*cell, &c) {
            c = tr.tetrahedron(*cell).center();
        }

        let ck = predicates::triangle_circumcenter(&pi, &pj, pk);
        let cl = predicates::triangle_circumcenter(&pi, &pj, pl);

        area += Triangle::new(m, c, ck).area();
        area += Triangle::new(m, c, cl).area();
    }

    area
}
