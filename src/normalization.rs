//! Shifts and orients the solved field so that the surface is its zero level-set, and the
//! field is negative inside of it.

use crate::evaluator::UNDEFINED_VALUE;
use crate::triangulation::{Triangulation, VertexRole};
use crate::Real;
use na::Point3;

/// Median of the field values at the input vertices.
///
/// Averages the two middle values if the number of input vertices is even. Returns `0.0`
/// if there is no input vertex.
pub fn median_value_at_input_vertices(tr: &Triangulation) -> Real {
    let mut values: Vec<Real> = tr
        .finite_vertices()
        .map(|v| tr.vertex(v))
        .filter(|v| v.role == VertexRole::Input)
        .map(|v| v.f)
        .collect();

    if values.is_empty() {
        log::warn!("No input vertex to compute the contouring value from.");
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;

    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Shifts the field so that `contouring_value` becomes zero, then negates it if its
/// value on the convex hull is negative.
///
/// Returns the sink: the vertex position where the field is minimal, with this minimal value.
pub fn set_contouring_value(tr: &mut Triangulation, contouring_value: Real) -> (Point3<Real>, Real) {
    let vertices: Vec<_> = tr.finite_vertices().collect();

    for v in &vertices {
        tr.vertex_mut(*v).f -= contouring_value;
    }

    if let Some(hull_vertex) = tr.any_vertex_on_convex_hull() {
        if tr.vertex(hull_vertex).f < 0.0 {
            for v in &vertices {
                let vertex = tr.vertex_mut(*v);
                vertex.f = -vertex.f;
            }
        }
    }

    find_sink(tr)
}

/// The position and value of the vertex with the smallest field value.
///
/// Returns the origin and [`UNDEFINED_VALUE`] if the triangulation has no vertex.
pub fn find_sink(tr: &Triangulation) -> (Point3<Real>, Real) {
    let mut sink = (Point3::origin(), UNDEFINED_VALUE);

    for v in tr.finite_vertices() {
        let vertex = tr.vertex(v);

        if vertex.f < sink.1 {
            sink = (vertex.point, vertex.f);
        }
    }

    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Vector3;

    fn with_values(values: &[(Real, VertexRole)]) -> Triangulation {
        let mut tr = Triangulation::new();

        for (k, (f, role)) in values.iter().enumerate() {
            let k = k as Real;
            // Points on a twisted cubic are never coplanar.
            let v = tr.insert(Point3::new(k, k * k, k * k * k), Vector3::zeros(), *role);
            tr.vertex_mut(v).f = *f;
        }

        tr
    }

    #[test]
    fn median_of_odd_and_even_counts() {
        let tr = with_values(&[
            (3.0, VertexRole::Input),
            (1.0, VertexRole::Input),
            (2.0, VertexRole::Input),
            (-100.0, VertexRole::Steiner),
        ]);
        assert_eq!(median_value_at_input_vertices(&tr), 2.0);

        let tr = with_values(&[
            (4.0, VertexRole::Input),
            (1.0, VertexRole::Input),
            (2.0, VertexRole::Input),
            (3.0, VertexRole::Input),
        ]);
        assert_eq!(median_value_at_input_vertices(&tr), 2.5);

        let tr = with_values(&[(1.0, VertexRole::Input)]);
        assert_eq!(median_value_at_input_vertices(&tr), 1.0);
    }

    #[test]
    fn median_without_input_vertices_is_zero() {
        let tr = with_values(&[(5.0, VertexRole::Steiner)]);
        assert_eq!(median_value_at_input_vertices(&tr), 0.0);
        assert_eq!(median_value_at_input_vertices(&Triangulation::new()), 0.0);
    }

    #[test]
    fn contouring_shifts_and_orients_the_field() {
        let mut tr = with_values(&[
            (-1.0, VertexRole::Input),
            (-2.0, VertexRole::Input),
            (-3.0, VertexRole::Input),
            (-4.0, VertexRole::Input),
            (-5.0, VertexRole::Input),
        ]);
        let hull_vertex = tr.any_vertex_on_convex_hull().unwrap();
        let median = median_value_at_input_vertices(&tr);
        assert_eq!(median, -3.0);

        let (sink, min) = set_contouring_value(&mut tr, median);

        assert!(tr.vertex(hull_vertex).f >= 0.0);
        assert_eq!(median_value_at_input_vertices(&tr), 0.0);
        assert_eq!(min, -2.0);

        let values: Vec<_> = tr.finite_vertices().map(|v| tr.vertex(v).f).collect();
        let argmin = values.iter().position(|f| *f == min).unwrap();
        assert_eq!(sink, *tr.point(tr.finite_vertices().nth(argmin).unwrap()));
    }

    #[test]
    fn empty_field_has_an_undefined_sink() {
        let mut tr = Triangulation::new();
        let (sink, min) = set_contouring_value(&mut tr, 0.0);
        assert_eq!(sink, Point3::origin());
        assert_eq!(min, UNDEFINED_VALUE);
    }
}
