//! Incremental 3D Delaunay triangulation with an explicit infinite vertex.
//!
//! Cells are stored in an arena and referenced by [`CellId`]. The unbounded region outside
//! of the convex hull is covered by *infinite cells*: tetrahedra having the infinite vertex
//! as one of their vertices. Every cell therefore has exactly four neighbors, and the
//! neighbor `i` of a cell is the cell across the face opposite to its vertex `i`.

use crate::predicates;
use crate::Real;
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use na::{Point3, Vector3};
use parry::bounding_volume::{Aabb, BoundingSphere};
use parry::shape::Tetrahedron;

const INFINITE_VERTEX: VertexId = VertexId(0);
const NO_CELL: CellId = CellId(usize::MAX);

/// Handle of a vertex of a [`Triangulation`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) usize);

/// Handle of a cell (tetrahedron) of a [`Triangulation`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) usize);

/// The origin of a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum VertexRole {
    /// A sample point given by the user, with its normal.
    Input,
    /// A point inserted by the Delaunay refinement.
    Steiner,
}

/// A vertex of the triangulation, with the data of the Poisson solve.
#[derive(Clone, Debug)]
pub struct Vertex {
    /// The vertex position.
    pub point: Point3<Real>,
    /// The oriented normal of an input vertex. Zero for Steiner points.
    pub normal: Vector3<Real>,
    /// Whether this vertex is an input sample or a Steiner point.
    pub role: VertexRole,
    /// If `true`, `f` is a fixed value excluded from the unknowns of the linear system.
    pub constrained: bool,
    /// Value of the implicit function at this vertex.
    pub f: Real,
    pub(crate) index: Option<usize>,
    pub(crate) cell: Option<CellId>,
}

impl Vertex {
    fn new(point: Point3<Real>, normal: Vector3<Real>, role: VertexRole) -> Self {
        Self {
            point,
            normal,
            role,
            constrained: false,
            f: 0.0,
            index: None,
            cell: None,
        }
    }

    /// Row of this vertex in the linear system, if it is unconstrained and indexed.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

#[derive(Clone, Debug)]
struct Tet {
    vertices: [VertexId; 4],
    neighbors: [CellId; 4],
    alive: bool,
}

/// An edge, identified by a cell and the local indices of its two endpoints in this cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    /// A cell incident to the edge.
    pub cell: CellId,
    /// Local index of the first endpoint in `cell`.
    pub i: usize,
    /// Local index of the second endpoint in `cell`.
    pub j: usize,
}

/// Result of a point location.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// The triangulation has no cell yet.
    Empty,
    /// The point lies in this finite cell (boundary included).
    Inside(CellId),
    /// The point lies outside of the convex hull, beyond the hull face of this infinite cell.
    Outside(CellId),
}

pub(crate) enum Insertion {
    New {
        vertex: VertexId,
        cells: Vec<CellId>,
    },
    Existing(VertexId),
}

impl Insertion {
    pub fn vertex(&self) -> VertexId {
        match self {
            Insertion::New { vertex, .. } => *vertex,
            Insertion::Existing(vertex) => *vertex,
        }
    }
}

/// A 3D Delaunay triangulation storing the per-vertex data of the Poisson reconstruction.
///
/// While fewer than four affinely independent points have been inserted, the vertices are
/// kept aside and the triangulation has no cell.
#[derive(Clone, Debug)]
pub struct Triangulation {
    vertices: Vec<Vertex>,
    cells: Vec<Tet>,
    free_cells: Vec<CellId>,
    // Vertices inserted while all the points were coplanar.
    pending: Vec<VertexId>,
    last_cell: Option<CellId>,
}

impl Default for Triangulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Triangulation {
    /// Creates an empty triangulation.
    pub fn new() -> Self {
        let infinite = Vertex::new(Point3::origin(), Vector3::zeros(), VertexRole::Steiner);
        Self {
            vertices: vec![infinite],
            cells: vec![],
            free_cells: vec![],
            pending: vec![],
            last_cell: None,
        }
    }

    /// Removes all the vertices and cells.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// The number of finite vertices.
    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The number of finite cells.
    pub fn number_of_finite_cells(&self) -> usize {
        self.finite_cells().count()
    }

    /// Does this triangulation have at least one tetrahedron?
    pub fn has_cells(&self) -> bool {
        self.cells.len() > self.free_cells.len()
    }

    /// The vertex at infinity.
    pub fn infinite_vertex(&self) -> VertexId {
        INFINITE_VERTEX
    }

    /// Is `v` the vertex at infinity?
    pub fn is_infinite_vertex(&self, v: VertexId) -> bool {
        v == INFINITE_VERTEX
    }

    /// Is `cell` incident to the vertex at infinity?
    pub fn is_infinite_cell(&self, cell: CellId) -> bool {
        self.cells[cell.0].vertices.contains(&INFINITE_VERTEX)
    }

    /// Is `cell` a cell currently part of the triangulation?
    pub fn is_cell_alive(&self, cell: CellId) -> bool {
        self.cells.get(cell.0).map(|c| c.alive).unwrap_or(false)
    }

    /// The data attached to a vertex.
    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v.0]
    }

    /// The data attached to a vertex.
    pub fn vertex_mut(&mut self, v: VertexId) -> &mut Vertex {
        &mut self.vertices[v.0]
    }

    /// The position of a finite vertex.
    pub fn point(&self, v: VertexId) -> &Point3<Real> {
        &self.vertices[v.0].point
    }

    /// All the finite vertices, in insertion order.
    pub fn finite_vertices(&self) -> impl Iterator<Item = VertexId> {
        (1..self.vertices.len()).map(VertexId)
    }

    /// All the finite cells.
    pub fn finite_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.alive && !c.vertices.contains(&INFINITE_VERTEX))
            .map(|(id, _)| CellId(id))
    }

    /// The four vertices of a cell.
    pub fn cell_vertices(&self, cell: CellId) -> [VertexId; 4] {
        self.cells[cell.0].vertices
    }

    /// The four neighbors of a cell. Neighbor `i` is opposite to vertex `i`.
    pub fn cell_neighbors(&self, cell: CellId) -> [CellId; 4] {
        self.cells[cell.0].neighbors
    }

    /// The local index of `v` in `cell`, if `v` is a vertex of `cell`.
    pub fn index_in_cell(&self, cell: CellId, v: VertexId) -> Option<usize> {
        self.cells[cell.0].vertices.iter().position(|w| *w == v)
    }

    /// The tetrahedron of a finite cell.
    pub fn tetrahedron(&self, cell: CellId) -> Tetrahedron {
        let [a, b, c, d] = self.cell_points(cell);
        Tetrahedron::new(a, b, c, d)
    }

    /// The circumcenter of a finite cell, i.e., its dual Voronoi vertex.
    pub fn dual(&self, cell: CellId) -> Point3<Real> {
        let [a, b, c, d] = self.cell_points(cell);
        predicates::tetrahedron_circumcenter(&a, &b, &c, &d)
    }

    /// Is `point` strictly outside of the finite `cell`?
    pub fn has_on_unbounded_side(&self, cell: CellId, point: &Point3<Real>) -> bool {
        let pts = self.cell_points(cell);
        (0..4).any(|i| {
            let mut q = pts;
            q[i] = *point;
            predicates::orientation(&q[0], &q[1], &q[2], &q[3]) < 0.0
        })
    }

    fn cell_points(&self, cell: CellId) -> [Point3<Real>; 4] {
        self.cells[cell.0].vertices.map(|v| self.vertices[v.0].point)
    }

    /// The two local indices in `0..4` distinct from `i` and `j`.
    pub fn other_two_indices(i: usize, j: usize) -> (usize, usize) {
        debug_assert!(i != j && i < 4 && j < 4);
        let mut others = (0..4).filter(|k| *k != i && *k != j);
        let k = others.next().unwrap_or(0);
        let l = others.next().unwrap_or(0);
        (k, l)
    }

    /*
     * Insertion.
     */

    /// Inserts a point with its normal.
    ///
    /// Returns the new vertex, or the existing vertex located at the exact same position.
    pub fn insert(&mut self, point: Point3<Real>, normal: Vector3<Real>, role: VertexRole) -> VertexId {
        self.insert_with_hint(point, normal, role, None).vertex()
    }

    /// Inserts input points with their normals, in a spatially coherent order.
    ///
    /// Returns the number of vertices created.
    pub fn insert_points(&mut self, points: &[Point3<Real>], normals: &[Vector3<Real>]) -> usize {
        debug_assert_eq!(points.len(), normals.len());

        if points.is_empty() {
            return 0;
        }

        // Sorting along the largest dimension keeps consecutive points close to each other,
        // so the location walks remain short.
        let aabb = Aabb::from_points(points);
        let axis = aabb.extents().imax();
        let order = (0..points.len())
            .sorted_by(|a, b| points[*a][axis].total_cmp(&points[*b][axis]));

        let mut num_inserted = 0;

        for i in order {
            let insertion = self.insert_with_hint(points[i], normals[i], VertexRole::Input, None);
            if matches!(insertion, Insertion::New { .. }) {
                num_inserted += 1;
            }
        }

        num_inserted
    }

    pub(crate) fn insert_with_hint(
        &mut self,
        point: Point3<Real>,
        normal: Vector3<Real>,
        role: VertexRole,
        hint: Option<CellId>,
    ) -> Insertion {
        if !self.has_cells() {
            return self.insert_without_cells(point, normal, role);
        }

        let location = self.locate(&point, hint.or(self.last_cell));

        if let Location::Inside(cell) = location {
            for v in self.cells[cell.0].vertices {
                if self.vertices[v.0].point == point {
                    return Insertion::Existing(v);
                }
            }
        }

        let vertex = self.push_vertex(point, normal, role);
        let cells = self.star(vertex, location);
        Insertion::New { vertex, cells }
    }

    fn push_vertex(&mut self, point: Point3<Real>, normal: Vector3<Real>, role: VertexRole) -> VertexId {
        self.vertices.push(Vertex::new(point, normal, role));
        VertexId(self.vertices.len() - 1)
    }

    fn insert_without_cells(
        &mut self,
        point: Point3<Real>,
        normal: Vector3<Real>,
        role: VertexRole,
    ) -> Insertion {
        if let Some(existing) = self
            .pending
            .iter()
            .find(|v| self.vertices[v.0].point == point)
        {
            return Insertion::Existing(*existing);
        }

        let vertex = self.push_vertex(point, normal, role);
        self.pending.push(vertex);

        match self.find_initial_tetrahedron(vertex) {
            Some(tet) => {
                let cells = self.build_from_pending(tet);
                Insertion::New { vertex, cells }
            }
            None => Insertion::New {
                vertex,
                cells: vec![],
            },
        }
    }

    // All the pending points are coplanar. Check if `last` breaks this coplanarity.
    fn find_initial_tetrahedron(&self, last: VertexId) -> Option<[VertexId; 4]> {
        let a = *self.pending.first()?;
        let b = *self.pending.get(1)?;
        let pa = self.point(a);
        let pb = self.point(b);
        let c = *self.pending[2..]
            .iter()
            .find(|c| !predicates::collinear(pa, pb, self.point(**c)))?;

        if c == last {
            return None;
        }

        if predicates::orientation(pa, pb, self.point(c), self.point(last)) != 0.0 {
            Some([a, b, c, last])
        } else {
            None
        }
    }

    fn build_from_pending(&mut self, tet: [VertexId; 4]) -> Vec<CellId> {
        let [a, b, c, d] = tet;
        let vertices = if predicates::orientation(self.point(a), self.point(b), self.point(c), self.point(d)) > 0.0 {
            [a, b, c, d]
        } else {
            [b, a, c, d]
        };

        let mut created = vec![self.new_cell(vertices)];

        for i in 0..4 {
            let mut infinite = vertices;
            infinite[i] = INFINITE_VERTEX;
            // Flip the orientation so that replacing the infinite vertex by a point beyond
            // the hull face yields a positively oriented tetrahedron.
            infinite.swap((i + 1) % 4, (i + 2) % 4);
            created.push(self.new_cell(infinite));
        }

        self.link_faces(&created);
        self.update_vertex_cells(&created);
        self.last_cell = Some(created[0]);

        let pending = std::mem::take(&mut self.pending);

        for vertex in pending {
            if tet.contains(&vertex) {
                continue;
            }

            // Pending points are pairwise distinct, so none of them can already be a vertex.
            let location = self.locate(&self.vertices[vertex.0].point, self.last_cell);
            created.extend(self.star(vertex, location));
        }

        created.sort();
        created.dedup();
        created.retain(|c| self.cells[c.0].alive);
        created
    }

    fn new_cell(&mut self, vertices: [VertexId; 4]) -> CellId {
        let tet = Tet {
            vertices,
            neighbors: [NO_CELL; 4],
            alive: true,
        };

        if let Some(id) = self.free_cells.pop() {
            self.cells[id.0] = tet;
            id
        } else {
            self.cells.push(tet);
            CellId(self.cells.len() - 1)
        }
    }

    fn remove_cell(&mut self, cell: CellId) {
        self.cells[cell.0].alive = false;
        self.free_cells.push(cell);
    }

    // Connects the cells of `cells` sharing a face.
    fn link_faces(&mut self, cells: &[CellId]) {
        let mut faces: FnvHashMap<[VertexId; 3], (CellId, usize)> = FnvHashMap::default();

        for cell in cells {
            let vertices = self.cells[cell.0].vertices;

            for k in 0..4 {
                let mut key = [
                    vertices[(k + 1) % 4],
                    vertices[(k + 2) % 4],
                    vertices[(k + 3) % 4],
                ];
                key.sort();

                if let Some((other, other_k)) = faces.remove(&key) {
                    self.cells[cell.0].neighbors[k] = other;
                    self.cells[other.0].neighbors[other_k] = *cell;
                } else {
                    let _ = faces.insert(key, (*cell, k));
                }
            }
        }
    }

    fn update_vertex_cells(&mut self, cells: &[CellId]) {
        for cell in cells {
            for v in self.cells[cell.0].vertices {
                self.vertices[v.0].cell = Some(*cell);
            }
        }
    }

    fn in_conflict(&self, cell: CellId, point: &Point3<Real>) -> bool {
        let tet = &self.cells[cell.0];

        match tet.vertices.iter().position(|v| *v == INFINITE_VERTEX) {
            None => {
                let [a, b, c, d] = self.cell_points(cell);
                predicates::in_circumsphere(&a, &b, &c, &d, point)
            }
            Some(k) => {
                let mut pts = tet.vertices.map(|v| self.vertices[v.0].point);
                pts[k] = *point;
                let orientation = predicates::orientation(&pts[0], &pts[1], &pts[2], &pts[3]);

                if orientation > 0.0 {
                    true
                } else if orientation < 0.0 {
                    false
                } else {
                    // On the hull face’s plane: conflict iff inside the face’s circumcircle,
                    // i.e., iff in conflict with the finite cell behind the face.
                    self.in_conflict(tet.neighbors[k], point)
                }
            }
        }
    }

    // Bowyer-Watson: removes the cells in conflict with the new vertex and fills the
    // cavity with a star of cells incident to it.
    fn star(&mut self, vertex: VertexId, location: Location) -> Vec<CellId> {
        let start = match location {
            Location::Inside(cell) | Location::Outside(cell) => cell,
            Location::Empty => return vec![],
        };
        let point = self.vertices[vertex.0].point;
        debug_assert!(self.in_conflict(start, &point));

        let mut conflicts = FnvHashSet::default();
        let _ = conflicts.insert(start);
        let mut stack = vec![start];
        let mut boundary = vec![];

        while let Some(cell) = stack.pop() {
            for i in 0..4 {
                let neighbor = self.cells[cell.0].neighbors[i];

                if conflicts.contains(&neighbor) {
                    continue;
                }

                if self.in_conflict(neighbor, &point) {
                    let _ = conflicts.insert(neighbor);
                    stack.push(neighbor);
                } else {
                    boundary.push((cell, i, neighbor));
                }
            }
        }

        let mut created = Vec::with_capacity(boundary.len());

        for (cell, i, outside) in boundary {
            let mut vertices = self.cells[cell.0].vertices;
            vertices[i] = vertex;
            let new_cell = self.new_cell(vertices);
            self.cells[new_cell.0].neighbors[i] = outside;

            let back = self.cells[outside.0]
                .neighbors
                .iter()
                .position(|n| *n == cell);
            debug_assert!(back.is_some(), "Broken neighborhood relationship.");

            if let Some(back) = back {
                self.cells[outside.0].neighbors[back] = new_cell;
            }

            created.push(new_cell);
        }

        // Only the faces incident to the new vertex are matched here.
        self.link_faces(&created);

        for cell in conflicts {
            self.remove_cell(cell);
        }

        self.update_vertex_cells(&created);
        self.last_cell = created
            .iter()
            .copied()
            .find(|c| !self.is_infinite_cell(*c))
            .or(created.first().copied());

        created
    }

    /*
     * Location.
     */

    /// Locates the cell containing `point`, walking from `hint` if it is provided.
    ///
    /// The hint only affects performance: the result does not depend on it.
    pub fn locate(&self, point: &Point3<Real>, hint: Option<CellId>) -> Location {
        let start = hint
            .filter(|c| self.is_cell_alive(*c))
            .or(self.last_cell.filter(|c| self.is_cell_alive(*c)))
            .or_else(|| self.cells.iter().position(|c| c.alive).map(CellId));

        let Some(mut current) = start else {
            return Location::Empty;
        };

        if let Some(k) = self.index_in_cell(current, INFINITE_VERTEX) {
            current = self.cells[current.0].neighbors[k];
        }

        let mut visited = FnvHashSet::default();

        loop {
            if !visited.insert(current) {
                log::debug!("Cycle detected during the point location, falling back to a scan.");
                return self.locate_by_scan(point);
            }

            match self.exit_face(current, point) {
                None => return Location::Inside(current),
                Some(i) => {
                    let next = self.cells[current.0].neighbors[i];

                    if self.is_infinite_cell(next) {
                        return Location::Outside(next);
                    }

                    current = next;
                }
            }
        }
    }

    // The index of a face of the finite `cell` separating it from `point`, if any.
    fn exit_face(&self, cell: CellId, point: &Point3<Real>) -> Option<usize> {
        let pts = self.cell_points(cell);

        (0..4).find(|i| {
            let mut q = pts;
            q[*i] = *point;
            predicates::orientation(&q[0], &q[1], &q[2], &q[3]) < 0.0
        })
    }

    fn locate_by_scan(&self, point: &Point3<Real>) -> Location {
        if let Some(cell) = self
            .finite_cells()
            .find(|c| self.exit_face(*c, point).is_none())
        {
            return Location::Inside(cell);
        }

        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.alive)
            .map(|(id, _)| CellId(id))
            .find(|c| self.is_infinite_cell(*c) && self.in_conflict(*c, point))
            .map(Location::Outside)
            .unwrap_or(Location::Empty)
    }

    /*
     * Adjacency queries.
     */

    /// All the cells (finite or not) incident to `v`.
    pub fn incident_cells(&self, v: VertexId) -> Vec<CellId> {
        let Some(start) = self.vertices[v.0].cell.filter(|c| self.is_cell_alive(*c)) else {
            return vec![];
        };

        let mut visited = FnvHashSet::default();
        let _ = visited.insert(start);
        let mut result = vec![start];
        let mut curr = 0;

        while curr < result.len() {
            let tet = &self.cells[result[curr].0];
            curr += 1;

            for k in 0..4 {
                // The face opposite to any other vertex contains `v`.
                if tet.vertices[k] != v && visited.insert(tet.neighbors[k]) {
                    result.push(tet.neighbors[k]);
                }
            }
        }

        result
    }

    /// All the vertices (possibly including the infinite vertex) sharing an edge with `v`.
    pub fn incident_vertices(&self, v: VertexId) -> Vec<VertexId> {
        let mut result: Vec<_> = self
            .incident_cells(v)
            .into_iter()
            .flat_map(|c| self.cells[c.0].vertices)
            .filter(|w| *w != v)
            .collect();
        result.sort();
        result.dedup();
        result
    }

    /// The edge between `u` and `v`, if it exists.
    pub fn is_edge(&self, u: VertexId, v: VertexId) -> Option<Edge> {
        self.incident_cells(u).into_iter().find_map(|cell| {
            let j = self.index_in_cell(cell, v)?;
            let i = self.index_in_cell(cell, u)?;
            Some(Edge { cell, i, j })
        })
    }

    /// The cells incident to an edge, in circular order around it, starting with
    /// `edge.cell`.
    pub fn incident_cells_around_edge(&self, edge: Edge) -> Vec<CellId> {
        let start = edge.cell;
        let vertices = self.cells[start.0].vertices;
        let u = vertices[edge.i];
        let w = vertices[edge.j];
        let (k, l) = Self::other_two_indices(edge.i, edge.j);

        let mut result = vec![start];
        let mut current = start;
        // We leave the current cell through the face opposite to `pivot`.
        let mut pivot = vertices[k];
        let mut other = vertices[l];

        while let Some(pivot_id) = self.index_in_cell(current, pivot) {
            let next = self.cells[current.0].neighbors[pivot_id];

            if next == start || result.len() > self.cells.len() {
                break;
            }

            // We entered `next` through the face (u, w, other), so we leave it through
            // the face opposite to `other`.
            let next_vertices = self.cells[next.0].vertices;
            let Some(new_other) = next_vertices
                .iter()
                .copied()
                .find(|x| *x != u && *x != w && *x != other)
            else {
                break;
            };

            result.push(next);
            pivot = other;
            other = new_other;
            current = next;
        }

        result
    }

    /// A finite vertex on the convex hull: the hull vertex farthest from the center of the
    /// input points' bounding sphere (the first one in case of tie).
    ///
    /// If the triangulation has no cell, all the vertices are considered to be on the hull.
    pub fn any_vertex_on_convex_hull(&self) -> Option<VertexId> {
        let center = *self.input_points_bounding_sphere().center();
        let hull = if self.has_cells() {
            self.incident_vertices(INFINITE_VERTEX)
        } else {
            self.finite_vertices().collect()
        };

        hull.into_iter()
            .filter(|v| *v != INFINITE_VERTEX)
            .rev()
            .max_by(|a, b| {
                let da = na::distance_squared(self.point(*a), &center);
                let db = na::distance_squared(self.point(*b), &center);
                da.total_cmp(&db)
            })
    }

    /// A sphere bounding all the input (non-Steiner) points.
    pub fn input_points_bounding_sphere(&self) -> BoundingSphere {
        let input_points: Vec<_> = self
            .vertices
            .iter()
            .skip(1)
            .filter(|v| v.role == VertexRole::Input)
            .map(|v| v.point)
            .collect();

        if input_points.is_empty() {
            BoundingSphere::new(Point3::origin(), 0.0)
        } else {
            Aabb::from_points(&input_points).bounding_sphere()
        }
    }

    /// Assigns consecutive system indices to the unconstrained vertices.
    ///
    /// Returns the number of unconstrained vertices.
    pub fn index_unconstrained_vertices(&mut self) -> usize {
        let mut num_unconstrained = 0;

        for vertex in self.vertices.iter_mut().skip(1) {
            if vertex.constrained {
                vertex.index = None;
            } else {
                vertex.index = Some(num_unconstrained);
                num_unconstrained += 1;
            }
        }

        num_unconstrained
    }

    /// Checks the combinatorial and geometric validity of this triangulation: finite cells
    /// are positively oriented, neighborhood relationships are symmetric, and the Delaunay
    /// property holds across every finite face.
    pub fn is_valid(&self) -> bool {
        for (id, tet) in self.cells.iter().enumerate() {
            if !tet.alive {
                continue;
            }

            let cell = CellId(id);
            let infinite = self.is_infinite_cell(cell);

            if !infinite {
                let [a, b, c, d] = self.cell_points(cell);
                if predicates::orientation(&a, &b, &c, &d) <= 0.0 {
                    return false;
                }
            }

            for i in 0..4 {
                let neighbor = tet.neighbors[i];

                if !self.is_cell_alive(neighbor) {
                    return false;
                }

                let other = &self.cells[neighbor.0];
                let Some(back) = other.neighbors.iter().position(|n| *n == cell) else {
                    return false;
                };

                // The two cells must share exactly the face opposite to `i`.
                let shared = (0..4)
                    .filter(|k| *k != i)
                    .all(|k| other.vertices.contains(&tet.vertices[k]));
                if !shared || tet.vertices.contains(&other.vertices[back]) {
                    return false;
                }

                let opposite = other.vertices[back];
                if !infinite
                    && opposite != INFINITE_VERTEX
                    && self.in_conflict(cell, &self.vertices[opposite.0].point)
                {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::random_points;
    use approx::assert_relative_eq;

    fn unit_tetrahedron() -> Triangulation {
        let mut tr = Triangulation::new();
        for pt in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ] {
            let _ = tr.insert(pt, Vector3::zeros(), VertexRole::Input);
        }
        tr
    }

    #[test]
    fn no_cells_until_four_independent_points() {
        let mut tr = Triangulation::new();
        let _ = tr.insert(Point3::new(0.0, 0.0, 0.0), Vector3::zeros(), VertexRole::Input);
        let _ = tr.insert(Point3::new(1.0, 0.0, 0.0), Vector3::zeros(), VertexRole::Input);
        let _ = tr.insert(Point3::new(2.0, 0.0, 0.0), Vector3::zeros(), VertexRole::Input);
        let _ = tr.insert(Point3::new(0.0, 1.0, 0.0), Vector3::zeros(), VertexRole::Input);
        assert!(!tr.has_cells());
        assert_eq!(tr.number_of_vertices(), 4);
        assert_eq!(tr.locate(&Point3::origin(), None), Location::Empty);

        let _ = tr.insert(Point3::new(0.0, 0.0, 1.0), Vector3::zeros(), VertexRole::Input);
        assert!(tr.has_cells());
        assert_eq!(tr.number_of_vertices(), 5);
        assert!(tr.is_valid());
        // Every vertex must be part of the triangulation.
        for v in tr.finite_vertices() {
            assert!(!tr.incident_cells(v).is_empty());
        }
    }

    #[test]
    fn duplicate_points_are_merged() {
        let mut tr = unit_tetrahedron();
        let v1 = tr.insert(Point3::new(0.2, 0.2, 0.2), Vector3::zeros(), VertexRole::Input);
        let v2 = tr.insert(Point3::new(0.2, 0.2, 0.2), Vector3::x(), VertexRole::Input);
        let v3 = tr.insert(Point3::new(1.0, 0.0, 0.0), Vector3::zeros(), VertexRole::Input);
        assert_eq!(v1, v2);
        assert_eq!(v3, VertexId(2));
        assert_eq!(tr.number_of_vertices(), 5);
    }

    #[test]
    fn single_tetrahedron_structure() {
        let tr = unit_tetrahedron();
        assert_eq!(tr.number_of_finite_cells(), 1);
        assert!(tr.is_valid());

        // Each vertex is incident to the finite cell and to three of the four infinite cells.
        for v in tr.finite_vertices() {
            assert_eq!(tr.incident_cells(v).len(), 4);
            assert_eq!(tr.incident_vertices(v).len(), 4);
        }

        assert_eq!(tr.incident_cells(tr.infinite_vertex()).len(), 4);
        assert!(tr.any_vertex_on_convex_hull().is_some());
    }

    #[test]
    fn random_insertions_keep_a_valid_delaunay_triangulation() {
        let points = random_points(200, 42);
        let normals = vec![Vector3::zeros(); points.len()];
        let mut tr = Triangulation::new();
        assert_eq!(tr.insert_points(&points, &normals), 200);
        assert_eq!(tr.number_of_vertices(), 200);
        assert!(tr.is_valid());

        let volume: Real = tr.finite_cells().map(|c| tr.tetrahedron(c).volume()).sum();
        let hull_volume_upper_bound = 1.0;
        assert!(volume > 0.5 && volume <= hull_volume_upper_bound + 1.0e-9);
    }

    #[test]
    fn grid_points_with_cospherical_degeneracies() {
        let mut tr = Triangulation::new();

        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    let pt = Point3::new(i as Real, j as Real, k as Real);
                    let _ = tr.insert(pt, Vector3::zeros(), VertexRole::Input);
                }
            }
        }

        assert_eq!(tr.number_of_vertices(), 64);
        assert!(tr.is_valid());
        let volume: Real = tr.finite_cells().map(|c| tr.tetrahedron(c).volume()).sum();
        assert_relative_eq!(volume, 27.0, epsilon = 1.0e-9);
    }

    #[test]
    fn locate_inside_and_outside() {
        let tr = unit_tetrahedron();
        let inside = Point3::new(0.1, 0.1, 0.1);
        let outside = Point3::new(2.0, 2.0, 2.0);

        assert!(matches!(tr.locate(&inside, None), Location::Inside(_)));

        match tr.locate(&outside, None) {
            Location::Outside(cell) => assert!(tr.is_infinite_cell(cell)),
            other => panic!("unexpected location: {:?}", other),
        }
    }

    #[test]
    fn locate_does_not_depend_on_the_hint() {
        let points = random_points(100, 7);
        let normals = vec![Vector3::zeros(); points.len()];
        let mut tr = Triangulation::new();
        let _ = tr.insert_points(&points, &normals);

        let query = Point3::new(0.5, 0.45, 0.55);
        let reference = tr.locate(&query, None);
        let containing = match reference {
            Location::Inside(cell) => cell,
            other => panic!("unexpected location: {:?}", other),
        };

        for hint in tr.finite_cells().step_by(17) {
            match tr.locate(&query, Some(hint)) {
                Location::Inside(cell) => {
                    // The query point is in general position, so the containing cell is unique.
                    assert_eq!(cell, containing);
                }
                other => panic!("unexpected location: {:?}", other),
            }
        }
    }

    #[test]
    fn scan_fallback_agrees_with_the_walk() {
        let points = random_points(100, 11);
        let normals = vec![Vector3::zeros(); points.len()];
        let mut tr = Triangulation::new();
        let _ = tr.insert_points(&points, &normals);

        for query in random_points(20, 12) {
            let walk = tr.locate(&query, None);
            let scan = tr.locate_by_scan(&query);

            match (walk, scan) {
                (Location::Inside(a), Location::Inside(b)) => {
                    // Both cells contain the query point.
                    assert!(tr.exit_face(a, &query).is_none());
                    assert!(tr.exit_face(b, &query).is_none());
                }
                (Location::Outside(a), Location::Outside(b)) => {
                    assert!(tr.is_infinite_cell(a) && tr.is_infinite_cell(b));
                    assert!(tr.in_conflict(b, &query));
                }
                other => panic!("walk and scan disagree: {:?}", other),
            }
        }
    }

    #[test]
    fn edge_circulation_visits_the_whole_star() {
        let points = random_points(80, 3);
        let normals = vec![Vector3::zeros(); points.len()];
        let mut tr = Triangulation::new();
        let _ = tr.insert_points(&points, &normals);

        for u in tr.finite_vertices().take(20) {
            for w in tr.incident_vertices(u) {
                let edge = tr.is_edge(u, w).expect("adjacent vertices must share an edge");
                let around = tr.incident_cells_around_edge(edge);
                let mut expected: Vec<_> = tr
                    .incident_cells(u)
                    .into_iter()
                    .filter(|c| tr.index_in_cell(*c, w).is_some())
                    .collect();
                let mut found = around.clone();
                expected.sort();
                found.sort();
                found.dedup();
                assert_eq!(found.len(), around.len());
                assert_eq!(found, expected);

                // Consecutive cells are neighbors.
                for (a, b) in around.iter().zip(around.iter().cycle().skip(1)) {
                    assert!(tr.cell_neighbors(*a).contains(b));
                }
            }
        }
    }

    #[test]
    fn indexing_skips_constrained_vertices() {
        let mut tr = unit_tetrahedron();
        let v = tr.finite_vertices().nth(1).unwrap();
        tr.vertex_mut(v).constrained = true;

        assert_eq!(tr.index_unconstrained_vertices(), 3);
        assert_eq!(tr.vertex(v).index(), None);
        let indices: Vec<_> = tr
            .finite_vertices()
            .filter_map(|v| tr.vertex(v).index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn bounding_sphere_ignores_steiner_points() {
        let mut tr = unit_tetrahedron();
        let _ = tr.insert(Point3::new(10.0, 10.0, 10.0), Vector3::zeros(), VertexRole::Steiner);
        let sphere = tr.input_points_bounding_sphere();
        assert_relative_eq!(*sphere.center(), Point3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(sphere.radius(), (0.75 as Real).sqrt(), epsilon = 1.0e-12);
    }
}
