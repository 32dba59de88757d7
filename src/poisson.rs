use crate::assembly::{self, SystemStats};
use crate::config::ReconstructionConfig;
use crate::error::ReconstructionError;
use crate::evaluator::{FieldEvaluator, UNDEFINED_VALUE};
use crate::normalization;
use crate::refinement;
use crate::timing::Timed;
use crate::triangulation::Triangulation;
use crate::Real;
use na::{Point3, Vector3};
use parry::bounding_volume::BoundingSphere;
use std::time::Duration;

/// Statistics of a successful [`PoissonReconstruction::compute_implicit_function`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SolveStats {
    /// Number of Steiner points inserted by the Delaunay refinement.
    pub num_steiner_points: usize,
    /// Number of unknowns of the Poisson system.
    pub num_unknowns: usize,
    /// Time spent in the Delaunay refinement.
    pub refinement: Duration,
    /// Time spent assembling the Poisson system.
    pub assembly: Duration,
    /// Time spent factorizing the Poisson system.
    pub factorization: Duration,
    /// Time spent solving the factorized system.
    pub solve: Duration,
    /// Value of the raw solution subtracted to get a zero level-set through the input points.
    pub contouring_value: Real,
    /// Minimum of the implicit function, reached at [`PoissonReconstruction::get_inner_point`].
    pub sink_value: Real,
}

/// An implicit surface reconstructed by solving a Poisson equation on an adaptive
/// Delaunay tetrahedralization of the input points.
///
/// The implicit function is piecewise-linear over the tetrahedra, zero at the input points,
/// negative inside of the surface, and positive outside.
#[derive(Clone, Debug)]
pub struct PoissonReconstruction {
    tr: Triangulation,
    config: ReconstructionConfig,
    evaluator: FieldEvaluator,
    sink: Point3<Real>,
    last_stats: Option<SolveStats>,
}

impl Default for PoissonReconstruction {
    fn default() -> Self {
        Self::new(ReconstructionConfig::default())
    }
}

impl PoissonReconstruction {
    /// An empty reconstruction. Points must be added with [`Self::insert`] before calling
    /// [`Self::compute_implicit_function`].
    pub fn new(config: ReconstructionConfig) -> Self {
        Self {
            tr: Triangulation::new(),
            config,
            evaluator: FieldEvaluator::new(),
            sink: Point3::origin(),
            last_stats: None,
        }
    }

    /// Reconstruct a surface given a set of sample points and normals at these points.
    ///
    /// # Parameters
    /// - `points`: the sample points.
    /// - `normals`: the oriented normals at the sample points, pointing toward the outside of
    ///   the surface. Must have the same length as `points`.
    /// - `config`: the reconstruction parameters. [`ReconstructionConfig::default`] gives
    ///   sensible values for most inputs. The number of Steiner points inserted by the
    ///   refinement (hence the size of the linear system) is bounded by `config.max_vertices`.
    pub fn from_points_and_normals(
        points: &[Point3<Real>],
        normals: &[Vector3<Real>],
        config: ReconstructionConfig,
    ) -> Result<Self, ReconstructionError> {
        let mut result = Self::new(config);
        let _ = result.insert(points, normals)?;
        let _ = result.compute_implicit_function()?;
        Ok(result)
    }

    /// Adds sample points with their normals.
    ///
    /// Returns the number of new vertices. Points identical to an existing vertex are ignored.
    pub fn insert(
        &mut self,
        points: &[Point3<Real>],
        normals: &[Vector3<Real>],
    ) -> Result<usize, ReconstructionError> {
        if points.len() != normals.len() {
            return Err(ReconstructionError::MismatchedNormals {
                points: points.len(),
                normals: normals.len(),
            });
        }

        self.evaluator.reset();
        Ok(self.tr.insert_points(points, normals))
    }

    /// Removes all the points.
    pub fn clear(&mut self) {
        self.tr.clear();
        self.evaluator.reset();
        self.sink = Point3::origin();
        self.last_stats = None;
    }

    /// The parameters of this reconstruction.
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// The underlying triangulation, with the implicit function’s value at each vertex.
    pub fn triangulation(&self) -> &Triangulation {
        &self.tr
    }

    /// Statistics of the last successful call to [`Self::compute_implicit_function`].
    pub fn last_stats(&self) -> Option<&SolveStats> {
        self.last_stats.as_ref()
    }

    /// A sphere bounding the input points.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.tr.input_points_bounding_sphere()
    }

    /// Computes the implicit function from the points inserted so far.
    ///
    /// This refines the triangulation, solves the Poisson equation at its vertices, then
    /// shifts and orients the solution so that it is zero at the input points and negative
    /// inside of the surface. Must be called again after each insertion.
    ///
    /// If the linear solver fails, an error is returned and the vertex values are left unchanged.
    pub fn compute_implicit_function(&mut self) -> Result<SolveStats, ReconstructionError> {
        let _total = Timed::info("Implicit function computation");

        let timer = Timed::info("Delaunay refinement");
        let sphere_radius = self.bounding_sphere().radius();
        let num_steiner_points = self.delaunay_refinement(
            self.config.radius_edge_ratio_bound,
            sphere_radius * self.config.cell_radius_factor,
            self.config.max_vertices,
            self.config.enlarge_ratio,
        );
        let refinement = timer.elapsed();
        drop(timer);
        log::debug!(
            "Delaunay refinement: added {} Steiner points, {} vertices in total.",
            num_steiner_points,
            self.tr.number_of_vertices()
        );

        let timer = Timed::info("Poisson equation solve");
        let system = self.solve_poisson(self.config.lambda).inspect_err(|e| {
            log::error!("Cannot solve the Poisson equation: {}", e);
        })?;
        drop(timer);

        let contouring_value = self.median_value_at_input_vertices();
        let sink_value = self.set_contouring_value(contouring_value);

        let stats = SolveStats {
            num_steiner_points,
            num_unknowns: system.num_unknowns,
            refinement,
            assembly: system.assembly,
            factorization: system.factorization,
            solve: system.solve,
            contouring_value,
            sink_value,
        };
        log::info!(
            "Solved for {} unknowns, contouring value: {:e}, minimum: {:e}.",
            stats.num_unknowns,
            contouring_value,
            sink_value
        );

        self.last_stats = Some(stats);
        Ok(stats)
    }

    /// Inserts Steiner points at the corners of the cube inscribed in the enlarged bounding
    /// sphere, then at the circumcenters of badly shaped or too large tetrahedra.
    ///
    /// # Parameters
    /// - `radius_edge_ratio_bound`: bound on the ratio between a tetrahedron’s circumradius and
    ///   its shortest edge. Ignored if zero.
    /// - `cell_radius_bound`: bound on a tetrahedron’s circumradius. Ignored if zero.
    /// - `max_vertices`: the refinement stops once the triangulation has this many vertices.
    /// - `enlarge_ratio`: only tetrahedra with a circumcenter inside of the input points’
    ///   bounding sphere scaled by this ratio are refined.
    ///
    /// Returns the number of inserted points.
    pub fn delaunay_refinement(
        &mut self,
        radius_edge_ratio_bound: Real,
        cell_radius_bound: Real,
        max_vertices: usize,
        enlarge_ratio: Real,
    ) -> usize {
        let sphere = self.bounding_sphere();
        let enlarged = BoundingSphere::new(*sphere.center(), sphere.radius() * enlarge_ratio);
        self.evaluator.reset();

        let num_enclosing = refinement::insert_enclosing_points(&mut self.tr, &enlarged, max_vertices);
        num_enclosing
            + refinement::delaunay_refinement(
                &mut self.tr,
                radius_edge_ratio_bound,
                cell_radius_bound,
                max_vertices,
                &enlarged,
            )
    }

    /// Solves the Poisson equation at the vertices of the triangulation, without
    /// normalizing the result.
    ///
    /// `lambda` pulls the solution toward zero at the input points.
    pub fn solve_poisson(&mut self, lambda: Real) -> Result<SystemStats, ReconstructionError> {
        assembly::solve_poisson(&mut self.tr, lambda, &self.config)
    }

    /// Shifts the implicit function by `-contouring_value` and orients it so that it is
    /// positive on the convex hull.
    ///
    /// Returns the minimum value of the implicit function.
    pub fn set_contouring_value(&mut self, contouring_value: Real) -> Real {
        let (sink, sink_value) = normalization::set_contouring_value(&mut self.tr, contouring_value);
        self.sink = sink;
        sink_value
    }

    /// Median of the implicit function over the input points.
    pub fn median_value_at_input_vertices(&self) -> Real {
        normalization::median_value_at_input_vertices(&self.tr)
    }

    /// A point inside of the reconstructed surface: the vertex where the implicit function
    /// is minimal.
    pub fn get_inner_point(&self) -> Point3<Real> {
        self.sink
    }

    /// Evaluates the implicit function at the given 3D point.
    ///
    /// Returns [`UNDEFINED_VALUE`] if the point is outside of the triangulation.
    pub fn evaluate(&self, pt: &Point3<Real>) -> Real {
        self.evaluator.evaluate(&self.tr, pt)
    }

    /// Evaluates the implicit function’s gradient at the given 3D point.
    ///
    /// Returns `None` if the point is outside of the triangulation.
    pub fn evaluate_gradient(&self, pt: &Point3<Real>) -> Option<Vector3<Real>> {
        self.evaluator.evaluate_gradient(&self.tr, pt)
    }

    /// Is the implicit function defined at `pt`?
    pub fn is_defined_at(&self, pt: &Point3<Real>) -> bool {
        self.evaluate(pt) != UNDEFINED_VALUE
    }
}
