//! Phase 2: SLSQP-style local refinement under hard constraints.
//!
//! Iterates in unit-square coordinates. Each step linearises the margins
//! with finite differences, solves a two-variable QP (linearised margins
//! plus the unit box) exactly by enumerating active sets, and backtracks on
//! an L1 merit function. The Lagrangian Hessian is a damped BFGS estimate.

use tracing::debug;

use pt_types::{ParameterBounds, ProcessParameters, PtError, PtResult, PARAMETER_COUNT};

use crate::config::SqpConfig;
use crate::evaluator::CandidateEvaluator;

type Point = [f64; PARAMETER_COUNT];
type Matrix = [[f64; PARAMETER_COUNT]; PARAMETER_COUNT];

const IDENTITY: Matrix = [[1.0, 0.0], [0.0, 1.0]];
const ARMIJO: f64 = 1e-4;
const MULTIPLIER_TOLERANCE: f64 = 1e-10;
const RESTORATION_SWEEPS: usize = 50;
const PHASE: &str = "local";

/// Why the refinement stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTermination {
    Converged,
    MaxIterations,
}

/// State of the iterate after one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalStep {
    pub objective: f64,
    pub total_violation: f64,
}

impl LocalStep {
    /// Same scale as [`CandidateEvaluator::penalized`].
    pub fn penalized(&self, penalty_weight: f64) -> f64 {
        self.objective + penalty_weight * self.total_violation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutcome {
    pub params: ProcessParameters,
    pub objective: f64,
    pub margins: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: LocalTermination,
    /// Iterate after each iteration.
    pub trace: Vec<LocalStep>,
}

impl LocalOutcome {
    pub fn max_violation(&self) -> f64 {
        max_violation(&self.margins)
    }
}

/// Sequential quadratic programming from a single start point.
#[derive(Debug, Clone)]
pub struct SqpRefiner {
    config: SqpConfig,
    feasibility_tolerance: f64,
}

impl SqpRefiner {
    pub fn new(config: SqpConfig, feasibility_tolerance: f64) -> Self {
        Self {
            config,
            feasibility_tolerance,
        }
    }

    /// Refine `start` to a KKT point of the strict problem.
    ///
    /// Non-finite objective or margins, a singular update, or a line search
    /// that cannot make progress from an infeasible point are reported as
    /// [`OptimizationError::NumericalDegradation`](pt_types::OptimizationError).
    pub fn refine<E: CandidateEvaluator>(
        &self,
        evaluator: &E,
        start: &ProcessParameters,
    ) -> PtResult<LocalOutcome> {
        let bounds = *evaluator.bounds();
        let mut session = Session {
            evaluator,
            bounds,
            evaluations: 0,
        };
        let h = self.config.finite_difference_step;

        let mut x = clamp_unit(bounds.normalize(&bounds.clip(start)));
        let mut current = session.sample(&x)?;
        if !current.is_finite() {
            return Err(PtError::degradation(
                PHASE,
                format!("non-finite objective or margins at start point {start}"),
            ));
        }
        let scale = 1.0 / current.objective.abs().max(1.0);
        let mut lin = session.linearize(&x, &current, h)?;
        let m = current.margins.len();

        let mut hessian = IDENTITY;
        let mut penalty = 1.0;
        let mut trace = Vec::new();
        let mut iterations = 0;
        let mut termination = LocalTermination::MaxIterations;
        // A single flat step can land on a symmetric point of equal value.
        let mut stalled = false;

        for iteration in 1..=self.config.max_iterations {
            iterations = iteration;
            let grad = scaled(&lin.grad, scale);
            let rows = constraint_rows(&x, &current.margins, &lin.jacobian);
            let violation = max_violation(&current.margins);

            let (step, multipliers, restoring) = match solve_qp(&hessian, &grad, &rows) {
                Some(solution) => (solution.step, solution.multipliers[..m].to_vec(), false),
                None => (restoration_step(&rows), vec![0.0; m], true),
            };
            let step_norm = inf_norm(&step);

            if restoring {
                if step_norm <= self.config.step_tolerance {
                    return Err(PtError::degradation(
                        PHASE,
                        format!(
                            "linearised constraints inconsistent at {} with no restoring step",
                            bounds.denormalize(&x)
                        ),
                    ));
                }
            } else if violation <= self.feasibility_tolerance
                && (step_norm <= self.config.step_tolerance
                    || kkt_residual(&x, &grad, &lin.jacobian, &multipliers)
                        <= self.config.gradient_tolerance)
            {
                trace.push(current.step());
                termination = LocalTermination::Converged;
                break;
            }

            let largest = multipliers.iter().copied().fold(0.0, f64::max);
            if penalty <= largest {
                penalty = 1.5 * largest + 1e-3;
            }

            let search = LineSearch {
                x: &x,
                current: &current,
                step: &step,
                grad: &grad,
                penalty,
                scale,
                restoring,
            };
            let Some((x_next, next)) = self.line_search(&mut session, &search)? else {
                if violation <= self.feasibility_tolerance {
                    trace.push(current.step());
                    termination = LocalTermination::Converged;
                    break;
                }
                return Err(PtError::degradation(
                    PHASE,
                    format!("line search failed at iteration {iteration} from an infeasible point"),
                ));
            };

            let lin_next = session.linearize(&x_next, &next, h)?;
            let s = sub(&x_next, &x);
            let y = sub(
                &lagrangian_gradient(&lin_next, scale, &multipliers),
                &lagrangian_gradient(&lin, scale, &multipliers),
            );
            hessian = damped_bfgs(&hessian, &s, &y);
            if hessian.iter().flatten().any(|v| !v.is_finite()) {
                return Err(PtError::degradation(PHASE, "Hessian update is not finite"));
            }

            let change = (next.objective - current.objective).abs() * scale;
            x = x_next;
            current = next;
            lin = lin_next;
            trace.push(current.step());

            let violation = max_violation(&current.margins);
            debug!(
                iteration,
                objective = current.objective,
                violation,
                step = step_norm,
                restoring,
                "SQP iteration"
            );

            let flat = !restoring
                && violation <= self.feasibility_tolerance
                && change <= self.config.function_tolerance;
            if flat && stalled {
                termination = LocalTermination::Converged;
                break;
            }
            stalled = flat;
        }

        Ok(LocalOutcome {
            params: bounds.denormalize(&x),
            objective: current.objective,
            margins: current.margins,
            iterations,
            evaluations: session.evaluations,
            termination,
            trace,
        })
    }

    /// Backtracking on the L1 merit function, or on total violation for a
    /// restoration step.
    fn line_search<E: CandidateEvaluator>(
        &self,
        session: &mut Session<'_, E>,
        search: &LineSearch<'_>,
    ) -> PtResult<Option<(Point, Sample)>> {
        let merit =
            |s: &Sample| s.objective * search.scale + search.penalty * total_violation(&s.margins);
        let base_violation = total_violation(&search.current.margins);
        let base = merit(search.current);
        let slope = (dot(search.grad, search.step) - search.penalty * base_violation).min(0.0);

        let mut alpha = 1.0;
        for _ in 0..=self.config.max_line_search_steps {
            let trial = clamp_unit([
                search.x[0] + alpha * search.step[0],
                search.x[1] + alpha * search.step[1],
            ]);
            let sample = session.sample(&trial)?;
            if sample.is_finite() {
                let accepted = if search.restoring {
                    total_violation(&sample.margins) < base_violation
                } else {
                    merit(&sample) <= base + ARMIJO * alpha * slope
                };
                if accepted {
                    return Ok(Some((trial, sample)));
                }
            }
            alpha *= 0.5;
        }
        Ok(None)
    }
}

struct LineSearch<'a> {
    x: &'a Point,
    current: &'a Sample,
    step: &'a Point,
    grad: &'a Point,
    penalty: f64,
    scale: f64,
    restoring: bool,
}

#[derive(Debug, Clone)]
struct Sample {
    objective: f64,
    margins: Vec<f64>,
}

impl Sample {
    fn is_finite(&self) -> bool {
        self.objective.is_finite() && self.margins.iter().all(|m| m.is_finite())
    }

    fn step(&self) -> LocalStep {
        LocalStep {
            objective: self.objective,
            total_violation: total_violation(&self.margins),
        }
    }
}

/// Unscaled objective gradient and margin Jacobian in unit coordinates.
struct Linearization {
    grad: Point,
    jacobian: Vec<Point>,
}

struct Session<'a, E> {
    evaluator: &'a E,
    bounds: ParameterBounds,
    evaluations: usize,
}

impl<E: CandidateEvaluator> Session<'_, E> {
    fn sample(&mut self, x: &Point) -> PtResult<Sample> {
        let eval = self.evaluator.strict(&self.bounds.denormalize(x))?;
        self.evaluations += 1;
        Ok(Sample {
            objective: eval.objective,
            margins: eval.margins,
        })
    }

    /// Central differences, one-sided where a bound is within `h`.
    fn linearize(&mut self, x: &Point, at: &Sample, h: f64) -> PtResult<Linearization> {
        let mut grad = [0.0; PARAMETER_COUNT];
        let mut jacobian = vec![[0.0; PARAMETER_COUNT]; at.margins.len()];

        for d in 0..PARAMETER_COUNT {
            let shifted = |delta: f64| {
                let mut p = *x;
                p[d] += delta;
                p
            };
            let (minus, plus, width) = if x[d] - h < 0.0 {
                (at.clone(), self.sample(&shifted(h))?, h)
            } else if x[d] + h > 1.0 {
                (self.sample(&shifted(-h))?, at.clone(), h)
            } else {
                (self.sample(&shifted(-h))?, self.sample(&shifted(h))?, 2.0 * h)
            };
            if !minus.is_finite() || !plus.is_finite() {
                return Err(PtError::degradation(
                    PHASE,
                    format!("non-finite finite-difference sample near {}", self.bounds.denormalize(x)),
                ));
            }
            grad[d] = (plus.objective - minus.objective) / width;
            for (row, (hi, lo)) in jacobian
                .iter_mut()
                .zip(plus.margins.iter().zip(&minus.margins))
            {
                row[d] = (hi - lo) / width;
            }
        }
        Ok(Linearization { grad, jacobian })
    }
}

/// Half-space `normal . p <= bound` on the step `p`.
#[derive(Debug, Clone, Copy)]
struct Row {
    normal: Point,
    bound: f64,
}

/// Linearised margins first, then the unit box.
fn constraint_rows(x: &Point, margins: &[f64], jacobian: &[Point]) -> Vec<Row> {
    let mut rows: Vec<Row> = jacobian
        .iter()
        .zip(margins)
        .map(|(normal, margin)| Row {
            normal: *normal,
            bound: -margin,
        })
        .collect();
    for d in 0..PARAMETER_COUNT {
        let mut unit = [0.0; PARAMETER_COUNT];
        unit[d] = 1.0;
        rows.push(Row {
            normal: unit,
            bound: 1.0 - x[d],
        });
        rows.push(Row {
            normal: [-unit[0], -unit[1]],
            bound: x[d],
        });
    }
    rows
}

#[derive(Debug, Clone)]
struct QpSolution {
    step: Point,
    /// One multiplier per row.
    multipliers: Vec<f64>,
}

/// `min g.p + p.B.p / 2` subject to the rows, with `B` positive definite.
///
/// In two dimensions at most two rows are active at a vertex, so every
/// active set of size 0, 1 and 2 is tried and the lowest-value KKT point
/// kept. `None` when the rows admit no point.
fn solve_qp(hessian: &Matrix, g: &Point, rows: &[Row]) -> Option<QpSolution> {
    let inverse = invert(hessian)?;
    let free = scaled(&mat_vec(&inverse, g), -1.0);
    let mut best: Option<(f64, QpSolution)> = None;

    let mut offer = |step: Point, multipliers: Vec<f64>| {
        if multipliers.iter().any(|l| *l < -MULTIPLIER_TOLERANCE) || !admits(rows, &step) {
            return;
        }
        let value = dot(g, &step) + 0.5 * dot(&step, &mat_vec(hessian, &step));
        if best.as_ref().map_or(true, |(v, _)| value < *v) {
            best = Some((value, QpSolution { step, multipliers }));
        }
    };

    offer(free, vec![0.0; rows.len()]);

    for (i, row) in rows.iter().enumerate() {
        let inv_normal = mat_vec(&inverse, &row.normal);
        let curvature = dot(&row.normal, &inv_normal);
        if curvature <= f64::EPSILON {
            continue;
        }
        let lambda = (dot(&row.normal, &free) - row.bound) / curvature;
        let step = [
            free[0] - lambda * inv_normal[0],
            free[1] - lambda * inv_normal[1],
        ];
        let mut multipliers = vec![0.0; rows.len()];
        multipliers[i] = lambda;
        offer(step, multipliers);
    }

    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            let active = [rows[i].normal, rows[j].normal];
            let Some(step) = solve2(&active, &[rows[i].bound, rows[j].bound]) else {
                continue;
            };
            let bs = mat_vec(hessian, &step);
            let transposed = [[active[0][0], active[1][0]], [active[0][1], active[1][1]]];
            let Some(lambda) = solve2(&transposed, &[-g[0] - bs[0], -g[1] - bs[1]]) else {
                continue;
            };
            let mut multipliers = vec![0.0; rows.len()];
            multipliers[i] = lambda[0];
            multipliers[j] = lambda[1];
            offer(step, multipliers);
        }
    }

    best.map(|(_, solution)| solution)
}

fn admits(rows: &[Row], step: &Point) -> bool {
    rows.iter().all(|row| {
        let slack = 1e-9 * (1.0 + row.bound.abs() + inf_norm(&row.normal));
        dot(&row.normal, step) <= row.bound + slack
    })
}

/// Cyclic projections onto the violated half-spaces. Lands in their
/// intersection when it exists and near a compromise otherwise; the box
/// rows come last so the step stays inside the unit square.
fn restoration_step(rows: &[Row]) -> Point {
    let mut p = [0.0; PARAMETER_COUNT];
    for _ in 0..RESTORATION_SWEEPS {
        for row in rows {
            let norm2 = dot(&row.normal, &row.normal);
            if norm2 <= f64::EPSILON {
                continue;
            }
            let excess = dot(&row.normal, &p) - row.bound;
            if excess > 0.0 {
                p[0] -= excess / norm2 * row.normal[0];
                p[1] -= excess / norm2 * row.normal[1];
            }
        }
    }
    p
}

/// Largest component of the Lagrangian gradient not blocked by an active bound.
fn kkt_residual(x: &Point, grad: &Point, jacobian: &[Point], multipliers: &[f64]) -> f64 {
    let mut residual: f64 = 0.0;
    for d in 0..PARAMETER_COUNT {
        let mut component = grad[d];
        for (row, lambda) in jacobian.iter().zip(multipliers) {
            component += lambda * row[d];
        }
        let blocked = (x[d] <= 0.0 && component > 0.0) || (x[d] >= 1.0 && component < 0.0);
        if !blocked {
            residual = residual.max(component.abs());
        }
    }
    residual
}

fn lagrangian_gradient(lin: &Linearization, scale: f64, multipliers: &[f64]) -> Point {
    let mut g = scaled(&lin.grad, scale);
    for (row, lambda) in lin.jacobian.iter().zip(multipliers) {
        g[0] += lambda * row[0];
        g[1] += lambda * row[1];
    }
    g
}

/// BFGS update with Powell damping, which keeps the estimate positive definite.
fn damped_bfgs(b: &Matrix, s: &Point, y: &Point) -> Matrix {
    let bs = mat_vec(b, s);
    let sbs = dot(s, &bs);
    if sbs <= f64::EPSILON * f64::EPSILON {
        return *b;
    }
    let sy = dot(s, y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r = [
        theta * y[0] + (1.0 - theta) * bs[0],
        theta * y[1] + (1.0 - theta) * bs[1],
    ];
    let sr = dot(s, &r);
    if sr <= f64::EPSILON * f64::EPSILON {
        return *b;
    }
    let mut next = *b;
    for i in 0..PARAMETER_COUNT {
        for j in 0..PARAMETER_COUNT {
            next[i][j] += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
    next
}

fn solve2(a: &Matrix, rhs: &Point) -> Option<Point> {
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let magnitude = a.iter().flatten().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if magnitude == 0.0 || det.abs() <= 1e-12 * magnitude * magnitude {
        return None;
    }
    Some([
        (rhs[0] * a[1][1] - a[0][1] * rhs[1]) / det,
        (a[0][0] * rhs[1] - rhs[0] * a[1][0]) / det,
    ])
}

fn invert(a: &Matrix) -> Option<Matrix> {
    let columns = [solve2(a, &[1.0, 0.0])?, solve2(a, &[0.0, 1.0])?];
    Some([
        [columns[0][0], columns[1][0]],
        [columns[0][1], columns[1][1]],
    ])
}

fn mat_vec(a: &Matrix, v: &Point) -> Point {
    [
        a[0][0] * v[0] + a[0][1] * v[1],
        a[1][0] * v[0] + a[1][1] * v[1],
    ]
}

fn dot(a: &Point, b: &Point) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn sub(a: &Point, b: &Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

fn scaled(v: &Point, factor: f64) -> Point {
    [v[0] * factor, v[1] * factor]
}

fn inf_norm(v: &Point) -> f64 {
    v[0].abs().max(v[1].abs())
}

fn clamp_unit(x: Point) -> Point {
    [x[0].clamp(0.0, 1.0), x[1].clamp(0.0, 1.0)]
}

fn max_violation(margins: &[f64]) -> f64 {
    margins.iter().copied().fold(0.0, f64::max)
}

fn total_violation(margins: &[f64]) -> f64 {
    margins.iter().map(|m| m.max(0.0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bowl, fast_enough, ToyProblem};
    use approx::assert_relative_eq;

    fn refiner() -> SqpRefiner {
        SqpRefiner::new(SqpConfig::default(), 1e-4)
    }

    fn unit(p: &ProcessParameters) -> Point {
        ParameterBounds::default().normalize(p)
    }

    /// `u + v` in unit coordinates.
    fn diagonal(p: &ProcessParameters) -> f64 {
        let x = unit(p);
        x[0] + x[1]
    }

    /// Inside the circle of radius 0.5 around the `(1, 1)` corner.
    fn near_corner(p: &ProcessParameters) -> f64 {
        let x = unit(p);
        (x[0] - 1.0).powi(2) + (x[1] - 1.0).powi(2) - 0.25
    }

    fn fast_and_moderate(p: &ProcessParameters) -> f64 {
        -p.rate + ((p.die_temperature - 120.0) / 70.0).powi(2)
    }

    /// Unreachable inside the default bounds.
    fn impossible_rate(p: &ProcessParameters) -> f64 {
        0.4 - p.rate
    }

    #[test]
    fn unconstrained_quadratic_converges() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl);
        let outcome = refiner()
            .refine(&problem, &ProcessParameters::new(0.1, 100.0))
            .unwrap();
        assert_eq!(outcome.termination, LocalTermination::Converged);
        assert_relative_eq!(outcome.params.rate, 0.2, epsilon = 1e-5);
        assert_relative_eq!(outcome.params.die_temperature, 130.0, epsilon = 1e-2);
        assert_eq!(outcome.trace.len(), outcome.iterations);
    }

    #[test]
    fn active_linear_constraint_from_infeasible_start() {
        let problem =
            ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let outcome = refiner()
            .refine(&problem, &ProcessParameters::new(0.1, 100.0))
            .unwrap();
        assert_eq!(outcome.termination, LocalTermination::Converged);
        assert!(outcome.max_violation() <= 1e-8);
        assert_relative_eq!(outcome.params.rate, 0.25, epsilon = 1e-6);
        assert_relative_eq!(outcome.params.die_temperature, 130.0, epsilon = 1e-2);
    }

    #[test]
    fn equal_value_step_does_not_stop_refinement() {
        // The first step from (0.1, 100) reaches the (0.3, 160) corner, where
        // the bowl has the same value as at the start.
        let problem =
            ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let start = ProcessParameters::new(0.1, 100.0);
        let outcome = refiner().refine(&problem, &start).unwrap();
        assert!(outcome.iterations > 1);
        assert_relative_eq!(outcome.objective, 0.04, epsilon = 1e-8);
        assert!(outcome.objective < bowl(&start));
        assert_eq!(outcome.trace.len(), outcome.iterations);
    }

    #[test]
    fn optimum_on_box_bound() {
        let problem = ToyProblem::new(ParameterBounds::default(), fast_and_moderate);
        let outcome = refiner()
            .refine(&problem, &ProcessParameters::new(0.1, 150.0))
            .unwrap();
        assert_eq!(outcome.termination, LocalTermination::Converged);
        assert_relative_eq!(outcome.params.rate, 0.30, epsilon = 1e-9);
        assert_relative_eq!(outcome.params.die_temperature, 120.0, epsilon = 1e-2);
    }

    #[test]
    fn curved_constraint_is_followed() {
        let problem =
            ToyProblem::new(ParameterBounds::default(), diagonal).with_constraint(near_corner);
        let outcome = refiner()
            .refine(&problem, &ProcessParameters::new(0.275, 153.0))
            .unwrap();
        let x = unit(&outcome.params);
        let expected = 1.0 - 0.5 / 2f64.sqrt();
        assert!(outcome.max_violation() <= 1e-4);
        assert_relative_eq!(x[0], expected, epsilon = 1e-3);
        assert_relative_eq!(x[1], expected, epsilon = 1e-3);
    }

    #[test]
    fn nan_objective_is_degradation() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl).with_strict_nan();
        let err = refiner()
            .refine(&problem, &ProcessParameters::new(0.1, 100.0))
            .unwrap_err();
        assert!(err.is_degradation());
    }

    #[test]
    fn inconsistent_constraints_are_degradation() {
        let problem =
            ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(impossible_rate);
        let err = refiner()
            .refine(&problem, &ProcessParameters::new(0.1, 100.0))
            .unwrap_err();
        assert!(err.is_degradation());
    }

    #[test]
    fn evaluations_are_counted() {
        let problem =
            ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let outcome = refiner()
            .refine(&problem, &ProcessParameters::new(0.2, 120.0))
            .unwrap();
        assert_eq!(outcome.evaluations, problem.evaluations());
    }

    #[test]
    fn qp_respects_box_and_half_space() {
        // min (p0 - 2)^2 + (p1 - 2)^2 over p0 + p1 <= 1, |p| <= 1
        let g = [-4.0, -4.0];
        let hessian = [[2.0, 0.0], [0.0, 2.0]];
        let rows = constraint_rows(&[0.5, 0.5], &[-1.0], &[[1.0, 1.0]]);
        let solution = solve_qp(&hessian, &g, &rows).unwrap();
        assert_relative_eq!(solution.step[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(solution.step[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(solution.multipliers[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn qp_reports_inconsistency() {
        let rows = constraint_rows(&[0.5, 0.5], &[2.0], &[[-1.0, 0.0]]);
        assert!(solve_qp(&IDENTITY, &[0.0, 0.0], &rows).is_none());
        let step = restoration_step(&rows);
        assert_relative_eq!(step[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn damped_update_stays_positive_definite() {
        let b = damped_bfgs(&IDENTITY, &[1.0, 0.0], &[-1.0, 0.5]);
        let det = b[0][0] * b[1][1] - b[0][1] * b[1][0];
        assert!(b[0][0] > 0.0 && det > 0.0);
    }
}
