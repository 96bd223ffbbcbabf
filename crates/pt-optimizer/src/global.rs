//! Phase 1: differential-evolution global search on the penalized objective.
//!
//! The population lives in unit-square coordinates and is mapped onto the
//! scenario bounds only for evaluation. Updating is deferred: every trial
//! of a generation is drawn from the RNG first, the batch is evaluated
//! (optionally on the rayon pool), and replacements are applied in
//! population order. Serial and parallel runs therefore agree bit for bit.

use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

use pt_types::{PtResult, PARAMETER_COUNT};

use crate::config::{DifferentialEvolutionConfig, InitMethod, MutationStrategy};
use crate::evaluator::{Candidate, CandidateEvaluator};

type Point = [f64; PARAMETER_COUNT];

/// What the global phase hands to the local phase.
#[derive(Debug, Clone)]
pub struct GlobalOutcome {
    /// Best member of the final population by penalized objective.
    pub best: Candidate,
    /// Lowest-objective feasible candidate seen in any evaluation.
    pub best_feasible: Option<Candidate>,
    /// Candidate with the smallest total violation seen in any evaluation.
    pub least_violating: Candidate,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub timed_out: bool,
    /// Best penalized objective after initialisation and after each generation.
    pub trace: Vec<f64>,
}

/// Seeded differential evolution over a [`CandidateEvaluator`].
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    config: DifferentialEvolutionConfig,
    tie_tolerance: f64,
    feasibility_tolerance: f64,
}

impl DifferentialEvolution {
    pub fn new(
        config: DifferentialEvolutionConfig,
        tie_tolerance: f64,
        feasibility_tolerance: f64,
    ) -> Self {
        Self {
            config,
            tie_tolerance,
            feasibility_tolerance,
        }
    }

    pub fn run<E: CandidateEvaluator>(&self, evaluator: &E, seed: u64) -> PtResult<GlobalOutcome> {
        let started = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = self.config.population_size;

        let mut points: Vec<Point> = match self.config.init {
            InitMethod::LatinHypercube => latin_hypercube(n, &mut rng),
            InitMethod::Random => (0..n).map(|_| [rng.gen(), rng.gen()]).collect(),
        };
        let mut population = self.evaluate_batch(evaluator, &points)?;
        let mut evaluations = n;

        let mut archive = Archive::new(self.feasibility_tolerance);
        population.iter().for_each(|c| archive.observe(c));

        let mut trace = vec![lowest_penalized(&population)];
        let mut generations = 0;
        let mut converged = false;
        let mut timed_out = false;

        info!(
            population = n,
            max_generations = self.config.max_generations,
            strategy = ?self.config.strategy,
            parallel = self.config.parallel,
            "Starting differential evolution"
        );

        for generation in 1..=self.config.max_generations {
            if let Some(limit) = self.config.time_limit_secs {
                if started.elapsed().as_secs_f64() >= limit {
                    timed_out = true;
                    break;
                }
            }

            let mutation = rng.gen_range(self.config.mutation_min..=self.config.mutation_max);
            let best = select_best(&population, self.tie_tolerance);
            let trials: Vec<Point> = (0..n)
                .map(|i| self.trial(i, best, &points, mutation, &mut rng))
                .collect();

            let scored = self.evaluate_batch(evaluator, &trials)?;
            evaluations += n;
            for (i, (trial, candidate)) in trials.into_iter().zip(scored).enumerate() {
                archive.observe(&candidate);
                if candidate.penalized < population[i].penalized {
                    points[i] = trial;
                    population[i] = candidate;
                }
            }

            generations = generation;
            let best = lowest_penalized(&population);
            trace.push(best);
            debug!(
                generation,
                best,
                mutation,
                "Differential evolution generation"
            );

            if self.has_converged(&population) {
                converged = true;
                break;
            }
        }

        let best = population[select_best(&population, self.tie_tolerance)];
        let (best_feasible, least_violating) = archive.finish(best);
        info!(
            generations,
            evaluations,
            converged,
            timed_out,
            best = best.penalized,
            feasible_found = best_feasible.is_some(),
            "Differential evolution finished"
        );

        Ok(GlobalOutcome {
            best,
            best_feasible,
            least_violating,
            generations,
            evaluations,
            converged,
            timed_out,
            trace,
        })
    }

    fn evaluate_batch<E: CandidateEvaluator>(
        &self,
        evaluator: &E,
        points: &[Point],
    ) -> PtResult<Vec<Candidate>> {
        let bounds = *evaluator.bounds();
        let score = |unit: &Point| -> PtResult<Candidate> {
            let params = bounds.denormalize(unit);
            let eval = evaluator.penalized(&params)?;
            Ok(Candidate::from_penalized(params, &eval))
        };
        if self.config.parallel {
            points.par_iter().map(score).collect()
        } else {
            points.iter().map(score).collect()
        }
    }

    /// Mutant plus binomial crossover for population member `target`.
    fn trial(
        &self,
        target: usize,
        best: usize,
        points: &[Point],
        mutation: f64,
        rng: &mut ChaCha8Rng,
    ) -> Point {
        let n = points.len();
        // three distinct members other than the target
        let picks: Vec<usize> = index::sample(rng, n - 1, 3)
            .into_iter()
            .map(|k| if k >= target { k + 1 } else { k })
            .collect();
        let base = match self.config.strategy {
            MutationStrategy::Best1Bin => points[best],
            MutationStrategy::Rand1Bin => points[picks[2]],
        };
        let (r1, r2) = (points[picks[0]], points[picks[1]]);

        let forced = rng.gen_range(0..PARAMETER_COUNT);
        let mut trial = points[target];
        for d in 0..PARAMETER_COUNT {
            if d == forced || rng.gen::<f64>() < self.config.crossover_rate {
                trial[d] = (base[d] + mutation * (r1[d] - r2[d])).clamp(0.0, 1.0);
            }
        }
        trial
    }

    fn has_converged(&self, population: &[Candidate]) -> bool {
        let n = population.len() as f64;
        let mean = population.iter().map(|c| c.penalized).sum::<f64>() / n;
        let variance = population
            .iter()
            .map(|c| (c.penalized - mean).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt() <= self.config.absolute_tolerance + self.config.tolerance * mean.abs()
    }
}

/// One point per stratum along each axis, strata paired at random.
fn latin_hypercube(n: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    let mut points = vec![[0.0; PARAMETER_COUNT]; n];
    for d in 0..PARAMETER_COUNT {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(rng);
        for (point, stratum) in points.iter_mut().zip(strata) {
            point[d] = (stratum as f64 + rng.gen::<f64>()) / n as f64;
        }
    }
    points
}

fn lowest_penalized(population: &[Candidate]) -> f64 {
    population
        .iter()
        .map(|c| c.penalized)
        .fold(f64::INFINITY, f64::min)
}

/// Index of the lowest penalized objective. Candidates within
/// `tie_tolerance` of it are ranked by total violation, then by position.
pub(crate) fn select_best(population: &[Candidate], tie_tolerance: f64) -> usize {
    let min = lowest_penalized(population);
    let mut best: Option<usize> = None;
    for (i, c) in population.iter().enumerate() {
        if !(c.penalized <= min + tie_tolerance) {
            continue;
        }
        match best {
            Some(b) if population[b].total_violation <= c.total_violation => {}
            _ => best = Some(i),
        }
    }
    best.unwrap_or(0)
}

/// Running record of the best feasible and least violating candidates.
struct Archive {
    tolerance: f64,
    best_feasible: Option<Candidate>,
    least_violating: Option<Candidate>,
}

impl Archive {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            best_feasible: None,
            least_violating: None,
        }
    }

    fn observe(&mut self, candidate: &Candidate) {
        if candidate.is_feasible(self.tolerance) && candidate.objective.is_finite() {
            match self.best_feasible {
                Some(best) if best.objective <= candidate.objective => {}
                _ => self.best_feasible = Some(*candidate),
            }
        }
        match self.least_violating {
            Some(least)
                if least.total_violation < candidate.total_violation
                    || (least.total_violation == candidate.total_violation
                        && least.penalized <= candidate.penalized) => {}
            _ => self.least_violating = Some(*candidate),
        }
    }

    fn finish(self, fallback: Candidate) -> (Option<Candidate>, Candidate) {
        (self.best_feasible, self.least_violating.unwrap_or(fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bowl, fast_enough, ToyProblem};
    use pt_types::{ParameterBounds, ProcessParameters};

    fn exhaustive() -> DifferentialEvolutionConfig {
        DifferentialEvolutionConfig {
            tolerance: 0.0,
            ..DifferentialEvolutionConfig::default()
        }
    }

    fn candidate(penalized: f64, total_violation: f64) -> Candidate {
        Candidate {
            params: ProcessParameters::new(0.1, 100.0),
            objective: penalized,
            penalized,
            total_violation,
            max_violation: total_violation,
        }
    }

    #[test]
    fn finds_unconstrained_minimum() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl);
        let de = DifferentialEvolution::new(exhaustive(), 1e-9, 1e-4);
        let outcome = de.run(&problem, 7).unwrap();

        let best = outcome.best_feasible.unwrap();
        assert!((best.params.rate - 0.2).abs() < 1e-3, "{}", best.params);
        assert!((best.params.die_temperature - 130.0).abs() < 0.5, "{}", best.params);
        assert!(best.objective < 1e-4);
    }

    #[test]
    fn penalty_pushes_onto_constraint() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let de = DifferentialEvolution::new(exhaustive(), 1e-9, 1e-4);
        let outcome = de.run(&problem, 11).unwrap();

        let best = outcome.best_feasible.unwrap();
        assert!(best.max_violation <= 1e-4);
        assert!((best.params.rate - 0.25).abs() < 5e-3, "{}", best.params);
        assert!((best.params.die_temperature - 130.0).abs() < 2.0, "{}", best.params);
    }

    #[test]
    fn same_seed_same_run() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let de = DifferentialEvolution::new(DifferentialEvolutionConfig::default(), 1e-9, 1e-4);
        let first = de.run(&problem, 3).unwrap();
        let second = de.run(&problem, 3).unwrap();
        assert_eq!(first.best, second.best);
        assert_eq!(first.trace, second.trace);
        assert_eq!(first.generations, second.generations);
    }

    #[test]
    fn parallel_matches_serial() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl).with_constraint(fast_enough);
        let serial = DifferentialEvolution::new(exhaustive(), 1e-9, 1e-4)
            .run(&problem, 5)
            .unwrap();
        let parallel_config = DifferentialEvolutionConfig {
            parallel: true,
            ..exhaustive()
        };
        let parallel = DifferentialEvolution::new(parallel_config, 1e-9, 1e-4)
            .run(&problem, 5)
            .unwrap();
        assert_eq!(serial.best, parallel.best);
        assert_eq!(serial.best_feasible, parallel.best_feasible);
        assert_eq!(serial.trace, parallel.trace);
    }

    #[test]
    fn rand1bin_and_random_init_also_converge() {
        let config = DifferentialEvolutionConfig {
            strategy: MutationStrategy::Rand1Bin,
            init: InitMethod::Random,
            population_size: 30,
            max_generations: 200,
            ..exhaustive()
        };
        let problem = ToyProblem::new(ParameterBounds::default(), bowl);
        let outcome = DifferentialEvolution::new(config, 1e-9, 1e-4)
            .run(&problem, 1)
            .unwrap();
        assert!(outcome.best.objective < 1e-3);
    }

    #[test]
    fn trace_is_monotone_and_counts_add_up() {
        let problem = ToyProblem::new(ParameterBounds::default(), bowl);
        let de = DifferentialEvolution::new(DifferentialEvolutionConfig::default(), 1e-9, 1e-4);
        let outcome = de.run(&problem, 9).unwrap();

        assert_eq!(outcome.trace.len(), outcome.generations + 1);
        assert!(outcome.trace.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(outcome.evaluations, 20 * (outcome.generations + 1));
        assert_eq!(problem.evaluations(), outcome.evaluations);
    }

    #[test]
    fn time_limit_stops_after_initialisation() {
        let config = DifferentialEvolutionConfig {
            time_limit_secs: Some(1e-12),
            ..DifferentialEvolutionConfig::default()
        };
        let problem = ToyProblem::new(ParameterBounds::default(), bowl);
        let outcome = DifferentialEvolution::new(config, 1e-9, 1e-4)
            .run(&problem, 9)
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.generations, 0);
        assert_eq!(outcome.trace.len(), 1);
    }

    #[test]
    fn latin_hypercube_covers_every_stratum() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let points = latin_hypercube(10, &mut rng);
        for d in 0..PARAMETER_COUNT {
            let mut strata: Vec<usize> = points.iter().map(|p| (p[d] * 10.0) as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn ties_prefer_lower_violation() {
        let population = vec![
            candidate(2.0, 0.0),
            candidate(1.0, 0.3),
            candidate(1.0 + 1e-12, 0.1),
            candidate(1.0, 0.1),
        ];
        assert_eq!(select_best(&population, 1e-9), 2);
        assert_eq!(select_best(&population, 0.0), 3);
    }

    #[test]
    fn archive_tracks_feasible_and_least_violating() {
        let mut archive = Archive::new(1e-4);
        archive.observe(&candidate(5.0, 0.0));
        archive.observe(&candidate(1.0, 0.5));
        archive.observe(&candidate(3.0, 0.0));
        let (feasible, least) = archive.finish(candidate(0.0, 9.0));
        assert_eq!(feasible.map(|c| c.objective), Some(3.0));
        assert_eq!(least.penalized, 3.0);
    }
}
