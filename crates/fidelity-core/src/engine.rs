//! Stages of a single generation step.
//!
//! Every stage reads a population snapshot and returns a fresh population;
//! entities are never mutated in place.

use rand::{Rng, RngCore};

use crate::entity::{Entity, EntityError};
use crate::environment::EnvironmentError;
use crate::factors::Factors;
use crate::simulation::SimulationError;

/// Keep each entity independently with its selection probability.
#[must_use]
pub fn select(factors: &Factors, population: &[Entity], rng: &mut dyn RngCore) -> Vec<Entity> {
    population
        .iter()
        .filter(|entity| rng.random::<f64>() < factors.selection.resolve(entity.fitness()))
        .copied()
        .collect()
}

/// Offspring of every entity in `population`, in parent order.
pub fn reproduce(
    factors: &Factors,
    population: &[Entity],
    rng: &mut dyn RngCore,
) -> Result<Vec<Entity>, EntityError> {
    let mut offspring = Vec::new();
    for parent in population {
        parent.breed_into(factors, rng, &mut offspring)?;
    }
    Ok(offspring)
}

/// Uniformly keep `size` entities without replacement. Smaller populations pass through.
#[must_use]
pub fn downsample(population: Vec<Entity>, size: usize, rng: &mut dyn RngCore) -> Vec<Entity> {
    if population.len() <= size {
        return population;
    }
    rand::seq::index::sample(rng, population.len(), size)
        .into_iter()
        .map(|idx| population[idx])
        .collect()
}

/// Shift every entity's fitness by its delta, clamped to `[0, 1]`.
///
/// A single delta applies to everyone; otherwise `deltas` is indexed by
/// lineage. Order is preserved and fidelity/lineage are copied unchanged.
pub fn apply_environment(
    deltas: &[f64],
    population: &[Entity],
) -> Result<Vec<Entity>, SimulationError> {
    let shared = match deltas {
        [] => return Err(EnvironmentError::Empty.into()),
        [delta] => Some(*delta),
        _ => None,
    };
    population
        .iter()
        .map(|entity| -> Result<Entity, SimulationError> {
            let delta = match shared {
                Some(delta) => delta,
                None => deltas.get(entity.lineage().index()).copied().ok_or(
                    EnvironmentError::MissingLineage {
                        lineage: entity.lineage(),
                        available: deltas.len(),
                    },
                )?,
            };
            let fitness = (entity.fitness() + delta).clamp(0.0, 1.0);
            Ok(entity.with_fitness(fitness)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Lineage;
    use crate::factors::ProbabilityPolicy;
    use rand::{SeedableRng, rngs::SmallRng};

    fn population(size: u32) -> Vec<Entity> {
        (0..size)
            .map(|idx| {
                let trait_value = f64::from(idx % 10) / 10.0;
                Entity::new(Lineage(idx), trait_value, 1.0 - trait_value).expect("entity")
            })
            .collect()
    }

    fn as_tuples(population: &[Entity]) -> Vec<(u64, u64, Lineage)> {
        let mut tuples: Vec<_> = population
            .iter()
            .map(|e| (e.fitness().to_bits(), e.fidelity().to_bits(), e.lineage()))
            .collect();
        tuples.sort_unstable();
        tuples
    }

    #[test]
    fn certain_selection_keeps_everyone() {
        let factors = Factors {
            selection: ProbabilityPolicy::Fixed(1.0),
            ..Factors::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let parents = population(40);
        assert_eq!(select(&factors, &parents, &mut rng), parents);

        let never = Factors {
            selection: ProbabilityPolicy::Fixed(0.0),
            ..Factors::default()
        };
        assert!(select(&never, &parents, &mut rng).is_empty());
    }

    #[test]
    fn fitness_proportional_selection_favours_fit_entities() {
        let factors = Factors::default();
        let mut rng = SmallRng::seed_from_u64(2);
        let zero = Entity::new(Lineage(0), 0.0, 0.5).expect("entity");
        let one = Entity::new(Lineage(1), 1.0, 0.5).expect("entity");
        for _ in 0..100 {
            let kept = select(&factors, &[zero, one], &mut rng);
            assert_eq!(kept, vec![one]);
        }
    }

    #[test]
    fn zero_offspring_maximum_never_breeds() {
        let factors = Factors {
            reproduction: ProbabilityPolicy::Fixed(1.0),
            max_offspring: 0,
            ..Factors::default()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(reproduce(&factors, &population(50), &mut rng)
            .expect("reproduce")
            .is_empty());
    }

    #[test]
    fn downsample_caps_without_duplicates() {
        let mut rng = SmallRng::seed_from_u64(4);
        let sampled = downsample(population(100), 30, &mut rng);
        assert_eq!(sampled.len(), 30);
        let mut lineages: Vec<_> = sampled.iter().map(Entity::lineage).collect();
        lineages.sort_unstable();
        lineages.dedup();
        assert_eq!(lineages.len(), 30);

        let small = population(5);
        assert_eq!(downsample(small.clone(), 30, &mut rng), small);
    }

    #[test]
    fn environment_clamps_fitness_and_keeps_other_fields() {
        let parents = population(20);
        let shifted = apply_environment(&[0.35], &parents).expect("apply");
        assert_eq!(shifted.len(), parents.len());
        for (before, after) in parents.iter().zip(&shifted) {
            assert_eq!(after.fitness(), (before.fitness() + 0.35).clamp(0.0, 1.0));
            assert_eq!(after.fidelity().to_bits(), before.fidelity().to_bits());
            assert_eq!(after.lineage(), before.lineage());
        }

        let floored = apply_environment(&[-5.0], &parents).expect("apply");
        assert!(floored.iter().all(|e| e.fitness() == 0.0));
    }

    #[test]
    fn environment_uses_lineage_specific_deltas() {
        let parents: Vec<Entity> = (0..3)
            .map(|idx| Entity::new(Lineage(idx), 0.5, 0.5).expect("entity"))
            .collect();
        let shifted = apply_environment(&[0.1, -0.1, 0.6], &parents).expect("apply");
        let fitness: Vec<f64> = shifted.iter().map(Entity::fitness).collect();
        assert!((fitness[0] - 0.6).abs() < 1e-12);
        assert!((fitness[1] - 0.4).abs() < 1e-12);
        assert_eq!(fitness[2], 1.0);

        assert!(apply_environment(&[0.1, 0.2], &parents).is_err());
        assert!(apply_environment(&[], &parents).is_err());
    }

    #[test]
    fn environment_application_commutes_with_reordering() {
        let parents = population(30);
        let deltas: Vec<f64> = (0..30).map(|idx| f64::from(idx) / 40.0 - 0.3).collect();
        let mut reordered = parents.clone();
        reordered.reverse();
        reordered.rotate_left(7);

        let applied_then_reordered = apply_environment(&deltas, &parents).expect("apply");
        let reordered_then_applied = apply_environment(&deltas, &reordered).expect("apply");
        assert_eq!(
            as_tuples(&applied_then_reordered),
            as_tuples(&reordered_then_applied)
        );
    }

    #[test]
    fn non_finite_delta_is_an_invariant_violation() {
        let parents = population(3);
        assert!(matches!(
            apply_environment(&[f64::NAN], &parents),
            Err(SimulationError::Entity(_))
        ));
    }
}
