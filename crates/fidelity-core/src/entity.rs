//! Population members and the trait-derivation rule used at reproduction.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::factors::Factors;

/// Upper bound (exclusive) of the uniform draw used for founder traits.
pub const FOUNDER_TRAIT_MAX: f64 = 0.3;

/// Identifier shared by a founder and every one of its descendants.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Lineage(pub u32);

impl Lineage {
    /// Position of this lineage's series in a per-lineage environment.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Entity construction failures. Either one aborts the run.
///
/// `TraitOutOfRange` signals a trait value outside `[0, 1]`, which means a
/// defect in the derivation rule, the environment clamp or decoded input.
#[derive(Debug, Error, PartialEq)]
pub enum EntityError {
    #[error("{name} {value} is outside [0, 1]")]
    TraitOutOfRange { name: &'static str, value: f64 },
    #[error("{size} founders exceed the lineage identifier range")]
    TooManyFounders { size: usize },
}

fn checked_trait(name: &'static str, value: f64) -> Result<f64, EntityError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EntityError::TraitOutOfRange { name, value })
    }
}

/// One population member. Immutable once built; changes produce a new value.
///
/// Deserialization goes through [`Entity::new`], so decoded traits are checked
/// like constructed ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "EntityRecord")]
pub struct Entity {
    fitness: f64,
    fidelity: f64,
    lineage: Lineage,
}

#[derive(Deserialize)]
struct EntityRecord {
    fitness: f64,
    fidelity: f64,
    lineage: Lineage,
}

impl TryFrom<EntityRecord> for Entity {
    type Error = EntityError;

    fn try_from(record: EntityRecord) -> Result<Self, Self::Error> {
        Self::new(record.lineage, record.fitness, record.fidelity)
    }
}

impl Entity {
    /// Build an entity, rejecting traits outside `[0, 1]`.
    pub fn new(lineage: Lineage, fitness: f64, fidelity: f64) -> Result<Self, EntityError> {
        Ok(Self {
            fitness: checked_trait("fitness", fitness)?,
            fidelity: checked_trait("fidelity", fidelity)?,
            lineage,
        })
    }

    /// Founder with both traits drawn uniformly from `[0, FOUNDER_TRAIT_MAX)`.
    #[must_use]
    pub fn random_founder(lineage: Lineage, rng: &mut dyn RngCore) -> Self {
        Self {
            fitness: rng.random_range(0.0..FOUNDER_TRAIT_MAX),
            fidelity: rng.random_range(0.0..FOUNDER_TRAIT_MAX),
            lineage,
        }
    }

    #[must_use]
    pub const fn fitness(&self) -> f64 {
        self.fitness
    }

    #[must_use]
    pub const fn fidelity(&self) -> f64 {
        self.fidelity
    }

    #[must_use]
    pub const fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// Replacement entity carrying a new fitness; fidelity and lineage are copied.
    pub fn with_fitness(&self, fitness: f64) -> Result<Self, EntityError> {
        Ok(Self {
            fitness: checked_trait("fitness", fitness)?,
            ..*self
        })
    }

    /// Append this parent's offspring for one generation to `out`.
    ///
    /// The parent first has to pass the reproduction trial. The offspring
    /// count is then drawn uniformly from `0..=max_offspring`, so a parent that
    /// passes the trial may still leave no offspring. Returns the number of
    /// offspring appended.
    pub fn breed_into(
        &self,
        factors: &Factors,
        rng: &mut dyn RngCore,
        out: &mut Vec<Entity>,
    ) -> Result<usize, EntityError> {
        let p_reproduce = factors.reproduction.resolve(self.fitness);
        if rng.random::<f64>() >= p_reproduce {
            return Ok(0);
        }

        // Drawn once per parent and shared by all of its offspring.
        let fidelity_correlation = if factors.correlated {
            self.fidelity
        } else {
            rng.random::<f64>()
        };

        let count = rng.random_range(0..=factors.max_offspring) as usize;
        out.reserve(count);
        for _ in 0..count {
            let fitness = derive_trait(self.fitness, self.fidelity, rng)?;
            let fidelity = derive_trait(self.fidelity, fidelity_correlation, rng)?;
            out.push(Entity::new(self.lineage, fitness, fidelity)?);
        }
        Ok(count)
    }
}

/// Draw a trait from `N(source, 1 - correlation)` until the sample lands in `[0, 1]`.
///
/// `source` must lie in `[0, 1]` and `correlation` must not be negative, otherwise
/// the rejection loop could spin indefinitely. A correlation of 1 (or above) has
/// no dispersion and returns `source` exactly.
pub fn derive_trait(
    source: f64,
    correlation: f64,
    rng: &mut dyn RngCore,
) -> Result<f64, EntityError> {
    let source = checked_trait("source", source)?;
    if correlation.is_nan() || correlation < 0.0 {
        return Err(EntityError::TraitOutOfRange {
            name: "correlation",
            value: correlation,
        });
    }
    let sd = 1.0 - correlation;
    if sd <= 0.0 {
        return Ok(source);
    }
    let Ok(normal) = Normal::new(source, sd) else {
        return Ok(source);
    };
    loop {
        let value = normal.sample(rng);
        if (0.0..=1.0).contains(&value) {
            return Ok(value);
        }
    }
}

/// Founders with sequential lineages `0..size` and random founder traits.
pub fn init_population(size: usize, rng: &mut dyn RngCore) -> Result<Vec<Entity>, EntityError> {
    let count = u32::try_from(size).map_err(|_| EntityError::TooManyFounders { size })?;
    Ok((0..count)
        .map(|id| Entity::random_founder(Lineage(id), rng))
        .collect())
}
