//! Routing policies deciding which specialist category a patient needs.
//!
//! The core treats the policy as opaque: it only needs "pick one of K categories".
//! Whatever the policy returns is range-checked by the duty doctor; an error or an
//! out-of-range category drops the patient instead of enqueuing it anywhere.

use std::sync::atomic::{AtomicUsize, Ordering};

use clap::ValueEnum;
use parking_lot::Mutex;
use rand::RngExt;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::patient::CategoryId;
use crate::errors::{Result, TriageError};

/// Chooses a specialist category for a patient.
pub trait RoutingPolicy: Send + Sync {
    /// Pick a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot make a decision.
    fn choose_category(&self) -> Result<CategoryId>;
}

impl<F> RoutingPolicy for F
where
    F: Fn() -> Result<CategoryId> + Send + Sync,
{
    fn choose_category(&self) -> Result<CategoryId> {
        self()
    }
}

/// Built-in routing strategies selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RoutingStrategy {
    /// Uniformly random category for every patient.
    #[default]
    #[value(name = "uniform")]
    Uniform,

    /// Categories in rotation: C1, C2, ..., CK, C1, ...
    ///
    /// The rotation is shared by all duty doctors, so which patient lands where
    /// still depends on thread interleaving.
    #[value(name = "round-robin")]
    RoundRobin,
}

impl RoutingStrategy {
    /// Build the policy for `categories` specialist categories.
    #[must_use]
    pub fn build(self, categories: usize, seed: Option<u64>) -> Box<dyn RoutingPolicy> {
        match self {
            Self::Uniform => Box::new(UniformRouting::new(categories, seed)),
            Self::RoundRobin => Box::new(RoundRobinRouting::new(categories)),
        }
    }
}

/// Create a random number generator, optionally seeded for reproducibility.
///
/// # Examples
///
/// ```
/// use rand::RngExt;
/// use triage_lib::pipeline::create_rng;
///
/// let mut a = create_rng(Some(42));
/// let mut b = create_rng(Some(42));
/// assert_eq!(a.random::<u64>(), b.random::<u64>());
/// ```
#[must_use]
pub fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Uniformly random routing.
///
/// The generator is shared by all duty doctors behind a mutex; with a seed the sequence
/// of draws is reproducible even though its assignment to patients is not.
pub struct UniformRouting {
    categories: usize,
    rng: Mutex<StdRng>,
}

impl UniformRouting {
    /// Create a uniform policy over `categories` categories.
    #[must_use]
    pub fn new(categories: usize, seed: Option<u64>) -> Self {
        Self { categories, rng: Mutex::new(create_rng(seed)) }
    }
}

impl RoutingPolicy for UniformRouting {
    fn choose_category(&self) -> Result<CategoryId> {
        if self.categories == 0 {
            return Err(TriageError::RoutingFailed {
                reason: "no specialist categories to choose from".to_string(),
            });
        }
        let index = self.rng.lock().random_range(0..self.categories);
        Ok(CategoryId::new(index))
    }
}

/// Deterministic rotation over the categories.
pub struct RoundRobinRouting {
    categories: usize,
    next: AtomicUsize,
}

impl RoundRobinRouting {
    /// Create a rotation over `categories` categories starting at C1.
    #[must_use]
    pub fn new(categories: usize) -> Self {
        Self { categories, next: AtomicUsize::new(0) }
    }
}

impl RoutingPolicy for RoundRobinRouting {
    fn choose_category(&self) -> Result<CategoryId> {
        if self.categories == 0 {
            return Err(TriageError::RoutingFailed {
                reason: "no specialist categories to choose from".to_string(),
            });
        }
        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(CategoryId::new(turn % self.categories))
    }
}

/// Always routes to the same category.
#[derive(Debug, Clone, Copy)]
pub struct FixedRouting(pub CategoryId);

impl RoutingPolicy for FixedRouting {
    fn choose_category(&self) -> Result<CategoryId> {
        Ok(self.0)
    }
}

/// Check a policy's answer against the number of configured categories.
///
/// # Errors
///
/// Returns [`TriageError::CategoryOutOfRange`] if there is no pool for `category`.
pub fn check_category(category: CategoryId, categories: usize) -> Result<CategoryId> {
    if category.index() >= categories {
        return Err(TriageError::CategoryOutOfRange { category: category.index(), categories });
    }
    Ok(category)
}
