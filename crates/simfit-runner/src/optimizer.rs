//! Black-box optimizers over the normalized unit box.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A sequential suggest/observe optimizer.
///
/// Suggestions are normalized vectors, one value in `[0, 1)` per parameter,
/// in the order of `names`. The loop reports every trial back through
/// [`Optimizer::observe`], including failed ones.
pub trait Optimizer: Send {
    /// Propose the next normalized vector.
    fn suggest(&mut self, names: &[String]) -> Vec<f64>;

    /// Record the loss reported for a suggestion.
    fn observe(&mut self, normalized: &[f64], loss: f64);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Uniform random search, reproducible from a seed.
///
/// Losses are ignored; the study keeps the best trial.
pub struct RandomSearch {
    rng: ChaCha8Rng,
}

impl RandomSearch {
    /// Seeded search. `None` draws a fresh seed from the thread RNG.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self { rng }
    }
}

impl Optimizer for RandomSearch {
    fn suggest(&mut self, names: &[String]) -> Vec<f64> {
        names.iter().map(|_| self.rng.random::<f64>()).collect()
    }

    fn observe(&mut self, _normalized: &[f64], _loss: f64) {}

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["k1", "k2", "dmg", "dcl"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suggestions_in_unit_box() {
        let mut search = RandomSearch::new(Some(7));
        for _ in 0..200 {
            let v = search.suggest(&names());
            assert_eq!(v.len(), 4);
            assert!(v.iter().all(|x| (0.0..1.0).contains(x)));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomSearch::new(Some(42));
        let mut b = RandomSearch::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.suggest(&names()), b.suggest(&names()));
        }
        let mut c = RandomSearch::new(Some(43));
        assert_ne!(RandomSearch::new(Some(42)).suggest(&names()), c.suggest(&names()));
    }

    #[test]
    fn test_observe_leaves_sequence_unchanged() {
        let mut quiet = RandomSearch::new(Some(1));
        let mut fed = RandomSearch::new(Some(1));
        for loss in [3.0, 1e6, f64::NAN] {
            let v = fed.suggest(&names());
            fed.observe(&v, loss);
            assert_eq!(quiet.suggest(&names()), v);
        }
    }
}
