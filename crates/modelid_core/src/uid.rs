//! UID allocation.

use crate::error::{ModelError, ModelResult};
use crate::model::ModelDocument;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;

/// Default number of draws before UID generation gives up.
pub const DEFAULT_MAX_UID_ATTEMPTS: u32 = 1000;

/// Source of fresh UIDs for one reconciliation run.
///
/// The pool knows every UID present in the model, active and retired, and
/// every UID it has handed out itself. A generated UID is never zero and
/// never collides with any of them.
#[derive(Debug)]
pub struct UidPool<R = StdRng> {
    known: HashSet<u64>,
    rng: R,
    max_attempts: u32,
}

impl UidPool<StdRng> {
    /// Creates a pool seeded from OS entropy covering all UIDs of `model`.
    #[must_use]
    pub fn for_document(model: &ModelDocument) -> Self {
        Self::with_rng(model, StdRng::from_entropy())
    }
}

impl<R: RngCore> UidPool<R> {
    /// Creates a pool using the given random source.
    pub fn with_rng(model: &ModelDocument, rng: R) -> Self {
        Self {
            known: model.all_uids().collect(),
            rng,
            max_attempts: DEFAULT_MAX_UID_ATTEMPTS,
        }
    }

    /// Sets the number of draws before generation fails.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Generates an unused, non-zero UID and marks it as used.
    pub fn generate(&mut self) -> ModelResult<u64> {
        for _ in 0..self.max_attempts {
            let uid = self.rng.next_u64();
            if uid != 0 && self.known.insert(uid) {
                return Ok(uid);
            }
        }

        Err(ModelError::UidPoolExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Claims a UID supplied from outside (an explicit uid annotation).
    ///
    /// Fails if the UID is zero or already known.
    pub fn reserve(&mut self, uid: u64) -> ModelResult<()> {
        if uid == 0 {
            return Err(ModelError::invalid_id_uid("0", "uid is zero"));
        }
        if !self.known.insert(uid) {
            return Err(ModelError::UidInUse { uid });
        }
        Ok(())
    }

    /// Returns true if the UID is used, retired or was handed out.
    #[must_use]
    pub fn contains(&self, uid: u64) -> bool {
        self.known.contains(&uid)
    }

    /// Number of known UIDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if no UIDs are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdUid;
    use crate::model::Entity;

    /// Replays a fixed sequence of values.
    struct Scripted(Vec<u64>);

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }

        fn next_u64(&mut self) -> u64 {
            if self.0.is_empty() {
                0
            } else {
                self.0.remove(0)
            }
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for byte in dest {
                *byte = self.next_u64() as u8;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn model_with_uids() -> ModelDocument {
        let mut model = ModelDocument::new();
        model.entities.push(Entity::new(IdUid::new(1, 10), "Task"));
        model.last_entity_id = IdUid::new(1, 10);
        model.retired_property_uids.push(20);
        model
    }

    #[test]
    fn skips_zero_and_known() {
        let model = model_with_uids();
        let mut pool = UidPool::with_rng(&model, Scripted(vec![0, 10, 20, 30]));
        assert_eq!(pool.generate().unwrap(), 30);
    }

    #[test]
    fn never_repeats_within_run() {
        let model = ModelDocument::new();
        let mut pool = UidPool::with_rng(&model, Scripted(vec![5, 5, 6]));
        assert_eq!(pool.generate().unwrap(), 5);
        assert_eq!(pool.generate().unwrap(), 6);
    }

    #[test]
    fn exhaustion_is_reported() {
        let model = model_with_uids();
        let mut pool = UidPool::with_rng(&model, Scripted(vec![10, 10, 10])).max_attempts(3);
        assert!(matches!(
            pool.generate(),
            Err(ModelError::UidPoolExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn reserve_rejects_known() {
        let model = model_with_uids();
        let mut pool = UidPool::with_rng(&model, StdRng::seed_from_u64(1));
        assert!(matches!(pool.reserve(20), Err(ModelError::UidInUse { uid: 20 })));
        assert!(pool.reserve(0).is_err());
        pool.reserve(21).unwrap();
        assert!(pool.contains(21));
    }

    #[test]
    fn seeded_pool_generates_distinct() {
        let model = ModelDocument::new();
        let mut pool = UidPool::with_rng(&model, StdRng::seed_from_u64(7));
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(pool.generate().unwrap()));
        }
        assert_eq!(pool.len(), 1000);
    }
}
