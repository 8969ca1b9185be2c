//! Cyclic endpoint pool

use rand::Rng;

use crate::error::{Result, RotaError};
use crate::models::Endpoint;

/// Upper bound (exclusive) on the random start offset
const MAX_START_OFFSET: usize = 100;

/// Fixed, ordered list of endpoints handed out in round-robin order
///
/// The list never changes after construction. Each instance starts at a random
/// offset so controllers booting at the same time spread over the pool.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
    position: usize,
}

impl EndpointPool {
    /// Build a pool with a random start offset
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        Self::with_rng(endpoints, &mut rand::thread_rng())
    }

    /// Build a pool drawing the start offset from `rng`
    pub fn with_rng<R: Rng + ?Sized>(endpoints: Vec<Endpoint>, rng: &mut R) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(RotaError::NoProxiesAvailable);
        }

        let offset = rng.gen_range(0..MAX_START_OFFSET);
        Ok(Self {
            position: offset % endpoints.len(),
            endpoints,
        })
    }

    /// Next endpoint in cyclic order
    pub fn next(&mut self) -> Endpoint {
        let endpoint = self.endpoints[self.position].clone();
        self.position = (self.position + 1) % self.endpoints.len();
        endpoint
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept alongside `len` for API symmetry
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn endpoints(names: &[&str]) -> Vec<Endpoint> {
        names.iter().map(|n| Endpoint::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_pool_empty() {
        let result = EndpointPool::new(Vec::new());
        assert!(matches!(result, Err(RotaError::NoProxiesAvailable)));
    }

    #[test]
    fn test_pool_cycles_in_order() {
        let list = endpoints(&["a:1", "b:2", "c:3"]);
        let mut pool = EndpointPool::with_rng(list.clone(), &mut StdRng::seed_from_u64(7)).unwrap();

        let first = pool.next();
        let start = list.iter().position(|e| *e == first).unwrap();

        // Subsequent draws follow list order from wherever we started
        for step in 1..10 {
            assert_eq!(pool.next(), list[(start + step) % list.len()]);
        }
    }

    #[test]
    fn test_pool_full_coverage_for_all_sizes() {
        for size in 1..=12 {
            let names: Vec<String> = (0..size).map(|i| format!("10.0.0.{}:80", i)).collect();
            let list: Vec<Endpoint> = names.iter().map(|n| Endpoint::parse(n).unwrap()).collect();

            for seed in 0..5 {
                let mut pool =
                    EndpointPool::with_rng(list.clone(), &mut StdRng::seed_from_u64(seed)).unwrap();
                // Start from an arbitrary position
                for _ in 0..seed {
                    pool.next();
                }

                let seen: HashSet<Endpoint> = (0..size).map(|_| pool.next()).collect();
                assert_eq!(seen.len(), size);
            }
        }
    }

    #[test]
    fn test_pool_start_offset_varies() {
        let list: Vec<Endpoint> = (0..50)
            .map(|i| Endpoint::parse(&format!("10.0.1.{}:80", i)).unwrap())
            .collect();

        let starts: HashSet<Endpoint> = (0..20)
            .map(|seed| {
                EndpointPool::with_rng(list.clone(), &mut StdRng::seed_from_u64(seed))
                    .unwrap()
                    .next()
            })
            .collect();
        assert!(starts.len() > 1);
    }

    #[test]
    fn test_single_endpoint_pool_repeats() {
        let mut pool = EndpointPool::new(endpoints(&["only:1"])).unwrap();
        assert_eq!(pool.next().as_str(), "only:1");
        assert_eq!(pool.next().as_str(), "only:1");
        assert_eq!(pool.len(), 1);
    }
}
