//! Round-robin selection policy.

use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::SelectionPolicy;

/// Cycles through endpoints in list order, one per selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl RoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionPolicy for RoundRobin {
    fn pick(&self, endpoints: &[Endpoint], cursor: &mut usize) -> Option<Endpoint> {
        if endpoints.is_empty() {
            return None;
        }

        let index = *cursor % endpoints.len();
        *cursor = (index + 1) % endpoints.len();
        Some(endpoints[index].clone())
    }
}
