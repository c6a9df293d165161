//! Candidate search and best-fit ordering.
//!
//! The search is first-fit in slot order and stops after a fixed number of
//! candidates, so the cost per queued entry is bounded no matter how many
//! nodes are registered. The chosen candidates are then ordered tightest
//! first, which keeps larger nodes free for larger requests.

use crate::nodes::{Node, NodeIdx, NodeRegistry};
use crate::types::Resources;

/// Whether `node` can host one replica of `request` right now.
pub(crate) fn satisfies(node: &Node, job_type: &str, request: &Resources) -> bool {
    node.node_type() == job_type && node.residual().fits(request)
}

/// Fill `out` with up to `limit` nodes that satisfy the request, in slot
/// order. `out` is cleared first.
pub(crate) fn collect_candidates(
    nodes: &NodeRegistry,
    job_type: &str,
    request: &Resources,
    limit: usize,
    out: &mut Vec<NodeIdx>,
) {
    out.clear();
    for (idx, node) in nodes.iter() {
        if out.len() >= limit {
            break;
        }
        if satisfies(node, job_type, request) {
            out.push(idx);
        }
    }
}

/// Sort candidates ascending by residual (gpu, cpu, memory).
///
/// Ties fall back to slot order so placement is deterministic.
pub(crate) fn sort_best_fit(nodes: &NodeRegistry, candidates: &mut [NodeIdx]) {
    candidates.sort_unstable_by_key(|&idx| {
        let key = nodes
            .get(idx)
            .map(|node| node.residual().best_fit_key())
            .unwrap_or((i64::MAX, i64::MAX, i64::MAX));
        (key, idx)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tick;

    fn registry(nodes: &[(&str, &str, Resources)]) -> NodeRegistry {
        let mut reg = NodeRegistry::with_limit(16);
        for (name, node_type, caps) in nodes {
            reg.register(name, node_type, *caps, Tick(0)).unwrap();
        }
        reg
    }

    #[test]
    fn rejects_type_mismatch() {
        let reg = registry(&[("n1", "cpu", Resources::new(8000, 8000, 8))]);
        let node = reg.get(0).unwrap();
        assert!(!satisfies(node, "gpu", &Resources::new(1, 1, 0)));
        assert!(satisfies(node, "cpu", &Resources::new(1, 1, 0)));
    }

    #[test]
    fn rejects_insufficient_gpu() {
        let reg = registry(&[("n1", "gpu", Resources::new(8000, 8000, 1))]);
        assert!(!satisfies(reg.get(0).unwrap(), "gpu", &Resources::new(1, 1, 2)));
    }

    #[test]
    fn collect_stops_at_limit() {
        let caps = Resources::new(8000, 8000, 8);
        let reg = registry(&[
            ("a", "gpu", caps),
            ("b", "gpu", caps),
            ("c", "gpu", caps),
            ("d", "gpu", caps),
        ]);
        let mut out = Vec::new();
        collect_candidates(&reg, "gpu", &Resources::new(1, 1, 1), 2, &mut out);
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn collect_skips_unfit_nodes() {
        let reg = registry(&[
            ("small", "gpu", Resources::new(500, 8000, 8)),
            ("other", "cpu", Resources::new(8000, 8000, 8)),
            ("fit", "gpu", Resources::new(8000, 8000, 8)),
        ]);
        let mut out = vec![99];
        collect_candidates(&reg, "gpu", &Resources::new(1000, 1, 1), 8, &mut out);
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn best_fit_puts_tightest_first() {
        let reg = registry(&[
            ("big", "gpu", Resources::new(64_000, 1 << 36, 8)),
            ("cpu-heavy", "gpu", Resources::new(64_000, 1 << 30, 2)),
            ("tight", "gpu", Resources::new(4000, 1 << 30, 2)),
            ("mem-tight", "gpu", Resources::new(4000, 1 << 20, 2)),
        ]);
        let mut candidates = vec![0, 1, 2, 3];
        sort_best_fit(&reg, &mut candidates);
        assert_eq!(candidates, vec![3, 2, 1, 0]);
    }

    #[test]
    fn best_fit_ties_keep_slot_order() {
        let caps = Resources::new(8000, 8000, 8);
        let reg = registry(&[("a", "gpu", caps), ("b", "gpu", caps), ("c", "gpu", caps)]);
        let mut candidates = vec![2, 0, 1];
        sort_best_fit(&reg, &mut candidates);
        assert_eq!(candidates, vec![0, 1, 2]);
    }
}
