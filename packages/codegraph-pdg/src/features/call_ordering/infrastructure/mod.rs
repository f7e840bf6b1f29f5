/*
 * Call-site ordering solver
 *
 * Monotone set-union fixpoint over the program-point graph:
 * 1. Forward BFS from the entry builds the predecessor map
 * 2. Worklist: before(p) = ∪ over preds q of before(q) ∪ {q if q is a call}
 * 3. A point is re-queued whenever a predecessor's set grows
 *
 * Sets only grow and are bounded by the call-site count, so the loop
 * terminates. "Calls after s" is the inverse: every call c with s ∈ before(c).
 */

use super::domain::{PointId, ProgramPointGraph};
use crate::shared::models::CallSiteId;
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct CallSiteOrdering {
    /// Calls that may have executed before reaching each reachable point
    before: FxHashMap<PointId, BTreeSet<CallSiteId>>,
    /// Calls that may execute after each call site
    after: FxHashMap<CallSiteId, BTreeSet<CallSiteId>>,
}

impl CallSiteOrdering {
    pub fn compute(graph: &ProgramPointGraph) -> Self {
        if graph.is_empty() {
            return Self::default();
        }

        let mut predecessors: FxHashMap<PointId, Vec<PointId>> = FxHashMap::default();
        let mut reachable = vec![false; graph.len()];
        let mut queue = VecDeque::from([graph.entry()]);
        reachable[graph.entry()] = true;
        while let Some(point) = queue.pop_front() {
            for &succ in graph.successors(point) {
                predecessors.entry(succ).or_default().push(point);
                if !reachable[succ] {
                    reachable[succ] = true;
                    queue.push_back(succ);
                }
            }
        }

        let mut before: FxHashMap<PointId, BTreeSet<CallSiteId>> = (0..graph.len())
            .filter(|p| reachable[*p])
            .map(|p| (p, BTreeSet::new()))
            .collect();
        let mut worklist: VecDeque<PointId> = (0..graph.len()).filter(|p| reachable[*p]).collect();
        let mut queued = reachable.clone();
        let mut visits = 0usize;

        while let Some(point) = worklist.pop_front() {
            queued[point] = false;
            visits += 1;
            let mut incoming = BTreeSet::new();
            for &pred in predecessors.get(&point).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(set) = before.get(&pred) {
                    incoming.extend(set.iter().copied());
                }
                if let Some(site) = graph.call_site(pred) {
                    incoming.insert(site);
                }
            }

            let current = before.entry(point).or_default();
            debug_assert!(
                current.is_subset(&incoming),
                "call-site ordering shrank at point {}",
                point
            );
            if incoming.len() > current.len() {
                *current = incoming;
                for &succ in graph.successors(point) {
                    if !queued[succ] {
                        queued[succ] = true;
                        worklist.push_back(succ);
                    }
                }
            }
        }
        trace!(points = graph.len(), visits, "call-site ordering converged");

        let mut after: FxHashMap<CallSiteId, BTreeSet<CallSiteId>> =
            graph.call_points().map(|(_, site)| (site, BTreeSet::new())).collect();
        for (point, site) in graph.call_points() {
            if let Some(preceding) = before.get(&point) {
                for earlier in preceding {
                    after.entry(*earlier).or_default().insert(site);
                }
            }
        }
        Self { before, after }
    }

    /// Call sites that may execute before `point` (empty when unreachable)
    pub fn calls_before(&self, point: PointId) -> Option<&BTreeSet<CallSiteId>> {
        self.before.get(&point)
    }

    /// Call sites that may execute after `site` on some path to the exit
    pub fn calls_after(&self, site: CallSiteId) -> Option<&BTreeSet<CallSiteId>> {
        self.after.get(&site)
    }

    pub fn may_follow(&self, earlier: CallSiteId, later: CallSiteId) -> bool {
        self.after
            .get(&earlier)
            .is_some_and(|after| after.contains(&later))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use pretty_assertions::assert_eq;

    fn sites(ids: &[u32]) -> BTreeSet<CallSiteId> {
        ids.iter().map(|i| CallSiteId(*i)).collect()
    }

    fn graph(len: usize, edges: &[(PointId, PointId)], calls: &[(PointId, u32)]) -> Result<ProgramPointGraph> {
        let mut g = ProgramPointGraph::new(len, 0)?;
        for &(from, to) in edges {
            g.add_edge(from, to)?;
        }
        for &(point, site) in calls {
            g.mark_call(point, CallSiteId(site))?;
        }
        Ok(g)
    }

    #[test]
    fn test_straight_line() {
        // 0 -> 1(cs0) -> 2(cs1) -> 3
        let g = graph(4, &[(0, 1), (1, 2), (2, 3)], &[(1, 0), (2, 1)]).unwrap();

        let ordering = CallSiteOrdering::compute(&g);
        assert_eq!(ordering.calls_after(CallSiteId(0)), Some(&sites(&[1])));
        assert_eq!(ordering.calls_after(CallSiteId(1)), Some(&sites(&[])));
        assert_eq!(ordering.calls_before(3), Some(&sites(&[0, 1])));
        assert!(!ordering.may_follow(CallSiteId(1), CallSiteId(0)));
    }

    #[test]
    fn test_loop_orders_call_after_itself() {
        // 0 -> 1(cs0) -> 2 -> 1, 2 -> 3
        let g = graph(4, &[(0, 1), (1, 2), (2, 1), (2, 3)], &[(1, 0)]).unwrap();

        let ordering = CallSiteOrdering::compute(&g);
        assert!(ordering.may_follow(CallSiteId(0), CallSiteId(0)));
    }

    #[test]
    fn test_diamond_arms_are_unordered() {
        // 0 -> 1(cs0) -> 3(cs2), 0 -> 2(cs1) -> 3
        let g = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)], &[(1, 0), (2, 1), (3, 2)]).unwrap();

        let ordering = CallSiteOrdering::compute(&g);
        assert!(!ordering.may_follow(CallSiteId(0), CallSiteId(1)));
        assert!(!ordering.may_follow(CallSiteId(1), CallSiteId(0)));
        assert_eq!(ordering.calls_before(3), Some(&sites(&[0, 1])));
    }

    #[test]
    fn test_unreachable_points_have_no_result() {
        let g = graph(3, &[(0, 1)], &[(2, 7)]).unwrap();
        let ordering = CallSiteOrdering::compute(&g);
        assert_eq!(ordering.calls_before(2), None);
        assert_eq!(ordering.calls_after(CallSiteId(7)), Some(&sites(&[])));
    }

    #[test]
    fn test_empty_graph_has_no_ordering() {
        let ordering = CallSiteOrdering::compute(&ProgramPointGraph::default());
        assert_eq!(ordering.calls_before(0), None);
    }
}
