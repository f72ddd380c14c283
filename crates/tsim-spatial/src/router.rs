//! Shortest successor paths over the lanelet graph.
//!
//! # Cost units
//!
//! Costs are integer **millimetres** (u64) so heap ordering is total and
//! independent of floating-point rounding.  Leaving a lanelet costs its
//! length; the destination lanelet itself is free, so the cost of a path is
//! the distance from the start of `from` to the start of `to`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tsim_core::LaneletId;

use crate::lanelet_map::LaneletMap;

/// The result of a routing query.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneRoute {
    /// Lanelets to traverse in order, both endpoints included.
    pub lanelets: Vec<LaneletId>,
    /// Distance from the start of the first lanelet to the start of the last.
    pub length_m: f64,
}

#[inline]
fn cost_mm(map: &LaneletMap, index: usize) -> u64 {
    (map.lanelet_at(index).length() * 1000.0).round() as u64
}

/// Dijkstra from `from` to `to`.  `None` if either lanelet is unknown or
/// `to` is unreachable.
pub fn shortest_path(map: &LaneletMap, from: LaneletId, to: LaneletId) -> Option<LaneRoute> {
    let source = map.index_of(from)?;
    let target = map.index_of(to)?;
    if source == target {
        return Some(LaneRoute { lanelets: vec![from], length_m: 0.0 });
    }

    let n = map.lanelet_count();
    let mut dist = vec![u64::MAX; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    dist[source] = 0;

    // Min-heap on (cost, index).  Indices follow id order, so equal-cost
    // entries pop in ascending LaneletId.
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    heap.push(Reverse((0, source)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if node == target {
            return Some(reconstruct(map, &prev, target, cost));
        }
        // Skip stale heap entries.
        if cost > dist[node] {
            continue;
        }
        let leave = cost.saturating_add(cost_mm(map, node));
        for next in map.successors_of(node) {
            if leave < dist[next] {
                dist[next] = leave;
                prev[next] = Some(node);
                heap.push(Reverse((leave, next)));
            }
        }
    }
    None
}

fn reconstruct(map: &LaneletMap, prev: &[Option<usize>], target: usize, total_mm: u64) -> LaneRoute {
    let mut lanelets = vec![map.lanelet_at(target).id];
    let mut cur = target;
    while let Some(p) = prev[cur] {
        lanelets.push(map.lanelet_at(p).id);
        cur = p;
    }
    lanelets.reverse();
    LaneRoute { lanelets, length_m: total_mm as f64 / 1000.0 }
}
