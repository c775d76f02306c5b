// Probabilistic routing between queues

use hashbrown::HashMap;

use crate::qn_error::SimError;
use crate::qn_interface::{QueueId, RoutingEdge};
use crate::qn_random::DrawBudget;

/// Outgoing edges per source queue, built once and shared read-only by all
/// replications.
///
/// Edges of a source are kept sorted by ascending probability (stable, so
/// equal probabilities keep declaration order). Cumulative selection walks
/// them in that order, which fixes which edge absorbs floating-point
/// rounding at the boundary.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    outgoing: HashMap<QueueId, Vec<RoutingEdge>>,
}

impl RoutingTable {
    pub fn new(edges: &[RoutingEdge]) -> Self {
        let mut outgoing: HashMap<QueueId, Vec<RoutingEdge>> = HashMap::new();
        for edge in edges {
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
        }
        for list in outgoing.values_mut() {
            list.sort_by(|a, b| a.probability.total_cmp(&b.probability));
        }
        Self { outgoing }
    }

    /// Edges leaving `source` in selection order; empty when the queue exits the network
    pub fn outgoing(&self, source: &str) -> &[RoutingEdge] {
        self.outgoing.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_exit(&self, source: &str) -> bool {
        self.outgoing(source).is_empty()
    }

    /// Target for a departing entity given a uniform draw.
    ///
    /// Returns the first edge whose cumulative probability reaches `draw`,
    /// the last edge if rounding leaves none, and `None` when `source` has
    /// no outgoing edges.
    pub fn select(&self, source: &str, draw: f64) -> Option<&QueueId> {
        let edges = self.outgoing(source);
        let mut cumulative = 0.0;
        for edge in edges {
            cumulative += edge.probability;
            if draw <= cumulative {
                return Some(&edge.target);
            }
        }
        edges.last().map(|edge| &edge.target)
    }

    /// Next hop for an entity leaving `source`.
    ///
    /// Consumes exactly one draw when `source` has outgoing edges and none
    /// otherwise. With the budget spent the entity leaves the network.
    pub fn route(&self, source: &str, draws: &mut DrawBudget) -> Result<Option<QueueId>, SimError> {
        if self.is_exit(source) {
            return Ok(None);
        }
        let Some(u) = draws.next_within_budget()? else {
            return Ok(None);
        };
        Ok(self.select(source, u).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qn_random::RandomStream;

    fn table() -> RoutingTable {
        RoutingTable::new(&[
            RoutingEdge::new("Q1", "Q2", 0.8),
            RoutingEdge::new("Q1", "Q3", 0.2),
            RoutingEdge::new("Q2", "Q1", 0.3),
            RoutingEdge::new("Q2", "Q3", 0.5),
            RoutingEdge::new("Q2", "Q4", 0.2),
        ])
    }

    #[test]
    fn test_outgoing_sorted_by_probability() {
        let table = table();
        let targets: Vec<&str> = table
            .outgoing("Q2")
            .iter()
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(targets, vec!["Q4", "Q1", "Q3"]);
        assert!(table.outgoing("Q3").is_empty());
        assert!(table.is_exit("Q3"));
    }

    #[test]
    fn test_equal_probabilities_keep_declaration_order() {
        let table = RoutingTable::new(&[
            RoutingEdge::new("A", "X", 0.5),
            RoutingEdge::new("A", "Y", 0.5),
        ]);
        assert_eq!(table.select("A", 0.5), Some(&"X".to_string()));
        assert_eq!(table.select("A", 0.51), Some(&"Y".to_string()));
    }

    #[test]
    fn test_select_cumulative() {
        let table = table();
        // ascending order for Q1 is Q3 (0.2), Q2 (0.8)
        assert_eq!(table.select("Q1", 0.0), Some(&"Q3".to_string()));
        assert_eq!(table.select("Q1", 0.2), Some(&"Q3".to_string()));
        assert_eq!(table.select("Q1", 0.21), Some(&"Q2".to_string()));
        assert_eq!(table.select("Q1", 0.99), Some(&"Q2".to_string()));
        assert_eq!(table.select("Q3", 0.5), None);
    }

    #[test]
    fn test_select_falls_back_to_last_edge_on_rounding() {
        // probabilities that sum to slightly less than 1.0
        let table = RoutingTable::new(&[
            RoutingEdge::new("A", "B", 0.1),
            RoutingEdge::new("A", "C", 0.2),
            RoutingEdge::new("A", "D", 0.6999999999),
        ]);
        assert_eq!(table.select("A", 0.99999999999), Some(&"D".to_string()));
    }

    #[test]
    fn test_route_consumes_one_draw_only_with_edges() {
        let table = table();
        let mut draws = DrawBudget::new(RandomStream::replay(vec![0.9, 0.1]), 10);

        assert_eq!(table.route("Q3", &mut draws), Ok(None));
        assert_eq!(draws.used(), 0);

        assert_eq!(table.route("Q1", &mut draws), Ok(Some("Q2".to_string())));
        assert_eq!(draws.used(), 1);
        assert_eq!(table.route("Q1", &mut draws), Ok(Some("Q3".to_string())));
        assert_eq!(draws.used(), 2);
    }

    #[test]
    fn test_route_exits_when_budget_spent() {
        let table = table();
        let mut draws = DrawBudget::new(RandomStream::replay(vec![0.5]), 0);
        assert_eq!(table.route("Q1", &mut draws), Ok(None));
        assert_eq!(draws.used(), 0);
    }
}
