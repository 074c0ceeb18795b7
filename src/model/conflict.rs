use std::{
    fs::File,
    io::{BufWriter, Write},
};

use fixedbitset::FixedBitSet;
use petgraph::{
    dot::Dot,
    graph::{NodeIndex, UnGraph},
};

use super::session::{Session, SessionIndex};
use crate::error::TimetableError;

/// why two sessions must not share a slot (edge weight of the conflict graph)
///
/// `subject` alone does not forbid a common slot, it forbids a common day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConflictReasons {
    pub cohort: bool,
    pub professor: bool,
    pub resource: bool,
    pub subject: bool,
}

impl ConflictReasons {
    pub fn between(a: &Session, b: &Session) -> Self {
        let same_category = a.category == b.category;

        Self {
            cohort: a.cohort_conflict(b),
            professor: same_category && a.professor == b.professor,
            resource: same_category
                && match (&a.resource, &b.resource) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                },
            subject: same_category && a.subject == b.subject,
        }
    }

    #[inline]
    pub fn forbids_same_slot(&self) -> bool {
        self.cohort || self.professor || self.resource
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.forbids_same_slot() || self.subject)
    }
}

/// conflict graph over all sessions plus its complement as bitset rows
///
/// built once per instance, never mutated during search
#[derive(Debug, Clone)]
pub struct ConflictGraph {
    graph: UnGraph<String, ConflictReasons>,
    compatible: Vec<FixedBitSet>,
    same_subject: Vec<FixedBitSet>,
}

impl ConflictGraph {
    /// node `i` of the graph is session `i` of the arena
    pub fn build(sessions: &[Session]) -> Self {
        let n = sessions.len();

        let mut graph = UnGraph::with_capacity(n, n);
        for session in sessions {
            graph.add_node(session.id.clone());
        }

        let mut compatible = Vec::with_capacity(n);
        let mut same_subject = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = FixedBitSet::with_capacity(n);
            row.insert_range(..);
            row.set(i, false);
            compatible.push(row);
            same_subject.push(FixedBitSet::with_capacity(n));
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let reasons = ConflictReasons::between(&sessions[i], &sessions[j]);
                if reasons.is_empty() {
                    continue;
                }

                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), reasons);

                if reasons.forbids_same_slot() {
                    compatible[i].set(j, false);
                    compatible[j].set(i, false);
                }
                if reasons.subject {
                    same_subject[i].insert(j);
                    same_subject[j].insert(i);
                }
            }
        }

        let conflict_graph = Self {
            graph,
            compatible,
            same_subject,
        };

        tracing::info!(
            "built conflict graph: {} session(s), {} edge(s), {} slot conflict(s)",
            n,
            conflict_graph.graph.edge_count(),
            conflict_graph.slot_conflict_count()
        );

        conflict_graph
    }

    /// adjacent in the compatibility graph, i.e. allowed to share a slot
    #[inline]
    pub fn compatible(&self, a: SessionIndex, b: SessionIndex) -> bool {
        self.compatible[a.0].contains(b.0)
    }

    #[inline]
    pub fn same_subject(&self, a: SessionIndex, b: SessionIndex) -> bool {
        self.same_subject[a.0].contains(b.0)
    }

    /// number of pairs that must never share a slot
    pub fn slot_conflict_count(&self) -> usize {
        self.graph
            .raw_edges()
            .iter()
            .filter(|edge| edge.weight.forbids_same_slot())
            .count()
    }

    /// writes graphviz dot code of the conflict graph
    pub fn save_dot_code_to(&self, filepath: &str) -> Result<(), TimetableError> {
        let dot_code = format!("{:?}", Dot::with_config(&self.graph, &[]));

        BufWriter::new(File::create(filepath).map_err(|e| TimetableError::io(filepath, e))?)
            .write_all(dot_code.as_bytes())
            .map_err(|e| TimetableError::io(filepath, e))
    }
}

#[cfg(test)]
impl ConflictGraph {
    /// every reason recorded for the pair, `None` if not adjacent
    pub fn reasons(&self, a: SessionIndex, b: SessionIndex) -> Option<ConflictReasons> {
        self.graph
            .find_edge(NodeIndex::new(a.0), NodeIndex::new(b.0))
            .map(|edge| self.graph[edge])
    }

    /// (smaller id, larger id, reasons) for every edge, sorted; independent of arena order
    pub fn edge_set(&self) -> Vec<(String, String, ConflictReasons)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.graph.edge_endpoints(edge)?;
                let (a, b) = (self.graph[a].clone(), self.graph[b].clone());
                let reasons = self.graph[edge];
                Some(if a <= b { (a, b, reasons) } else { (b, a, reasons) })
            })
            .collect();
        edges.sort_by(|x, y| (&x.0, &x.1).cmp(&(&y.0, &y.1)));
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        fixtures::{elective, mandatory},
        session::assign_tracks,
    };

    #[test]
    fn same_professor_same_cohort_has_both_reasons() {
        let sessions = vec![
            mandatory("a", "CCO", 1, "CALC", "P1", 2),
            mandatory("b", "CCO", 1, "ALGO", "P1", 2),
        ];
        let graph = ConflictGraph::build(&sessions);

        let reasons = graph.reasons(SessionIndex(0), SessionIndex(1)).unwrap();
        assert!(reasons.cohort);
        assert!(reasons.professor);
        assert!(!reasons.resource);
        assert!(!graph.compatible(SessionIndex(0), SessionIndex(1)));
        assert!(!graph.compatible(SessionIndex(1), SessionIndex(0)));
        // one edge carrying two reasons
        assert_eq!(graph.slot_conflict_count(), 1);
    }

    #[test]
    fn electives_on_different_tracks_are_not_adjacent() {
        let mut sessions = vec![
            elective("a", "CCO", 6, "ML", "P1"),
            elective("b", "CCO", 6, "NLP", "P2"),
        ];
        assign_tracks(&mut sessions, 5);
        assert_eq!(sessions[0].track, Some(1));
        assert_eq!(sessions[1].track, Some(2));

        let graph = ConflictGraph::build(&sessions);

        assert!(graph.edge_set().is_empty());
        assert_eq!(graph.slot_conflict_count(), 0);
        assert!(graph.compatible(SessionIndex(0), SessionIndex(1)));
    }

    #[test]
    fn professor_and_resource_rules_are_category_scoped() {
        let mut day_lab = mandatory("a", "CCO", 1, "NET", "P1", 2);
        day_lab.resource = Some("LAB1".to_string());
        let mut night_lab = mandatory("b", "SIN", 1, "OS", "P1", 2);
        night_lab.resource = Some("LAB1".to_string());
        let mut other_day_lab = mandatory("c", "CCO", 3, "DB", "P2", 2);
        other_day_lab.resource = Some("LAB1".to_string());

        let graph = ConflictGraph::build(&[day_lab, night_lab, other_day_lab]);

        // same professor and lab, but day vs night program
        assert!(graph.reasons(SessionIndex(0), SessionIndex(1)).is_none());
        assert!(graph.compatible(SessionIndex(0), SessionIndex(1)));

        let reasons = graph.reasons(SessionIndex(0), SessionIndex(2)).unwrap();
        assert!(reasons.resource);
        assert!(!reasons.professor);
        assert!(!graph.compatible(SessionIndex(0), SessionIndex(2)));
    }

    #[test]
    fn same_subject_is_recorded_but_stays_compatible() {
        let sessions = vec![
            mandatory("a", "CCO", 1, "CALC", "P1", 2),
            mandatory("b", "CCO", 2, "CALC", "P2", 2),
        ];
        let graph = ConflictGraph::build(&sessions);

        let reasons = graph.reasons(SessionIndex(0), SessionIndex(1)).unwrap();
        assert!(reasons.subject);
        assert!(!reasons.forbids_same_slot());
        assert!(graph.compatible(SessionIndex(0), SessionIndex(1)));
        assert!(graph.same_subject(SessionIndex(0), SessionIndex(1)));
        assert_eq!(graph.slot_conflict_count(), 0);
    }

    #[test]
    fn edge_set_does_not_depend_on_row_order() {
        let rows = vec![
            mandatory("a", "CCO", 1, "CALC", "P1", 2),
            mandatory("b", "CCO", 1, "ALGO", "P2", 2),
            elective("c", "CCO", 6, "ML", "P3"),
            elective("d", "CCO", 6, "NLP", "P1"),
            elective("e", "CCO", 6, "CV", "P4"),
            mandatory("f", "CCO", 2, "CALC", "P2", 2),
        ];

        let mut forward = rows.clone();
        assign_tracks(&mut forward, 5);

        let mut backward: Vec<Session> = rows.into_iter().rev().collect();
        assign_tracks(&mut backward, 5);

        let forward_edges = ConflictGraph::build(&forward).edge_set();
        let backward_edges = ConflictGraph::build(&backward).edge_set();

        assert!(!forward_edges.is_empty());
        assert_eq!(forward_edges, backward_edges);
    }
}
