//! Status analysis over a consensus
//!
//! Every path gets a status from its assertions. Node statuses aggregate
//! the statuses of a path and all its descendants: the highest pending
//! count, and `CONFLICT` or `NOACK` when any descendant has it.

use crate::consensus::Consensus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Agreement state of a path or node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ack {
    /// Our signer agrees with the single asserted value
    Ack,
    /// Our signer has not agreed
    NoAck,
    /// More than one value is asserted
    Conflict,
}

impl Display for Ack {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ack => "ACK",
            Self::NoAck => "NOACK",
            Self::Conflict => "CONFLICT",
        })
    }
}

/// Status of one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStatus {
    /// Signers that have not agreed yet
    pub pending: usize,
    /// Issuer of the single asserted value, `None` on conflict
    pub issuer: Option<String>,
    /// Agreement state
    pub ack: Ack,
}

/// Aggregated status of a path and its descendants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    /// Highest pending count below the node
    pub pending: usize,
    /// Worst agreement state below the node
    pub ack: Ack,
}

/// Path and node statuses of one analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statuses {
    /// Status of every consensus path
    pub paths: BTreeMap<String, PathStatus>,
    /// Aggregated status of every consensus path and its ancestors
    pub nodes: BTreeMap<String, NodeStatus>,
}

/// Status before and after adopting a position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange<T> {
    /// Status without the position
    pub before: Option<T>,
    /// Status with the position
    pub after: Option<T>,
}

/// Compute path and node statuses
///
/// Paths are visited deepest first so node statuses accumulate upwards.
#[must_use]
pub fn analyze(consensus: &Consensus, our_signer: Option<&str>, nr_signers: usize) -> Statuses {
    let mut statuses = Statuses::default();
    for (path, assertions) in consensus.iter().rev() {
        let status = match assertions {
            [single] => PathStatus {
                pending: nr_signers.saturating_sub(single.signers.len()),
                issuer: single.issuer.clone(),
                ack: match our_signer {
                    Some(ours) if single.signers.contains(ours) => Ack::Ack,
                    _ => Ack::NoAck,
                },
            },
            _ => PathStatus {
                pending: nr_signers,
                issuer: None,
                ack: Ack::Conflict,
            },
        };
        propagate(&mut statuses.nodes, path, &status);
        statuses.paths.insert(path.to_string(), status);
    }
    statuses
}

fn propagate(nodes: &mut BTreeMap<String, NodeStatus>, path: &str, status: &PathStatus) {
    let mut path = path;
    loop {
        nodes
            .entry(path.to_string())
            .and_modify(|node| {
                node.pending = node.pending.max(status.pending);
                if node.ack != Ack::Conflict && status.ack != Ack::Ack {
                    node.ack = status.ack;
                }
            })
            .or_insert(NodeStatus {
                pending: status.pending,
                ack: status.ack,
            });

        if path.is_empty() {
            break;
        }
        path = path.rsplit_once('/').map_or("", |(parent, _)| parent);
    }
}

/// Pair up statuses before and after, over the keys of both
#[must_use]
pub fn compare<T: Clone>(
    before: &BTreeMap<String, T>,
    after: &BTreeMap<String, T>,
) -> BTreeMap<String, StatusChange<T>> {
    let mut out: BTreeMap<String, StatusChange<T>> = after
        .iter()
        .map(|(path, status)| {
            let change = StatusChange {
                before: before.get(path).cloned(),
                after: Some(status.clone()),
            };
            (path.clone(), change)
        })
        .collect();
    for (path, status) in before {
        out.entry(path.clone()).or_insert_with(|| StatusChange {
            before: Some(status.clone()),
            after: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn conflict_propagates_to_root() {
        let mut consensus = Consensus::new();
        consensus.record("a/b/c".into(), Some(json!(1)), "x");
        consensus.record("a/b/c".into(), Some(json!(2)), "y");
        consensus.record("a/d".into(), Some(json!(3)), "x");

        let statuses = analyze(&consensus, Some("y"), 2);
        assert_eq!(statuses.paths["a/b/c"].ack, Ack::Conflict);
        assert_eq!(statuses.paths["a/d"].ack, Ack::NoAck);
        for node in ["a/b/c", "a/b", "a", ""] {
            assert_eq!(statuses.nodes[node].ack, Ack::Conflict, "{node}");
        }
        assert_eq!(statuses.nodes["a/d"].ack, Ack::NoAck);
        assert_eq!(statuses.nodes["a"].pending, 2);
    }

    #[test]
    fn ack_needs_our_agreement() {
        let mut consensus = Consensus::new();
        consensus.record("k".into(), Some(json!(1)), "x");
        consensus.record("k".into(), Some(json!(1)), "y");

        let statuses = analyze(&consensus, Some("y"), 3);
        assert_eq!(
            statuses.paths["k"],
            PathStatus {
                pending: 2,
                issuer: Some("x".into()),
                ack: Ack::Ack,
            }
        );
        assert_eq!(statuses.nodes[""].ack, Ack::Ack);

        let statuses = analyze(&consensus, None, 3);
        assert_eq!(statuses.paths["k"].ack, Ack::NoAck);
    }

    #[test]
    fn noack_overrides_ack_but_not_conflict() {
        let mut nodes = BTreeMap::new();
        let status = |ack| PathStatus {
            pending: 0,
            issuer: None,
            ack,
        };
        propagate(&mut nodes, "a", &status(Ack::Ack));
        propagate(&mut nodes, "b", &status(Ack::NoAck));
        assert_eq!(nodes[""].ack, Ack::NoAck);
        propagate(&mut nodes, "c", &status(Ack::Conflict));
        propagate(&mut nodes, "d", &status(Ack::NoAck));
        assert_eq!(nodes[""].ack, Ack::Conflict);
    }

    #[test]
    fn compare_covers_both_sides() {
        let before = BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);
        let after = BTreeMap::from([("b".to_string(), 3), ("c".to_string(), 4)]);
        let changes = compare(&before, &after);
        assert_eq!(changes["a"], StatusChange { before: Some(1), after: None });
        assert_eq!(changes["b"], StatusChange { before: Some(2), after: Some(3) });
        assert_eq!(changes["c"], StatusChange { before: None, after: Some(4) });
    }

    #[test]
    fn ack_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Ack::NoAck).unwrap(), json!("NOACK"));
        assert_eq!(Ack::Conflict.to_string(), "CONFLICT");
    }
}
