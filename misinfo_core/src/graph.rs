//! Directed follower graph.
//!
//! Edges point in the delivery direction: from the followed account to each
//! of its followers. A share by `u` is delivered along `u`'s outgoing edges.
//! The graph is built once before the run and is read-only afterwards.

use misinfo_env::UserId;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Accounts with more followers than this seed synthetic edges.
pub const SYNTHETIC_INFLUENCE_FLOOR: u64 = 1_000;

/// Upper bound on the synthetic per-pair follow probability.
pub const SYNTHETIC_MAX_FOLLOW_PROB: f64 = 0.1;

/// Follower count at which the synthetic follow probability would reach 1.0
/// before capping.
const SYNTHETIC_INFLUENCE_SCALE: f64 = 1_000_000.0;

/// Directed graph over user identities, stored as index adjacency.
#[derive(Debug, Clone, Default)]
pub struct SocialGraph {
    /// Node identities in insertion order
    nodes: Vec<UserId>,

    /// Identity -> node index
    index: HashMap<UserId, usize>,

    /// Followers of each node, ordered by node index for stable iteration
    followers: Vec<BTreeSet<usize>>,
}

impl SocialGraph {
    /// Creates a graph with the given nodes and no edges.
    ///
    /// Repeated identities are ignored after their first occurrence.
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut graph = Self::default();
        for id in ids {
            if graph.index.contains_key(&id) {
                continue;
            }
            graph.index.insert(id.clone(), graph.nodes.len());
            graph.nodes.push(id);
            graph.followers.push(BTreeSet::new());
        }
        graph
    }

    /// Builds a graph from explicit `(follower, followed)` pairs.
    ///
    /// Pairs naming an unknown user, and self-follows, are dropped.
    pub fn from_edges<I>(ids: I, edges: &[(UserId, UserId)]) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut graph = Self::new(ids);
        let mut dropped = 0usize;

        for (follower, followed) in edges {
            match (graph.index_of(followed), graph.index_of(follower)) {
                (Some(from), Some(to)) if from != to => {
                    graph.followers[from].insert(to);
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!("Dropped {} follower edges with unknown or identical endpoints", dropped);
        }
        debug!(
            "Built follower graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Synthesizes influence-weighted edges when no edge list exists.
    ///
    /// Each account with more than [`SYNTHETIC_INFLUENCE_FLOOR`] followers
    /// gains every other user as a follower with probability
    /// `min(0.1, followers / 1e6)`. Draws come from `rng` in node order.
    pub fn synthetic<R: Rng>(users: &[(UserId, u64)], rng: &mut R) -> Self {
        let mut graph = Self::new(users.iter().map(|(id, _)| id.clone()));

        for (source_id, influence) in users {
            if *influence <= SYNTHETIC_INFLUENCE_FLOOR {
                continue;
            }
            let Some(from) = graph.index_of(source_id) else {
                continue;
            };
            let follow_prob =
                (*influence as f64 / SYNTHETIC_INFLUENCE_SCALE).min(SYNTHETIC_MAX_FOLLOW_PROB);

            for to in 0..graph.nodes.len() {
                if to != from && rng.gen::<f64>() < follow_prob {
                    graph.followers[from].insert(to);
                }
            }
        }

        debug!(
            "Synthesized follower graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Returns the node index of an identity.
    pub fn index_of(&self, id: &UserId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns the identity at a node index.
    pub fn user_id(&self, idx: usize) -> Option<&UserId> {
        self.nodes.get(idx)
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.index.contains_key(id)
    }

    /// Followers of a node in ascending node order.
    pub fn followers(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.followers
            .get(idx)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Number of in-graph followers of a node.
    pub fn out_degree(&self, idx: usize) -> usize {
        self.followers.get(idx).map_or(0, BTreeSet::len)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.followers.iter().map(BTreeSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ids(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|n| UserId::from(*n)).collect()
    }

    #[test]
    fn test_edges_point_to_followers() {
        // bob follows alice: alice's shares reach bob
        let edges = vec![(UserId::from("bob"), UserId::from("alice"))];
        let graph = SocialGraph::from_edges(ids(&["alice", "bob"]), &edges);

        let alice = graph.index_of(&UserId::from("alice")).unwrap();
        let bob = graph.index_of(&UserId::from("bob")).unwrap();
        assert_eq!(graph.followers(alice).collect::<Vec<_>>(), vec![bob]);
        assert_eq!(graph.out_degree(bob), 0);
    }

    #[test]
    fn test_unknown_and_duplicate_edges_dropped() {
        let edges = vec![
            (UserId::from("bob"), UserId::from("alice")),
            (UserId::from("bob"), UserId::from("alice")),
            (UserId::from("carol"), UserId::from("alice")),
            (UserId::from("alice"), UserId::from("alice")),
        ];
        let graph = SocialGraph::from_edges(ids(&["alice", "bob"]), &edges);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_duplicate_nodes_ignored() {
        let graph = SocialGraph::new(ids(&["a", "b", "a"]));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.index_of(&UserId::from("b")), Some(1));
    }

    #[test]
    fn test_synthetic_only_influencers_gain_followers() {
        let mut users = vec![(UserId::from("star"), 2_000_000u64)];
        for i in 0..200 {
            users.push((UserId::new(format!("u{}", i)), 10));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let graph = SocialGraph::synthetic(&users, &mut rng);

        let star = graph.index_of(&UserId::from("star")).unwrap();
        let star_followers = graph.out_degree(star);
        // p = 0.1 over 200 candidates
        assert!(star_followers > 0 && star_followers < 60);
        assert_eq!(graph.edge_count(), star_followers);
        assert!(graph.followers(star).all(|f| f != star));
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let users: Vec<(UserId, u64)> = (0..50)
            .map(|i| (UserId::new(format!("u{}", i)), 5_000 * i as u64))
            .collect();

        let g1 = SocialGraph::synthetic(&users, &mut ChaCha8Rng::seed_from_u64(9));
        let g2 = SocialGraph::synthetic(&users, &mut ChaCha8Rng::seed_from_u64(9));

        for idx in 0..g1.node_count() {
            assert_eq!(
                g1.followers(idx).collect::<Vec<_>>(),
                g2.followers(idx).collect::<Vec<_>>()
            );
        }
    }
}
