//! # HNSW Proximity Graph
//!
//! A layered navigable small-world graph keyed by caller-supplied string
//! ids. Layer membership follows the usual geometric distribution
//! (`⌊-ln(U) / ln(M)⌋`); searches zoom in greedily through the upper layers
//! and run a beam search on layer 0.
//!
//! Cosine similarity is the ranking score; higher is closer. Magnitudes are
//! precomputed per node, and a dimension mismatch scores a sentinel that
//! top-K filtering discards.
//!
//! One background indexer is the only writer; arbitrary searchers share the
//! read side of the lock.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

use kore_core::codec;
use kore_core::config::HnswConfig;

/// Upper bound on sampled levels; the geometric tail never gets near this.
const LEVEL_CAP: usize = 32;

struct Node {
    vector: Vec<f32>,
    magnitude: f32,
    level: usize,
    /// One unordered neighbor set per layer, `0..=level`.
    neighbors: Vec<HashSet<String>>,
}

#[derive(Clone)]
struct EntryPoint {
    id: String,
    level: usize,
}

pub struct HnswIndex {
    config: HnswConfig,
    level_mult: f64,
    nodes: RwLock<HashMap<String, Node>>,
    entry: RwLock<Option<EntryPoint>>,
    len: AtomicUsize,
}

impl HnswIndex {
    pub fn new(config: HnswConfig) -> Self {
        let level_mult = config.level_mult();
        Self {
            config,
            level_mult,
            nodes: RwLock::new(HashMap::new()),
            entry: RwLock::new(None),
            len: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert (or re-insert) a vector. Re-inserting an id replaces its
    /// vector; links other nodes already hold toward it stay valid.
    pub fn insert(&self, id: &str, vector: Vec<f32>) {
        let magnitude = codec::magnitude(&vector);
        let level = self.sample_level();
        let query = vector.clone();

        let mut nodes = self.nodes.write();
        let mut entry = self.entry.write();

        nodes.remove(id);
        nodes.insert(
            id.to_string(),
            Node {
                vector,
                magnitude,
                level,
                neighbors: vec![HashSet::new(); level + 1],
            },
        );
        self.len.store(nodes.len(), AtomicOrdering::Relaxed);

        let Some(ep) = entry.clone() else {
            *entry = Some(EntryPoint {
                id: id.to_string(),
                level,
            });
            debug!(id, level, "installed first HNSW entry point");
            return;
        };

        // Re-inserting the entry node itself: descend from any other node
        // so the fresh copy gets linked back into the graph.
        let (descent_entry, descent_level) = if ep.id == id {
            match nodes
                .iter()
                .find(|(other_id, _)| other_id.as_str() != id)
                .map(|(other_id, other)| (other_id.clone(), other.level))
            {
                Some(other) => other,
                None => {
                    *entry = Some(EntryPoint {
                        id: id.to_string(),
                        level,
                    });
                    return;
                }
            }
        } else {
            (ep.id.clone(), ep.level)
        };

        // Zoom in through the layers above the new node's level.
        let mut current = descent_entry;
        if descent_level > level {
            for layer in (level + 1..=descent_level).rev() {
                current = greedy_descend(&nodes, &query, magnitude, current, layer);
            }
        }

        let top = level.min(descent_level);
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                &nodes,
                &query,
                magnitude,
                &current,
                self.config.ef_construction,
                layer,
            );
            if candidates.is_empty() {
                continue;
            }

            let selected: Vec<String> = candidates
                .iter()
                .take(self.config.m)
                .map(|(cid, _)| cid.clone())
                .collect();

            for nb_id in &selected {
                if nb_id == id {
                    continue;
                }
                if let Some(node) = nodes.get_mut(id) {
                    node.neighbors[layer].insert(nb_id.clone());
                }
                if let Some(nb) = nodes.get_mut(nb_id) {
                    if layer < nb.neighbors.len() {
                        nb.neighbors[layer].insert(id.to_string());
                    }
                }
            }
            for nb_id in &selected {
                prune_neighbors(&mut nodes, nb_id, layer, self.config.m);
            }

            current = candidates[0].0.clone();
        }

        if level > ep.level || ep.id == id {
            *entry = Some(EntryPoint {
                id: id.to_string(),
                level,
            });
            debug!(id, level, "moved HNSW entry point");
        }
    }

    /// Top-K approximate search. Empty when the graph holds no nodes.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let qmag = codec::magnitude(query);

        let nodes = self.nodes.read();
        let Some(ep) = self.entry.read().clone() else {
            return Vec::new();
        };

        let mut current = ep.id;
        for layer in (1..=ep.level).rev() {
            current = greedy_descend(&nodes, query, qmag, current, layer);
        }

        let ef = self.config.ef_search.max(k);
        let mut results = search_layer(&nodes, query, qmag, &current, ef, 0);
        results.retain(|(_, score)| *score > codec::SCORE_FILTER);
        results.truncate(k);
        results
    }

    /// Level assignment: `⌊-ln(U) * level_mult⌋` with `U ~ Uniform(0, 1]`.
    fn sample_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        let u: f64 = 1.0 - rng.gen::<f64>();
        (((-u.ln()) * self.level_mult).floor() as usize).min(LEVEL_CAP)
    }
}

fn similarity(node: &Node, query: &[f32], query_mag: f32) -> f32 {
    codec::cosine(&node.vector, node.magnitude, query, query_mag)
}

/// One layer of greedy zoom-in: keep stepping to the strictly better
/// neighbor until no neighbor improves on the current position.
fn greedy_descend(
    nodes: &HashMap<String, Node>,
    query: &[f32],
    query_mag: f32,
    mut current: String,
    layer: usize,
) -> String {
    let mut current_score = nodes
        .get(&current)
        .map(|n| similarity(n, query, query_mag))
        .unwrap_or(f32::NEG_INFINITY);

    loop {
        let step = {
            let Some(node) = nodes.get(&current) else {
                break;
            };
            if layer >= node.neighbors.len() {
                break;
            }
            let mut best: Option<(String, f32)> = None;
            for nb_id in &node.neighbors[layer] {
                if let Some(nb) = nodes.get(nb_id) {
                    let score = similarity(nb, query, query_mag);
                    let beats_best = best.as_ref().map(|(_, b)| score > *b).unwrap_or(true);
                    if score > current_score && beats_best {
                        best = Some((nb_id.clone(), score));
                    }
                }
            }
            best
        };

        match step {
            Some((id, score)) => {
                current = id;
                current_score = score;
            }
            None => break,
        }
    }
    current
}

/// Beam search within one layer: a max-heap of exploration candidates and a
/// bounded min-heap of results. Returns up to `ef` ids sorted by similarity
/// descending.
fn search_layer(
    nodes: &HashMap<String, Node>,
    query: &[f32],
    query_mag: f32,
    entry_id: &str,
    ef: usize,
    layer: usize,
) -> Vec<(String, f32)> {
    let Some(entry_node) = nodes.get(entry_id) else {
        return Vec::new();
    };
    let entry_score = similarity(entry_node, query, query_mag);

    let mut visited: HashSet<String> = HashSet::new();
    let mut candidates: BinaryHeap<Scored> = BinaryHeap::new();
    let mut results: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();

    visited.insert(entry_id.to_string());
    candidates.push(Scored {
        score: entry_score,
        id: entry_id.to_string(),
    });
    results.push(Reverse(Scored {
        score: entry_score,
        id: entry_id.to_string(),
    }));

    while let Some(current) = candidates.pop() {
        let Some(node) = nodes.get(&current.id) else {
            continue;
        };
        if layer >= node.neighbors.len() {
            continue;
        }
        for nb_id in &node.neighbors[layer] {
            if !visited.insert(nb_id.clone()) {
                continue;
            }
            let Some(nb) = nodes.get(nb_id) else {
                continue;
            };
            let score = similarity(nb, query, query_mag);
            let worst = results
                .peek()
                .map(|Reverse(w)| w.score)
                .unwrap_or(f32::NEG_INFINITY);
            if results.len() < ef || score > worst {
                candidates.push(Scored {
                    score,
                    id: nb_id.clone(),
                });
                results.push(Reverse(Scored {
                    score,
                    id: nb_id.clone(),
                }));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut out: Vec<(String, f32)> = results
        .into_iter()
        .map(|Reverse(s)| (s.id, s.score))
        .collect();
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    out
}

/// Trim an over-full neighbor set back to `m`, keeping the neighbors most
/// similar to the node itself.
fn prune_neighbors(nodes: &mut HashMap<String, Node>, id: &str, layer: usize, m: usize) {
    let ranked: Vec<String> = {
        let Some(node) = nodes.get(id) else {
            return;
        };
        if layer >= node.neighbors.len() || node.neighbors[layer].len() <= m {
            return;
        }
        let mut scored: Vec<(String, f32)> = node.neighbors[layer]
            .iter()
            .filter_map(|nb_id| {
                nodes.get(nb_id).map(|nb| {
                    (
                        nb_id.clone(),
                        codec::cosine(&node.vector, node.magnitude, &nb.vector, nb.magnitude),
                    )
                })
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(m);
        scored.into_iter().map(|(nb_id, _)| nb_id).collect()
    };

    if let Some(node) = nodes.get_mut(id) {
        node.neighbors[layer] = ranked.into_iter().collect();
    }
}

struct Scored {
    score: f32,
    id: String,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.id == other.id
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}
