//! This defines a `MoleculeCommon` struct: the atoms and bonds of one parsed structure, with
//! graph helpers used by aromaticity perception and descriptor calculation.

use std::collections::{HashSet, VecDeque};

use crate::{
    element::Element,
    molecules::{Atom, Bond, BondType, build_adjacency_list},
};

/// Contains fields shared by all molecule types.
#[derive(Debug, Clone, Default)]
pub struct MoleculeCommon {
    pub ident: String,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// A fast lookup for finding atoms, by index, covalently bonded to each atom.
    pub adjacency_list: Vec<Vec<usize>>,
}

/// Per-atom bond counts, by type. Only bonds to heavy atoms are counted.
#[derive(Clone, Copy, Default, Debug)]
pub struct BondCounts {
    pub single: usize,
    pub double: usize,
    pub triple: usize,
    pub aromatic: usize,
}

impl MoleculeCommon {
    pub fn new(ident: String, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut result = Self {
            ident,
            atoms,
            bonds,
            ..Self::default()
        };

        result.build_adjacency_list();
        result
    }

    pub fn build_adjacency_list(&mut self) {
        self.adjacency_list = build_adjacency_list(&self.bonds, self.atoms.len());
    }

    pub fn find_bond(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|bb| (bb.atom_0 == a && bb.atom_1 == b) || (bb.atom_0 == b && bb.atom_1 == a))
    }

    pub fn bond_type(&self, a: usize, b: usize) -> Option<BondType> {
        self.find_bond(a, b).map(|b| b.bond_type)
    }

    /// Hydrogens on atom `i`: implicit ones, plus any written as explicit `[H]` atoms.
    pub fn total_h(&self, i: usize) -> u8 {
        let explicit = self.adjacency_list[i]
            .iter()
            .filter(|&&j| self.atoms[j].element == Element::Hydrogen)
            .count();

        // Saturates on pathological input, e.g. hundreds of `[H]` neighbors.
        u8::try_from(explicit).map_or(u8::MAX, |e| self.atoms[i].implicit_h.saturating_add(e))
    }

    /// Heavy-atom neighbor indices of atom `i`.
    pub fn heavy_neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency_list[i]
            .iter()
            .copied()
            .filter(|&j| self.atoms[j].element != Element::Hydrogen)
    }

    pub fn heavy_degree(&self, i: usize) -> usize {
        self.heavy_neighbors(i).count()
    }

    pub fn bond_counts(&self, i: usize) -> BondCounts {
        let mut result = BondCounts::default();

        for j in self.heavy_neighbors(i) {
            match self.bond_type(i, j) {
                Some(BondType::Single) => result.single += 1,
                Some(BondType::Double) => result.double += 1,
                Some(BondType::Triple) => result.triple += 1,
                Some(BondType::Aromatic) => result.aromatic += 1,
                None => (),
            }
        }

        result
    }

    /// Total valence of atom `i`, including hydrogens. Aromatic bonds count 1.5, and the sum
    /// is rounded.
    pub fn valence(&self, i: usize) -> u8 {
        let mut v = self.total_h(i) as f64;
        for j in self.heavy_neighbors(i) {
            v += match self.bond_type(i, j) {
                Some(BondType::Single) => 1.,
                Some(BondType::Double) => 2.,
                Some(BondType::Triple) => 3.,
                Some(BondType::Aromatic) => 1.5,
                None => 0.,
            };
        }
        v.round() as u8
    }

    /// Whether the bond between `a` and `b` lies on a cycle.
    pub fn bond_in_ring(&self, a: usize, b: usize) -> bool {
        bfs_reachable_ignoring_edge(&self.adjacency_list, a, b, edge_key(a, b))
    }

    /// All simple cycles of exactly `len` atoms, as atom indices in ring order.
    pub fn rings_of_len(&self, len: usize) -> Vec<Vec<usize>> {
        count_cycles_len(&self.adjacency_list, len)
    }
}

pub(crate) fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

pub(crate) fn bfs_reachable_ignoring_edge(
    adj: &[Vec<usize>],
    start: usize,
    goal: usize,
    ignore: (usize, usize),
) -> bool {
    let mut q = VecDeque::new();
    let mut seen = vec![false; adj.len()];
    seen[start] = true;
    q.push_back(start);

    while let Some(u) = q.pop_front() {
        if u == goal {
            return true;
        }
        for &v in &adj[u] {
            if edge_key(u, v) == ignore {
                continue;
            }
            if !seen[v] {
                seen[v] = true;
                q.push_back(v);
            }
        }
    }
    false
}

/// Rotate and orient a cycle so each ring has one representation: smallest index first, then
/// the smaller of the two directions.
fn canonical_cycle(nodes: &[usize]) -> Vec<usize> {
    let n = nodes.len();

    let min_i = nodes
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut rot_fwd = Vec::with_capacity(n);
    for k in 0..n {
        rot_fwd.push(nodes[(min_i + k) % n]);
    }

    let mut rev = Vec::with_capacity(n);
    for k in 0..n {
        rev.push(nodes[(min_i + n - (k % n)) % n]);
    }

    if rev < rot_fwd { rev } else { rot_fwd }
}

pub(crate) fn count_cycles_len(adj: &[Vec<usize>], len: usize) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut cycles_set: HashSet<Vec<usize>> = HashSet::new();
    let mut stack: Vec<usize> = Vec::with_capacity(len);
    let mut visited = vec![false; n];

    fn dfs(
        adj: &[Vec<usize>],
        s: usize,
        u: usize,
        len: usize,
        stack: &mut Vec<usize>,
        visited: &mut [bool],
        cycles_set: &mut HashSet<Vec<usize>>,
    ) {
        if stack.len() == len {
            if adj[u].iter().any(|&v| v == s) {
                cycles_set.insert(canonical_cycle(stack));
            }
            return;
        }

        for &v in &adj[u] {
            // Only extend through higher indices, so each cycle is found from its lowest atom.
            if v == s || visited[v] || v < s {
                continue;
            }

            visited[v] = true;
            stack.push(v);
            dfs(adj, s, v, len, stack, visited, cycles_set);
            stack.pop();
            visited[v] = false;
        }
    }

    if len < 3 {
        return Vec::new();
    }

    for s in 0..n {
        visited[s] = true;
        stack.clear();
        stack.push(s);

        for &v in &adj[s] {
            if v < s {
                continue;
            }
            visited[v] = true;
            stack.push(v);
            dfs(adj, s, v, len, &mut stack, &mut visited, &mut cycles_set);
            stack.pop();
            visited[v] = false;
        }

        visited[s] = false;
    }

    let mut result: Vec<_> = cycles_set.into_iter().collect();
    result.sort();
    result
}
