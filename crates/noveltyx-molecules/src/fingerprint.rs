//! Circular (Morgan / ECFP-style) count fingerprints and Tanimoto similarity.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::smiles::{BondOrder, Molecule};

pub const DEFAULT_RADIUS: usize = 2;

/// Environment identifier → number of atoms whose environment hashes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    counts: HashMap<u64, u32>,
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Fingerprint {
    /// Morgan fingerprint: every atom contributes one environment per
    /// iteration `0..=radius`. Identifiers only depend on the graph, never on
    /// atom numbering.
    pub fn morgan(mol: &Molecule, radius: usize) -> Self {
        let ring_atoms = mol.ring_atoms();
        let mut current: Vec<u64> = mol
            .atoms()
            .iter()
            .enumerate()
            .map(|(i, atom)| {
                let degree = mol.neighbours(i).len();
                hash_of(&(
                    atom.atomic_number,
                    degree,
                    atom.hydrogens,
                    atom.charge,
                    atom.isotope,
                    ring_atoms[i],
                ))
            })
            .collect();

        let mut counts: HashMap<u64, u32> = HashMap::new();
        for id in &current {
            *counts.entry(*id).or_default() += 1;
        }

        for iteration in 1..=radius {
            let next: Vec<u64> = (0..mol.atom_count())
                .map(|i| {
                    let mut env: Vec<(BondOrder, u64)> = mol
                        .neighbours(i)
                        .iter()
                        .map(|&(n, b)| (mol.bonds()[b].order, current[n]))
                        .collect();
                    env.sort_unstable();
                    hash_of(&(iteration, current[i], env))
                })
                .collect();
            for id in &next {
                *counts.entry(*id).or_default() += 1;
            }
            current = next;
        }

        Self { counts }
    }

    /// Number of distinct environments.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Tanimoto on counts: Σmin / (Σa + Σb − Σmin). 0.0 when both are empty.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        let total_a: u64 = self.counts.values().map(|&c| u64::from(c)).sum();
        let total_b: u64 = other.counts.values().map(|&c| u64::from(c)).sum();
        let shared: u64 = self
            .counts
            .iter()
            .filter_map(|(id, &a)| other.counts.get(id).map(|&b| u64::from(a.min(b))))
            .sum();
        let union = total_a + total_b - shared;
        if union == 0 {
            return 0.0;
        }
        shared as f64 / union as f64
    }
}
