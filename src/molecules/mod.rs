//! Data structures for small molecules parsed from SMILES: atoms, bonds, and the shared
//! `MoleculeCommon` container. These are what descriptor calculation operates on.

pub mod common;

use crate::element::Element;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BondType {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondType {
    /// Integer bond order. Aromatic bonds are not counted here; callers handle them
    /// separately, since their contribution depends on the ring system.
    pub fn order(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Aromatic => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Atom {
    pub serial_number: u32,
    pub element: Element,
    /// Written lowercase in SMILES, or perceived from a Kekulé ring.
    pub aromatic: bool,
    pub formal_charge: i8,
    /// Hydrogens that are not atoms in the graph. Bracket atoms state these directly; for the
    /// organic subset they're derived from default valences.
    pub implicit_h: u8,
    /// Bracket atoms carry an explicit hydrogen count, and skip valence checks.
    pub bracket: bool,
}

impl Default for Atom {
    fn default() -> Self {
        Self {
            serial_number: 0,
            element: Element::Carbon,
            aromatic: false,
            formal_charge: 0,
            implicit_h: 0,
            bracket: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Bond {
    pub bond_type: BondType,
    /// Index
    pub atom_0: usize,
    /// Index
    pub atom_1: usize,
}

pub fn build_adjacency_list(bonds: &[Bond], atoms_len: usize) -> Vec<Vec<usize>> {
    let mut result = vec![Vec::new(); atoms_len];

    // For each bond, record its atoms as neighbors of each other
    for bond in bonds {
        result[bond.atom_0].push(bond.atom_1);
        result[bond.atom_1].push(bond.atom_0);
    }

    result
}
