//! Physicochemical descriptors for small molecules: molecular weight, topological polar surface
//! area, and Lipinski hydrogen-bond donor and acceptor counts. These make up the feature
//! vector the regressors are trained on.

use std::{
    collections::{HashSet, VecDeque},
    fmt::{Display, Formatter},
};

use log::{debug, trace};

use crate::{
    element::Element::{self, *},
    molecules::{BondType, common::MoleculeCommon},
};

pub const N_DESCRIPTORS: usize = 4;

/// `[mol_weight, tpsa, h_bond_acceptors, h_bond_donors]`. A structure that fails to parse
/// has every entry absent.
pub type DescriptorVec = [Option<f64>; N_DESCRIPTORS];

/// Describes a small molecule by the features used for bioactivity regression.
#[derive(Clone, Default, Debug)]
pub struct MolCharacterization {
    pub num_heavy_atoms: usize,
    pub num_bonds: usize,
    pub num_rings_total: usize,
    pub num_aromatic_atoms: usize,
    /// Daltons, with hydrogens included.
    pub mol_weight: f64,
    /// Å²; nitrogen and oxygen contributions only.
    pub tpsa: f64,
    /// Atom indices.
    pub h_bond_donor: Vec<usize>,
    /// Atom indices.
    pub h_bond_acceptor: Vec<usize>,
}

impl Display for MolCharacterization {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#: {} Wt: {:.2} TPSA: {:.2} HBA: {} HBD: {}",
            self.num_heavy_atoms,
            self.mol_weight,
            self.tpsa,
            self.h_bond_acceptor.len(),
            self.h_bond_donor.len()
        )?;

        if self.num_rings_total > 0 {
            write!(f, ", {} ring", self.num_rings_total)?;
            if self.num_aromatic_atoms > 0 {
                write!(f, " ({} aromatic atoms)", self.num_aromatic_atoms)?;
            }
        }

        Ok(())
    }
}

impl MolCharacterization {
    pub fn new(mol: &MoleculeCommon) -> Self {
        let h_weight = Hydrogen.atomic_weight();

        let mol_weight = mol
            .atoms
            .iter()
            .map(|a| a.element.atomic_weight() + a.implicit_h as f64 * h_weight)
            .sum();

        let num_heavy_atoms = mol.atoms.iter().filter(|a| a.element != Hydrogen).count();
        let num_aromatic_atoms = mol.atoms.iter().filter(|a| a.aromatic).count();

        let in_3_ring: HashSet<usize> = mol.rings_of_len(3).into_iter().flatten().collect();

        let mut tpsa = 0.;
        let mut h_bond_donor = Vec::new();
        let mut h_bond_acceptor = Vec::new();

        for i in 0..mol.atoms.len() {
            tpsa += tpsa_contrib(mol, i, in_3_ring.contains(&i));

            if is_donor(mol, i) {
                h_bond_donor.push(i);
            }
            if is_acceptor(mol, i) {
                h_bond_acceptor.push(i);
            }
        }

        Self {
            num_heavy_atoms,
            num_bonds: mol.bonds.len(),
            num_rings_total: num_rings(mol),
            num_aromatic_atoms,
            mol_weight,
            tpsa,
            h_bond_donor,
            h_bond_acceptor,
        }
    }

    pub fn descriptors(&self) -> [f64; N_DESCRIPTORS] {
        [
            self.mol_weight,
            self.tpsa,
            self.h_bond_acceptor.len() as f64,
            self.h_bond_donor.len() as f64,
        ]
    }
}

/// Compute the descriptor vector for a SMILES string. Anything that doesn't parse, including an
/// empty string, yields the all-absent vector.
pub fn descriptor_vec(smiles: &str) -> DescriptorVec {
    match MoleculeCommon::from_smiles(smiles) {
        Ok(mol) => {
            let c = MolCharacterization::new(&mol);
            trace!("{smiles}: {c}");
            c.descriptors().map(Some)
        }
        Err(e) => {
            debug!("Unable to parse SMILES {smiles:?}: {e}");
            [None; N_DESCRIPTORS]
        }
    }
}

pub fn is_complete(v: &DescriptorVec) -> bool {
    v.iter().all(|d| d.is_some())
}

/// The descriptor values, if all are present.
pub fn features(v: &DescriptorVec) -> Option<[f64; N_DESCRIPTORS]> {
    let mut result = [0.; N_DESCRIPTORS];
    for (r, d) in result.iter_mut().zip(v) {
        *r = (*d)?;
    }
    Some(result)
}

/// Cyclomatic number: E - V + C.
fn num_rings(mol: &MoleculeCommon) -> usize {
    let n = mol.atoms.len();
    let mut seen = vec![false; n];
    let mut components = 0;

    for i in 0..n {
        if seen[i] {
            continue;
        }
        components += 1;
        let mut q = VecDeque::new();
        seen[i] = true;
        q.push_back(i);
        while let Some(u) = q.pop_front() {
            for &v in &mol.adjacency_list[u] {
                if !seen[v] {
                    seen[v] = true;
                    q.push_back(v);
                }
            }
        }
    }

    (mol.bonds.len() + components).saturating_sub(n)
}

/// Polar surface area contribution of one atom, from Ertl, Rohde & Selzer (2000). Only N and O
/// contribute. Patterns not in the table fall back to an estimate from neighbor and H counts.
fn tpsa_contrib(mol: &MoleculeCommon, i: usize, in_3_ring: bool) -> f64 {
    let atom = &mol.atoms[i];
    let nbrs = mol.heavy_degree(i);
    let h = mol.total_h(i);
    let chg = atom.formal_charge;
    let bc = mol.bond_counts(i);
    let (s, d, t, a) = (bc.single, bc.double, bc.triple, bc.aromatic);

    match atom.element {
        Nitrogen => {
            let table = match (nbrs, h, chg) {
                (1, 0, 0) if t == 1 => Some(23.79),
                (1, 1, 0) if d == 1 => Some(23.85),
                (1, 2, 0) if s == 1 => Some(26.02),
                (1, 2, 1) if d == 1 => Some(25.59),
                (1, 3, 1) if s == 1 => Some(27.64),

                (2, 0, 0) if s == 1 && d == 1 => Some(12.36),
                (2, 0, 0) if t == 1 && d == 1 => Some(13.60),
                (2, 1, 0) if s == 2 => Some(if in_3_ring { 21.94 } else { 12.03 }),
                (2, 0, 1) if t == 1 && s == 1 => Some(4.36),
                (2, 1, 1) if d == 1 && s == 1 => Some(13.97),
                (2, 2, 1) if s == 2 => Some(16.61),
                (2, 0, 0) if a == 2 => Some(12.89),
                (2, 1, 0) if a == 2 => Some(15.79),
                (2, 1, 1) if a == 2 => Some(14.14),

                (3, 0, 0) if s == 3 => Some(if in_3_ring { 3.01 } else { 3.24 }),
                (3, 0, 0) if s == 1 && d == 2 => Some(11.68),
                (3, 0, 1) if s == 2 && d == 1 => Some(3.01),
                (3, 1, 1) if s == 3 => Some(4.44),
                (3, 0, 0) if a == 3 => Some(4.41),
                (3, 0, 0) if s == 1 && a == 2 => Some(4.93),
                (3, 0, 0) if d == 1 && a == 2 => Some(8.39),
                (3, 0, 1) if a == 3 => Some(4.10),
                (3, 0, 1) if s == 1 && a == 2 => Some(3.88),

                (4, 0, 1) if s == 4 => Some(0.),
                _ => None,
            };

            table.unwrap_or_else(|| (30.5 - nbrs as f64 * 8.2 + h as f64 * 1.5).max(0.))
        }
        Oxygen => {
            let table = match (nbrs, h, chg) {
                (1, 0, 0) if d == 1 => Some(17.07),
                (1, 1, 0) if s == 1 => Some(20.23),
                (1, 0, -1) if s == 1 => Some(23.06),
                (2, 0, 0) if s == 2 => Some(if in_3_ring { 12.53 } else { 9.23 }),
                (2, 0, 0) if a == 2 => Some(13.14),
                _ => None,
            };

            table.unwrap_or_else(|| (28.5 - nbrs as f64 * 8.6 + h as f64 * 1.5).max(0.))
        }
        _ => 0.,
    }
}

/// Lipinski donors: N-H (neutral trivalent, or tetravalent cation), neutral O-H and S-H with
/// exactly one H, and aromatic [nH].
fn is_donor(mol: &MoleculeCommon, i: usize) -> bool {
    let atom = &mol.atoms[i];
    let h = mol.total_h(i);
    let chg = atom.formal_charge;

    if atom.aromatic {
        return atom.element == Nitrogen && h == 1 && chg == 0;
    }

    match atom.element {
        Nitrogen => {
            let v = mol.valence(i);
            h > 0 && (v == 3 || (chg == 1 && v == 4))
        }
        Oxygen | Sulfur => h == 1 && chg == 0,
        _ => false,
    }
}

fn is_pons(el: Element) -> bool {
    matches!(el, Phosphorus | Oxygen | Nitrogen | Sulfur)
}

/// Whether atom `x` has a double bond to P, O, N or S, other than to `exclude`. With
/// `acyclic_only`, double bonds that lie in a ring don't count.
fn has_double_to_pons(mol: &MoleculeCommon, x: usize, exclude: usize, acyclic_only: bool) -> bool {
    mol.heavy_neighbors(x).any(|y| {
        y != exclude
            && is_pons(mol.atoms[y].element)
            && mol.bond_type(x, y) == Some(BondType::Double)
            && !(acyclic_only && mol.bond_in_ring(x, y))
    })
}

/// Lipinski acceptors. Hydroxyls count unless attached to an acid center (e.g. a carboxylic
/// or sulfonic acid); amide-like nitrogens don't count.
fn is_acceptor(mol: &MoleculeCommon, i: usize) -> bool {
    let atom = &mol.atoms[i];
    let h = mol.total_h(i);
    let chg = atom.formal_charge;

    if atom.element == Fluorine {
        return true;
    }

    if atom.aromatic {
        return match atom.element {
            Nitrogen => h == 0 && chg == 0,
            Oxygen | Sulfur => chg == 0,
            _ => false,
        };
    }

    match atom.element {
        Oxygen | Sulfur => {
            if chg < 0 {
                return true;
            }
            let v = mol.valence(i);
            if v != 2 {
                return false;
            }
            match h {
                0 => true,
                1 => mol.heavy_neighbors(i).any(|x| {
                    mol.bond_type(i, x) == Some(BondType::Single)
                        && !has_double_to_pons(mol, x, i, false)
                }),
                _ => false,
            }
        }
        Nitrogen => {
            if mol.valence(i) != 3 {
                return false;
            }
            !mol.heavy_neighbors(i).any(|x| {
                mol.bond_type(i, x) == Some(BondType::Single) && has_double_to_pons(mol, x, i, true)
            })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn char_of(smiles: &str) -> MolCharacterization {
        MolCharacterization::new(&MoleculeCommon::from_smiles(smiles).unwrap())
    }

    #[test]
    fn methane() {
        let c = char_of("C");
        assert_relative_eq!(c.mol_weight, 16.043, epsilon = 1e-3);
        assert_relative_eq!(c.tpsa, 0.);
        assert!(c.h_bond_acceptor.is_empty());
        assert!(c.h_bond_donor.is_empty());
    }

    #[test]
    fn alcohol_and_acid() {
        let ethanol = char_of("CCO");
        assert_relative_eq!(ethanol.tpsa, 20.23, epsilon = 1e-6);
        assert_eq!(ethanol.h_bond_donor.len(), 1);
        assert_eq!(ethanol.h_bond_acceptor.len(), 1);

        let acetic = char_of("CC(=O)O");
        assert_relative_eq!(acetic.tpsa, 37.30, epsilon = 1e-6);
        assert_eq!(acetic.h_bond_donor.len(), 1);
        // The acid hydroxyl isn't an acceptor; the carbonyl is.
        assert_eq!(acetic.h_bond_acceptor.len(), 1);
    }

    #[test]
    fn nitrogen_environments() {
        assert_relative_eq!(char_of("CN").tpsa, 26.02, epsilon = 1e-6);

        let acetamide = char_of("CC(N)=O");
        assert_relative_eq!(acetamide.tpsa, 43.09, epsilon = 1e-6);
        assert_eq!(acetamide.h_bond_acceptor.len(), 1);
        assert_eq!(acetamide.h_bond_donor.len(), 1);

        assert_relative_eq!(char_of("CC#N").tpsa, 23.79, epsilon = 1e-6);
        assert_relative_eq!(char_of("CN(C)C").tpsa, 3.24, epsilon = 1e-6);
    }

    #[test]
    fn pyridine_aromatic_and_kekule_agree() {
        let arom = char_of("c1ccncc1");
        let kek = char_of("C1=CC=NC=C1");

        for c in [&arom, &kek] {
            assert_relative_eq!(c.tpsa, 12.89, epsilon = 1e-6);
            assert_relative_eq!(c.mol_weight, 79.102, epsilon = 1e-3);
            assert_eq!(c.h_bond_acceptor.len(), 1);
            assert!(c.h_bond_donor.is_empty());
            assert_eq!(c.num_aromatic_atoms, 6);
        }
    }

    #[test]
    fn pyrrole_nh() {
        let c = char_of("c1cc[nH]c1");
        assert_relative_eq!(c.tpsa, 15.79, epsilon = 1e-6);
        assert_eq!(c.h_bond_donor.len(), 1);
        assert!(c.h_bond_acceptor.is_empty());
    }

    #[test]
    fn descriptor_vec_absent_on_failure() {
        assert_eq!(descriptor_vec("definitely(not"), [None; N_DESCRIPTORS]);
        assert_eq!(descriptor_vec(""), [None; N_DESCRIPTORS]);
        assert!(!is_complete(&descriptor_vec("C1CC")));
        assert!(features(&descriptor_vec("C1CC")).is_none());
    }

    #[test]
    fn descriptor_vec_absent_on_out_of_range_input() {
        let many_plus = format!("[C{}]", "+".repeat(130));
        for s in ["[H][CH255]", many_plus.as_str(), "CN(C)(C)C"] {
            assert_eq!(descriptor_vec(s), [None; N_DESCRIPTORS], "{s}");
        }
    }

    #[test]
    fn descriptor_vec_methane() {
        let v = descriptor_vec("C");
        assert!(is_complete(&v));
        let f = features(&v).unwrap();
        assert!(f.iter().all(|x| x.is_finite() && *x >= 0.));
        assert_relative_eq!(f[0], 16.043, epsilon = 1e-3);
    }
}
