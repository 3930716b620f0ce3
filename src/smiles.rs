//! Build molecules from SMILES text: graph parsing, implicit hydrogens, and aromaticity
//! perception for Kekulé input.

use std::{collections::HashMap, io, iter::Peekable, str::Chars};

use crate::{
    element::Element,
    molecules::{Atom, Bond, BondType, common::MoleculeCommon},
};

/// Bracket hydrogen counts are a single digit.
const MAX_BRACKET_H: u32 = 9;
const MAX_CHARGE: u32 = 15;

/// Fields read from a bracket atom, e.g. `[NH3+]` or `[13CH2:4]`.
#[derive(Debug)]
struct BracketAtom {
    element: Element,
    aromatic: bool,
    h_count: u8,
    charge: i8,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl MoleculeCommon {
    pub fn from_smiles(data: &str) -> io::Result<Self> {
        let data = data.trim();
        if data.is_empty() {
            return Err(invalid("empty SMILES"));
        }

        let mut atoms: Vec<Atom> = Vec::new();
        let mut bonds: Vec<Bond> = Vec::new();

        let mut current: Option<usize> = None;
        // Whether the current atom was written as aromatic (lowercase in SMILES).
        // Two consecutive aromatic atoms share an implicit aromatic bond; a mixed or
        // non-aromatic pair gets an implicit single bond.
        let mut current_aromatic: bool = false;
        let mut last_bond: Option<BondType> = None;
        // Stack saves (current atom index, aromaticity) at each branch open.
        let mut branch_stack: Vec<(Option<usize>, bool)> = Vec::new();
        // ring_idx -> (atom_index, explicit bond type at open (None = implicit), aromatic at open)
        let mut ring_map: HashMap<u32, (usize, Option<BondType>, bool)> = HashMap::new();

        let mut chars = data.chars().peekable();
        let mut next_serial: u32 = 1;

        while let Some(&ch) = chars.peek() {
            match ch {
                '-' => {
                    last_bond = Some(BondType::Single);
                    chars.next();
                }
                '=' => {
                    last_bond = Some(BondType::Double);
                    chars.next();
                }
                '#' => {
                    last_bond = Some(BondType::Triple);
                    chars.next();
                }
                ':' => {
                    last_bond = Some(BondType::Aromatic);
                    chars.next();
                }
                // Stereo bonds; single for connectivity purposes.
                '/' | '\\' => {
                    last_bond = Some(BondType::Single);
                    chars.next();
                }

                '(' => {
                    if current.is_none() {
                        return Err(invalid("branch opened before any atom"));
                    }
                    branch_stack.push((current, current_aromatic));
                    chars.next();
                }
                ')' => {
                    let (prev, prev_ar) = branch_stack
                        .pop()
                        .ok_or_else(|| invalid("unmatched ')' in SMILES"))?;
                    current = prev;
                    current_aromatic = prev_ar;
                    last_bond = None;
                    chars.next();
                }

                // Disconnected component separator
                '.' => {
                    current = None;
                    current_aromatic = false;
                    last_bond = None;
                    chars.next();
                }

                // Two-digit ring closure: %NN
                '%' => {
                    chars.next();
                    let d1 = consume_digit(&mut chars)?;
                    let d2 = consume_digit(&mut chars)?;
                    handle_ring(
                        d1 * 10 + d2,
                        current,
                        current_aromatic,
                        last_bond.take(),
                        &mut ring_map,
                        &mut bonds,
                    )?;
                }

                '0'..='9' => {
                    let d = ch as u32 - '0' as u32;
                    chars.next();
                    handle_ring(
                        d,
                        current,
                        current_aromatic,
                        last_bond.take(),
                        &mut ring_map,
                        &mut bonds,
                    )?;
                }

                '[' => {
                    let br = parse_bracket_atom(&mut chars)?;
                    let bt = last_bond
                        .take()
                        .unwrap_or_else(|| implicit_bt(current_aromatic, br.aromatic));
                    let idx = push_atom(
                        Atom {
                            serial_number: next_serial,
                            element: br.element,
                            aromatic: br.aromatic,
                            formal_charge: br.charge,
                            implicit_h: br.h_count,
                            bracket: true,
                        },
                        current,
                        bt,
                        &mut atoms,
                        &mut bonds,
                    );
                    next_serial += 1;
                    current = Some(idx);
                    current_aromatic = br.aromatic;
                }

                // Organic-subset atom (bare symbol, no brackets)
                _ => match parse_organic_atom(&mut chars) {
                    Some((element, aromatic)) => {
                        let bt = last_bond
                            .take()
                            .unwrap_or_else(|| implicit_bt(current_aromatic, aromatic));
                        let idx = push_atom(
                            Atom {
                                serial_number: next_serial,
                                element,
                                aromatic,
                                ..Default::default()
                            },
                            current,
                            bt,
                            &mut atoms,
                            &mut bonds,
                        );
                        next_serial += 1;
                        current = Some(idx);
                        current_aromatic = aromatic;
                    }
                    None => {
                        return Err(invalid(format!("unrecognized SMILES character: '{ch}'")));
                    }
                },
            }
        }

        if !branch_stack.is_empty() {
            return Err(invalid("unclosed branch in SMILES"));
        }
        if !ring_map.is_empty() {
            return Err(invalid("unclosed ring closure index in SMILES"));
        }
        if last_bond.is_some() {
            return Err(invalid("SMILES ends with a dangling bond"));
        }

        let mut result = Self::new(data.to_string(), atoms, bonds);

        result.assign_implicit_h()?;
        result.perceive_aromaticity();

        Ok(result)
    }

    /// Fill in hydrogen counts for organic-subset atoms from their default valences. An atom
    /// whose bonds exceed every allowed valence fails sanitization.
    fn assign_implicit_h(&mut self) -> io::Result<()> {
        for i in 0..self.atoms.len() {
            let atom = &self.atoms[i];

            let mut orders = 0u32;
            let mut n_arom = 0u32;
            for &j in &self.adjacency_list[i] {
                match self.bond_type(i, j) {
                    Some(BondType::Aromatic) => n_arom += 1,
                    Some(bt) => orders += u32::from(bt.order()),
                    None => (),
                }
            }

            if atom.aromatic && n_arom == 0 {
                return Err(invalid(format!(
                    "non-ring atom {} marked aromatic",
                    atom.serial_number
                )));
            }

            if atom.bracket {
                continue;
            }

            let valences = atom.element.valences();
            let h = if atom.aromatic {
                // One electron per aromatic bond, plus one shared into the pi system.
                let used = orders + n_arom + 1;
                valences
                    .first()
                    .map(|&v| (u32::from(v)).saturating_sub(used))
                    .unwrap_or(0)
            } else {
                // Explicit ':' between aliphatic atoms counts as single.
                let used = orders + n_arom;
                match valences.iter().find(|&&v| u32::from(v) >= used) {
                    Some(&v) => u32::from(v) - used,
                    None => {
                        return Err(invalid(format!(
                            "explicit valence {used} for {} atom {} exceeds the maximum",
                            atom.element.to_letter(),
                            atom.serial_number
                        )));
                    }
                }
            };

            // Bounded by the largest default valence.
            self.atoms[i].implicit_h = h as u8;
        }

        Ok(())
    }

    /// Mark Kekulé rings as aromatic. Six-membered C/N rings where every atom contributes to
    /// the pi system qualify; five-membered rings qualify when exactly one atom lacks pi
    /// and that atom is a lone-pair donor (N, O or S). Runs until no ring changes, so fused
    /// systems resolve through already-aromatic neighbors.
    fn perceive_aromaticity(&mut self) {
        let rings_6 = self.rings_of_len(6);
        let rings_5 = self.rings_of_len(5);

        if rings_6.is_empty() && rings_5.is_empty() {
            return;
        }

        let mut done = vec![false; rings_6.len() + rings_5.len()];

        loop {
            let mut changed = false;

            for (ri, ring) in rings_6.iter().chain(rings_5.iter()).enumerate() {
                if done[ri] {
                    continue;
                }

                let pi: Vec<bool> = ring.iter().map(|&a| self.has_pi(a)).collect();

                let aromatic = if ring.len() == 6 {
                    ring.iter().all(|&a| {
                        matches!(self.atoms[a].element, Element::Carbon | Element::Nitrogen)
                    }) && pi.iter().all(|p| *p)
                } else {
                    let lacking: Vec<usize> = ring
                        .iter()
                        .zip(&pi)
                        .filter(|(_, p)| !**p)
                        .map(|(&a, _)| a)
                        .collect();

                    lacking.len() == 1
                        && matches!(
                            self.atoms[lacking[0]].element,
                            Element::Nitrogen | Element::Oxygen | Element::Sulfur
                        )
                };

                if !aromatic {
                    continue;
                }

                let already = ring.iter().all(|&a| self.atoms[a].aromatic)
                    && ring_edges(ring).all(|(a, b)| {
                        self.bond_type(a, b) == Some(BondType::Aromatic)
                    });

                done[ri] = true;
                if already {
                    continue;
                }

                for &a in ring {
                    self.atoms[a].aromatic = true;
                }
                for (a, b) in ring_edges(ring) {
                    for bond in &mut self.bonds {
                        if (bond.atom_0 == a && bond.atom_1 == b)
                            || (bond.atom_0 == b && bond.atom_1 == a)
                        {
                            bond.bond_type = BondType::Aromatic;
                        }
                    }
                }
                changed = true;
            }

            if !changed {
                break;
            }
        }
    }

    /// An atom contributes to a ring's pi system if it's already aromatic, or carries a double
    /// bond that itself lies in a ring.
    fn has_pi(&self, i: usize) -> bool {
        if self.atoms[i].aromatic {
            return true;
        }

        self.adjacency_list[i].iter().any(|&j| {
            self.bond_type(i, j) == Some(BondType::Double) && self.bond_in_ring(i, j)
        })
    }
}

fn ring_edges(ring: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let n = ring.len();
    (0..n).map(move |k| (ring[k], ring[(k + 1) % n]))
}

/// Determine the implicit bond type between two adjacent atoms. If both atoms are aromatic
/// (written lowercase) the implicit bond is aromatic; otherwise it is single.
#[inline]
fn implicit_bt(prev_aromatic: bool, new_aromatic: bool) -> BondType {
    if prev_aromatic && new_aromatic {
        BondType::Aromatic
    } else {
        BondType::Single
    }
}

/// Add a new atom, bond it to `prev` if present, and return its index.
fn push_atom(
    atom: Atom,
    prev: Option<usize>,
    bond_type: BondType,
    atoms: &mut Vec<Atom>,
    bonds: &mut Vec<Bond>,
) -> usize {
    let idx = atoms.len();
    atoms.push(atom);

    if let Some(p) = prev {
        add_bond(p, idx, bond_type, bonds);
    }

    idx
}

/// Open or close a ring-closure bond.
///
/// `explicit_bt` is `Some` only if a bond character appeared immediately before the digit.
/// An implicit ring closure is aromatic if both ends are aromatic, and single otherwise.
fn handle_ring(
    ring_idx: u32,
    current: Option<usize>,
    current_aromatic: bool,
    explicit_bt: Option<BondType>,
    ring_map: &mut HashMap<u32, (usize, Option<BondType>, bool)>,
    bonds: &mut Vec<Bond>,
) -> io::Result<()> {
    let cur = current.ok_or_else(|| invalid("ring closure digit without a current atom"))?;

    match ring_map.remove(&ring_idx) {
        Some((other, bt_open, open_aromatic)) => {
            if other == cur {
                return Err(invalid("ring closure bonds an atom to itself"));
            }
            if bonds.iter().any(|b| {
                (b.atom_0 == cur && b.atom_1 == other) || (b.atom_0 == other && b.atom_1 == cur)
            }) {
                return Err(invalid("ring closure duplicates an existing bond"));
            }

            let bond_type = explicit_bt
                .or(bt_open)
                .unwrap_or_else(|| implicit_bt(open_aromatic, current_aromatic));
            add_bond(cur, other, bond_type, bonds);
        }
        None => {
            ring_map.insert(ring_idx, (cur, explicit_bt, current_aromatic));
        }
    }

    Ok(())
}

/// Parse a bracket atom `[isotope? symbol chirality? Hcount? charge? :map?]`.
/// The leading `[` must still be in the iterator. Isotope, chirality and atom-map are
/// consumed and discarded.
fn parse_bracket_atom(chars: &mut Peekable<Chars<'_>>) -> io::Result<BracketAtom> {
    chars.next(); // '['

    // Isotope
    while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        chars.next();
    }

    // Element symbol: first letter (case determines aromaticity)
    let first = chars
        .next()
        .ok_or_else(|| invalid("unexpected end of input inside bracket atom"))?;
    if !first.is_ascii_alphabetic() {
        return Err(invalid(format!("expected element symbol, found '{first}'")));
    }
    let aromatic = first.is_ascii_lowercase();
    let mut sym = String::from(first.to_ascii_uppercase());

    // Second letter, e.g. 'l' in Cl. Aromatic symbols are a single letter, except `se` and `as`.
    if let Some(&c) = chars.peek() {
        let two_letter = c.is_ascii_lowercase()
            && (!aromatic || matches!((first, c), ('s', 'e') | ('a', 's')));
        if two_letter && Element::from_letter(&format!("{sym}{c}")).is_ok() {
            sym.push(c);
            chars.next();
        }
    }

    while chars.peek().copied() == Some('@') {
        chars.next();
    }

    let mut h_count = 0u8;
    if chars.peek().copied() == Some('H') {
        chars.next();
        h_count = match read_number(chars) {
            Some(n) if n <= MAX_BRACKET_H => n as u8,
            Some(n) => return Err(invalid(format!("hydrogen count {n} out of range"))),
            None => 1,
        };
    }

    // Charge: +, -, ++, --, +n, -n
    let mut charge = 0i8;
    if let Some(&sign_ch) = chars.peek().filter(|c| **c == '+' || **c == '-') {
        chars.next();
        let sign: i8 = if sign_ch == '+' { 1 } else { -1 };
        let mut magnitude = 1u32;

        if let Some(n) = read_number(chars) {
            magnitude = n;
        } else {
            while chars.peek().copied() == Some(sign_ch) {
                chars.next();
                magnitude = magnitude.saturating_add(1);
            }
        }
        if magnitude > MAX_CHARGE {
            return Err(invalid(format!("charge magnitude {magnitude} out of range")));
        }
        charge = sign * magnitude as i8;
    }

    // Atom map
    if chars.peek().copied() == Some(':') {
        chars.next();
        if read_number(chars).is_none() {
            return Err(invalid("expected atom-map number after ':'"));
        }
    }

    match chars.next() {
        Some(']') => {}
        other => {
            return Err(invalid(format!(
                "expected ']' to close bracket atom, found {other:?}"
            )));
        }
    }

    let element = Element::from_letter(&sym)?;

    Ok(BracketAtom {
        element,
        aromatic,
        h_count,
        charge,
    })
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<u32> {
    let mut result: Option<u32> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        result = Some(result.unwrap_or(0).saturating_mul(10).saturating_add(d));
    }
    result
}

/// Parse an organic-subset atom (no brackets). Advances the iterator past the token.
/// Returns `None` for unrecognized characters; the caller decides whether to error.
fn parse_organic_atom(chars: &mut Peekable<Chars<'_>>) -> Option<(Element, bool)> {
    let ch = chars.peek().copied()?;

    let result = match ch {
        'C' | 'B' => {
            chars.next();
            let second = if ch == 'C' { 'l' } else { 'r' };
            if chars.peek().copied() == Some(second) {
                chars.next();
                let el = if ch == 'C' { Element::Chlorine } else { Element::Bromine };
                return Some((el, false));
            }
            let el = if ch == 'C' { Element::Carbon } else { Element::Boron };
            return Some((el, false));
        }
        'N' => (Element::Nitrogen, false),
        'O' => (Element::Oxygen, false),
        'S' => (Element::Sulfur, false),
        'P' => (Element::Phosphorus, false),
        'F' => (Element::Fluorine, false),
        'I' => (Element::Iodine, false),
        // Aromatic atoms (lowercase organic subset)
        'b' => (Element::Boron, true),
        'c' => (Element::Carbon, true),
        'n' => (Element::Nitrogen, true),
        'o' => (Element::Oxygen, true),
        's' => (Element::Sulfur, true),
        'p' => (Element::Phosphorus, true),
        _ => return None,
    };

    chars.next();
    Some(result)
}

/// Consume a single ASCII digit from the iterator, returning its numeric value.
fn consume_digit(chars: &mut Peekable<Chars<'_>>) -> io::Result<u32> {
    match chars.next() {
        Some(c) if c.is_ascii_digit() => Ok(c as u32 - '0' as u32),
        Some(c) => Err(invalid(format!("expected digit after '%', found '{c}'"))),
        None => Err(invalid("expected digit after '%', found end of input")),
    }
}

/// Add a bond between atoms `a` and `b`. The bond is stored with the lower index as atom_0.
fn add_bond(a: usize, b: usize, bond_type: BondType, bonds: &mut Vec<Bond>) {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    bonds.push(Bond {
        bond_type,
        atom_0: lo,
        atom_1: hi,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_branches_and_rings() {
        let mol = MoleculeCommon::from_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.atoms.len(), 4);
        assert_eq!(mol.bonds.len(), 3);
        assert_eq!(mol.bond_type(1, 2), Some(BondType::Double));
        assert_eq!(mol.atoms[0].implicit_h, 3);
        assert_eq!(mol.atoms[3].implicit_h, 1);

        let ring = MoleculeCommon::from_smiles("C1CC1").unwrap();
        assert_eq!(ring.bonds.len(), 3);
        assert_eq!(ring.rings_of_len(3).len(), 1);
    }

    #[test]
    fn bracket_atoms() {
        let mol = MoleculeCommon::from_smiles("C[NH3+]").unwrap();
        assert_eq!(mol.atoms[1].formal_charge, 1);
        assert_eq!(mol.atoms[1].implicit_h, 3);

        let mol = MoleculeCommon::from_smiles("CC(=O)[O-]").unwrap();
        assert_eq!(mol.atoms[3].formal_charge, -1);
        assert_eq!(mol.atoms[3].implicit_h, 0);

        let mol = MoleculeCommon::from_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.atoms.len(), 2);
        assert!(mol.bonds.is_empty());
    }

    #[test]
    fn kekule_benzene_is_aromatic() {
        let mol = MoleculeCommon::from_smiles("C1=CC=CC=C1").unwrap();
        assert!(mol.atoms.iter().all(|a| a.aromatic));
        assert!(mol.bonds.iter().all(|b| b.bond_type == BondType::Aromatic));
        assert!(mol.atoms.iter().all(|a| a.implicit_h == 1));
    }

    #[test]
    fn furan_and_cyclopentadiene() {
        let furan = MoleculeCommon::from_smiles("C1=CC=CO1").unwrap();
        assert!(furan.atoms.iter().all(|a| a.aromatic));

        let cp = MoleculeCommon::from_smiles("C1=CC=CC1").unwrap();
        assert!(cp.atoms.iter().all(|a| !a.aromatic));
    }

    #[test]
    fn rejects_malformed() {
        for s in [
            "",
            "   ",
            "C1CC",
            "CC)",
            "C(C",
            "C[Xx]",
            "c",
            "C(C)(C)(C)(C)C",
            "CC=",
            "not a smiles",
            "CN(C)(C)C",
        ] {
            assert!(MoleculeCommon::from_smiles(s).is_err(), "{s:?} should fail");
        }
    }

    #[test]
    fn out_of_range_bracket_fields() {
        let many_plus = format!("[C{}]", "+".repeat(130));
        for s in ["[H][CH255]", "[CH10]", many_plus.as_str(), "[N+16]", "[O-200]"] {
            assert!(MoleculeCommon::from_smiles(s).is_err(), "{s:?} should fail");
        }

        let mol = MoleculeCommon::from_smiles("[Fe+++]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 3);
        let mol = MoleculeCommon::from_smiles("[C-15]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, -15);
    }

    #[test]
    fn many_explicit_hydrogens_saturate() {
        let smiles = format!("[C]{}", "([H])".repeat(300));
        let mol = MoleculeCommon::from_smiles(&smiles).unwrap();
        assert_eq!(mol.total_h(0), u8::MAX);
        assert_eq!(mol.bond_counts(0).single, 0);
    }
}
