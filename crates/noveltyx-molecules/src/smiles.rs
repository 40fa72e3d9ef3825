//! SMILES parsing into a molecular graph.
//!
//! Supported: the organic subset (B C N O P S F Cl Br I and aromatic
//! b c n o p s), bracket atoms with isotope / chirality / H count / charge /
//! class, branches, ring closures (`1`..`9`, `%nn`), explicit bonds
//! (`- = # $ : / \`) and disconnected components (`.`).
//! Stereo marks are accepted and dropped.
//!
//! Kekulé and aromatic spellings of one molecule parse to the same graph:
//! rings passing the Hückel 4n+2 count are rewritten with aromatic atoms
//! and bonds after hydrogens are assigned.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES")]
    Empty,
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unknown element '{symbol}' at {pos}")]
    UnknownElement { symbol: String, pos: usize },
    #[error("unterminated bracket atom starting at {0}")]
    UnclosedBracket(usize),
    #[error("unbalanced parenthesis at {0}")]
    UnbalancedBranch(usize),
    #[error("ring bond {0} never closed")]
    UnclosedRing(u32),
    #[error("invalid ring closure {ring} at {pos}")]
    InvalidRingClosure { ring: u32, pos: usize },
    #[error("bond at {0} has no atom to attach to")]
    DanglingBond(usize),
    #[error("numeric value out of range at {0}")]
    ValueOutOfRange(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Contribution to the valence of each endpoint.
    fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// 0 for the `*` wildcard.
    pub atomic_number: u8,
    pub aromatic: bool,
    pub charge: i8,
    /// 0 when unspecified.
    pub isotope: u16,
    /// Total attached hydrogens, implicit or from a bracket H count.
    pub hydrogens: u8,
    bracket_h: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub from: usize,
    pub to: usize,
    pub order: BondOrder,
}

#[derive(Debug, Clone, Default)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Per atom: (neighbour atom, bond index).
    adjacency: Vec<Vec<(usize, usize)>>,
}

const ELEMENTS: &[&str] = &[
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",
    "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce",
    "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir",
    "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn",
];

/// Rings larger than this are never considered for aromaticity.
const MAX_RING_SIZE: usize = 24;

fn atomic_number(symbol: &str) -> Option<u8> {
    ELEMENTS.iter().position(|e| *e == symbol).map(|i| i as u8 + 1)
}

/// Default valences of the organic subset, lowest first.
fn default_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        5 => &[3],
        6 => &[4],
        7 | 15 => &[3, 5],
        8 => &[2],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

impl Molecule {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// (neighbour, bond) pairs of one atom.
    pub fn neighbours(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    fn bond_between(&self, a: usize, b: usize) -> bool {
        self.adjacency[a].iter().any(|&(n, _)| n == b)
    }

    fn add_bond(&mut self, from: usize, to: usize, order: Option<BondOrder>) {
        let order = order.unwrap_or(if self.atoms[from].aromatic && self.atoms[to].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        });
        let idx = self.bonds.len();
        self.bonds.push(Bond { from, to, order });
        self.adjacency[from].push((to, idx));
        self.adjacency[to].push((from, idx));
    }

    fn assign_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            let bond_sum: u8 = self.adjacency[i]
                .iter()
                .map(|&(_, b)| self.bonds[b].order.valence())
                .fold(0u8, |acc, v| acc.saturating_add(v));
            let atom = &mut self.atoms[i];
            atom.hydrogens = match atom.bracket_h {
                Some(h) => h,
                None => implicit_hydrogens(atom.atomic_number, atom.aromatic, bond_sum),
            };
        }
    }

    /// Ring membership per bond: a bond is in a ring unless it is a bridge.
    /// Iterative Tarjan bridge search, so long chains cannot exhaust the stack.
    pub fn ring_bonds(&self) -> Vec<bool> {
        let n = self.atoms.len();
        let mut disc = vec![usize::MAX; n];
        let mut low = vec![0; n];
        let mut in_ring = vec![true; self.bonds.len()];
        let mut timer = 0;
        // (atom, bond it was reached through, next adjacency slot)
        let mut stack: Vec<(usize, Option<usize>, usize)> = Vec::new();

        for start in 0..n {
            if disc[start] != usize::MAX {
                continue;
            }
            disc[start] = timer;
            low[start] = timer;
            timer += 1;
            stack.push((start, None, 0));

            while let Some(frame) = stack.last_mut() {
                let (u, parent_bond, next) = *frame;
                match self.adjacency[u].get(next) {
                    Some(&(v, b)) => {
                        frame.2 += 1;
                        if Some(b) == parent_bond {
                            continue;
                        }
                        if disc[v] == usize::MAX {
                            disc[v] = timer;
                            low[v] = timer;
                            timer += 1;
                            stack.push((v, Some(b), 0));
                        } else {
                            low[u] = low[u].min(disc[v]);
                        }
                    }
                    None => {
                        stack.pop();
                        if let (Some(b), Some(&(p, _, _))) = (parent_bond, stack.last()) {
                            low[p] = low[p].min(low[u]);
                            if low[u] > disc[p] {
                                in_ring[b] = false;
                            }
                        }
                    }
                }
            }
        }
        in_ring
    }

    pub fn ring_atoms(&self) -> Vec<bool> {
        let ring_bonds = self.ring_bonds();
        (0..self.atoms.len())
            .map(|a| self.adjacency[a].iter().any(|&(_, b)| ring_bonds[b]))
            .collect()
    }

    /// Rewrites Kekulé rings that satisfy the 4n+2 rule as aromatic, so
    /// `C1=CC=CC=C1` and `c1ccccc1` end up with the same atoms and bonds.
    /// Single rings are tested first, then pairs of rings fused on one bond.
    /// Aromatic bonds left outside any ring become single.
    fn perceive_aromaticity(&mut self) {
        let ring_bonds = self.ring_bonds();
        let rings = self.smallest_rings(&ring_bonds);
        let electrons: Vec<Option<u32>> =
            (0..self.atoms.len()).map(|a| self.pi_electrons(a, &ring_bonds)).collect();
        let huckel = |atoms: &[usize]| {
            atoms
                .iter()
                .map(|&a| electrons[a])
                .sum::<Option<u32>>()
                .is_some_and(|total| total % 4 == 2)
        };

        let mut aromatic_rings: Vec<Vec<usize>> = rings.iter().filter(|r| huckel(r.as_slice())).cloned().collect();
        for (i, a) in rings.iter().enumerate() {
            for b in &rings[i + 1..] {
                let shared = a.iter().filter(|&&x| b.binary_search(&x).is_ok()).count();
                if shared != 2 {
                    continue;
                }
                let mut fused: Vec<usize> = a.iter().chain(b.iter()).copied().collect();
                fused.sort_unstable();
                fused.dedup();
                if huckel(fused.as_slice()) {
                    aromatic_rings.push(fused);
                }
            }
        }

        for ring in &aromatic_rings {
            for &a in ring {
                self.atoms[a].aromatic = true;
            }
            for (b, bond) in self.bonds.iter_mut().enumerate() {
                if ring_bonds[b] && ring.binary_search(&bond.from).is_ok() && ring.binary_search(&bond.to).is_ok() {
                    bond.order = BondOrder::Aromatic;
                }
            }
        }

        for (b, bond) in self.bonds.iter_mut().enumerate() {
            if bond.order == BondOrder::Aromatic && !ring_bonds[b] {
                bond.order = BondOrder::Single;
            }
        }
    }

    /// Shortest cycle through each ring bond, as sorted atom lists, deduplicated.
    fn smallest_rings(&self, ring_bonds: &[bool]) -> Vec<Vec<usize>> {
        let mut seen = HashSet::new();
        let mut rings = Vec::new();
        for (b, bond) in self.bonds.iter().enumerate() {
            if !ring_bonds[b] {
                continue;
            }
            let Some(mut ring) = self.shortest_path(bond.from, bond.to, b, ring_bonds) else {
                continue;
            };
            ring.sort_unstable();
            if seen.insert(ring.clone()) {
                rings.push(ring);
            }
        }
        rings
    }

    /// Breadth-first path between the ends of `skip`, over ring bonds only.
    fn shortest_path(&self, from: usize, to: usize, skip: usize, ring_bonds: &[bool]) -> Option<Vec<usize>> {
        let mut parent: HashMap<usize, usize> = HashMap::from([(from, from)]);
        let mut queue = VecDeque::from([(from, 1usize)]);
        while let Some((u, depth)) = queue.pop_front() {
            if u == to {
                let mut path = vec![to];
                let mut at = to;
                while at != from {
                    at = parent[&at];
                    path.push(at);
                }
                return Some(path);
            }
            if depth >= MAX_RING_SIZE {
                continue;
            }
            for &(v, b) in &self.adjacency[u] {
                if b == skip || !ring_bonds[b] || parent.contains_key(&v) {
                    continue;
                }
                parent.insert(v, u);
                queue.push_back((v, depth + 1));
            }
        }
        None
    }

    /// Electrons an atom donates to a ring's pi system, or `None` when it
    /// cannot take part (sp3 centres, triple bonds, exocyclic C=C).
    fn pi_electrons(&self, atom: usize, ring_bonds: &[bool]) -> Option<u32> {
        let a = &self.atoms[atom];
        if !matches!(a.atomic_number, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34) {
            return None;
        }

        let mut double = None;
        for &(n, b) in &self.adjacency[atom] {
            match self.bonds[b].order {
                BondOrder::Double if double.is_none() => double = Some((n, b)),
                BondOrder::Double | BondOrder::Triple | BondOrder::Quadruple => return None,
                BondOrder::Single | BondOrder::Aromatic => {}
            }
        }
        if let Some((partner, b)) = double {
            if ring_bonds[b] {
                return Some(1);
            }
            // exocyclic C=O, C=N, C=S
            return (a.atomic_number == 6 && matches!(self.atoms[partner].atomic_number, 7 | 8 | 16)).then_some(0);
        }

        let connections = self.adjacency[atom].len() + usize::from(a.hydrogens);
        match (a.atomic_number, a.charge) {
            (6, 0) if a.aromatic => Some(1),
            (6, -1) => Some(2),
            (6, 1) => Some(0),
            (7 | 15 | 33, 0) if connections == 3 => Some(2),
            (7 | 15 | 33, 0) if a.aromatic && connections == 2 => Some(1),
            (7, 1) if a.aromatic && connections == 3 => Some(1),
            (8 | 16 | 34, 0) if connections == 2 => Some(2),
            (8 | 16 | 34, 1) if a.aromatic && connections == 2 => Some(1),
            (5, 0) if connections == 3 => Some(0),
            _ => None,
        }
    }
}

fn implicit_hydrogens(atomic_number: u8, aromatic: bool, bond_sum: u8) -> u8 {
    let valences = default_valences(atomic_number);
    if aromatic {
        // One valence unit goes to the delocalised system.
        let used = bond_sum.saturating_add(1);
        return valences.first().map_or(0, |v| v.saturating_sub(used));
    }
    valences
        .iter()
        .find(|&&v| v >= bond_sum)
        .map_or(0, |v| v - bond_sum)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    mol: Molecule,
    prev: Option<usize>,
    pending: Option<(BondOrder, usize)>,
    branches: Vec<usize>,
    rings: Vec<(u32, usize, Option<BondOrder>)>,
    after_open: bool,
}

pub fn parse(smiles: &str) -> Result<Molecule, SmilesError> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(SmilesError::Empty);
    }
    let mut parser = Parser {
        src: smiles.as_bytes(),
        pos: 0,
        mol: Molecule::default(),
        prev: None,
        pending: None,
        branches: Vec::new(),
        rings: Vec::new(),
        after_open: false,
    };
    parser.run()?;
    let mut mol = parser.mol;
    mol.assign_hydrogens();
    mol.perceive_aromaticity();
    Ok(mol)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn run(&mut self) -> Result<(), SmilesError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.pending.is_some() || self.prev.is_none() {
                        return Err(SmilesError::DanglingBond(start));
                    }
                    let order = match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending = Some((order, start));
                    self.pos += 1;
                }
                b'(' => {
                    let Some(prev) = self.prev else {
                        return Err(SmilesError::UnbalancedBranch(start));
                    };
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    self.branches.push(prev);
                    self.pos += 1;
                    self.after_open = true;
                    continue;
                }
                b')' => {
                    if self.after_open {
                        return Err(SmilesError::UnbalancedBranch(start));
                    }
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    let top = self.branches.pop().ok_or(SmilesError::UnbalancedBranch(start))?;
                    self.prev = Some(top);
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond(at));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                b'0'..=b'9' => {
                    self.pos += 1;
                    self.ring_closure(u32::from(c - b'0'), start)?;
                }
                b'%' => {
                    let digits = self.src.get(start + 1..start + 3).filter(|d| d.iter().all(u8::is_ascii_digit));
                    let Some(digits) = digits else {
                        return Err(SmilesError::UnexpectedChar { ch: '%', pos: start });
                    };
                    let ring = u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0');
                    self.pos += 3;
                    self.ring_closure(ring, start)?;
                }
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom);
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom);
                }
            }
            self.after_open = false;
        }

        if let Some((_, at)) = self.pending {
            return Err(SmilesError::DanglingBond(at));
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnbalancedBranch(self.src.len()));
        }
        if let Some(&(ring, _, _)) = self.rings.first() {
            return Err(SmilesError::UnclosedRing(ring));
        }
        Ok(())
    }

    fn attach(&mut self, atom: Atom) {
        let idx = self.mol.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = self.pending.take().map(|(o, _)| o);
            self.mol.add_bond(prev, idx, order);
        }
        self.prev = Some(idx);
    }

    fn ring_closure(&mut self, ring: u32, pos: usize) -> Result<(), SmilesError> {
        let current = self.prev.ok_or(SmilesError::InvalidRingClosure { ring, pos })?;
        let order = self.pending.take().map(|(o, _)| o);

        match self.rings.iter().position(|&(r, _, _)| r == ring) {
            Some(i) => {
                let (_, open_atom, open_order) = self.rings.remove(i);
                let order = match (open_order, order) {
                    (Some(a), Some(b)) if a != b => return Err(SmilesError::InvalidRingClosure { ring, pos }),
                    (a, b) => a.or(b),
                };
                if open_atom == current || self.mol.bond_between(open_atom, current) {
                    return Err(SmilesError::InvalidRingClosure { ring, pos });
                }
                self.mol.add_bond(open_atom, current, order);
            }
            None => self.rings.push((ring, current, order)),
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let start = self.pos;
        let c = self.src[start];
        let next = self.src.get(start + 1).copied();
        let (symbol, aromatic, width) = match (c, next) {
            (b'C', Some(b'l')) => ("Cl", false, 2),
            (b'B', Some(b'r')) => ("Br", false, 2),
            (b'B', _) => ("B", false, 1),
            (b'C', _) => ("C", false, 1),
            (b'N', _) => ("N", false, 1),
            (b'O', _) => ("O", false, 1),
            (b'P', _) => ("P", false, 1),
            (b'S', _) => ("S", false, 1),
            (b'F', _) => ("F", false, 1),
            (b'I', _) => ("I", false, 1),
            (b'b', _) => ("B", true, 1),
            (b'c', _) => ("C", true, 1),
            (b'n', _) => ("N", true, 1),
            (b'o', _) => ("O", true, 1),
            (b'p', _) => ("P", true, 1),
            (b's', _) => ("S", true, 1),
            (b'*', _) => ("*", false, 1),
            _ => return Err(SmilesError::UnexpectedChar { ch: char::from(c), pos: start }),
        };
        let atomic_number = if symbol == "*" {
            0
        } else {
            atomic_number(symbol).ok_or_else(|| SmilesError::UnknownElement { symbol: symbol.to_string(), pos: start })?
        };
        self.pos += width;
        Ok(Atom { atomic_number, aromatic, charge: 0, isotope: 0, hydrogens: 0, bracket_h: None })
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let src = self.src;
        let open = self.pos;
        let close = src[open..]
            .iter()
            .position(|&b| b == b']')
            .map(|i| open + i)
            .ok_or(SmilesError::UnclosedBracket(open))?;
        let body = &src[open + 1..close];
        let mut i = 0;

        let digits_at = open + 1;
        let isotope: u16 = take_number(body, &mut i, digits_at)?.unwrap_or(0);

        let sym_pos = open + 1 + i;
        let (atomic_number, aromatic) = bracket_symbol(body, &mut i).ok_or_else(|| SmilesError::UnknownElement {
            symbol: String::from_utf8_lossy(&body[i..(i + 2).min(body.len())]).into_owned(),
            pos: sym_pos,
        })?;

        // Chirality: @, @@, @TH1, @SP2, @OH15 ...
        let chiral = body.get(i) == Some(&b'@');
        while body.get(i) == Some(&b'@') {
            i += 1;
        }
        if chiral
            && body.get(i).is_some_and(|b| matches!(b, b'T' | b'A' | b'S' | b'O'))
            && body.get(i + 1).is_some_and(u8::is_ascii_uppercase)
        {
            i += 2;
            take_number::<u32>(body, &mut i, digits_at)?;
        }

        let mut hydrogens = 0u8;
        if body.get(i) == Some(&b'H') {
            i += 1;
            hydrogens = take_number(body, &mut i, digits_at)?.unwrap_or(1);
        }

        let mut charge = 0i8;
        if let Some(&sign @ (b'+' | b'-')) = body.get(i) {
            let unit: i8 = if sign == b'+' { 1 } else { -1 };
            i += 1;
            match take_number::<i8>(body, &mut i, digits_at)? {
                Some(n) => charge = unit * n,
                None => {
                    charge = unit;
                    while body.get(i) == Some(&sign) {
                        charge = charge.checked_add(unit).ok_or(SmilesError::ValueOutOfRange(digits_at + i))?;
                        i += 1;
                    }
                }
            }
        }

        if body.get(i) == Some(&b':') {
            i += 1;
            take_number::<u32>(body, &mut i, digits_at)?;
        }

        if i != body.len() {
            return Err(SmilesError::UnexpectedChar { ch: char::from(body[i]), pos: open + 1 + i });
        }
        self.pos = close + 1;
        Ok(Atom { atomic_number, aromatic, charge, isotope, hydrogens, bracket_h: Some(hydrogens) })
    }
}

/// Digits at `i`, if any. `offset` maps `i` back to a position in the SMILES.
fn take_number<T: FromStr>(body: &[u8], i: &mut usize, offset: usize) -> Result<Option<T>, SmilesError> {
    let start = *i;
    while body.get(*i).is_some_and(u8::is_ascii_digit) {
        *i += 1;
    }
    if start == *i {
        return Ok(None);
    }
    std::str::from_utf8(&body[start..*i])
        .ok()
        .and_then(|digits| digits.parse().ok())
        .map(Some)
        .ok_or(SmilesError::ValueOutOfRange(offset + start))
}

/// Element symbol inside brackets. Two-letter symbols win over one-letter ones.
fn bracket_symbol(body: &[u8], i: &mut usize) -> Option<(u8, bool)> {
    let first = *body.get(*i)?;
    if first == b'*' {
        *i += 1;
        return Some((0, false));
    }
    if first.is_ascii_lowercase() {
        for (sym, element) in [("se", "Se"), ("as", "As"), ("te", "Te")] {
            if body[*i..].starts_with(sym.as_bytes()) {
                *i += 2;
                return atomic_number(element).map(|n| (n, true));
            }
        }
        let element = match first {
            b'b' => "B",
            b'c' => "C",
            b'n' => "N",
            b'o' => "O",
            b'p' => "P",
            b's' => "S",
            _ => return None,
        };
        *i += 1;
        return atomic_number(element).map(|n| (n, true));
    }
    if !first.is_ascii_uppercase() {
        return None;
    }
    if let Some(second) = body.get(*i + 1).filter(|b| b.is_ascii_lowercase()) {
        let two = [first, *second];
        if let Some(n) = std::str::from_utf8(&two).ok().and_then(atomic_number) {
            *i += 2;
            return Some((n, false));
        }
    }
    let n = atomic_number(std::str::from_utf8(&body[*i..*i + 1]).ok()?)?;
    *i += 1;
    Some((n, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrogens(mol: &Molecule) -> Vec<u8> {
        mol.atoms().iter().map(|a| a.hydrogens).collect()
    }

    #[test]
    fn test_chain_and_implicit_hydrogens() {
        let mol = parse("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bonds().len(), 2);
        assert_eq!(hydrogens(&mol), vec![3, 2, 1]);
    }

    #[test]
    fn test_branches_and_double_bonds() {
        // acetic acid
        let mol = parse("CC(=O)O").unwrap();
        assert_eq!(hydrogens(&mol), vec![3, 0, 0, 1]);
        assert_eq!(mol.bonds()[1].order, BondOrder::Double);
        assert_eq!(mol.neighbours(1).len(), 3);
    }

    #[test]
    fn test_aromatic_ring() {
        let mol = parse("c1ccncc1").unwrap();
        assert_eq!(mol.bonds().len(), 6);
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert_eq!(hydrogens(&mol), vec![1, 1, 1, 0, 1, 1]);
        assert!(mol.ring_atoms().iter().all(|r| *r));
    }

    #[test]
    fn test_ring_membership_excludes_substituents() {
        // toluene: methyl carbon is not in the ring
        let mol = parse("Cc1ccccc1").unwrap();
        let rings = mol.ring_atoms();
        assert!(!rings[0]);
        assert!(rings[1..].iter().all(|r| *r));
    }

    #[test]
    fn test_bracket_atoms() {
        let mol = parse("[NH4+]").unwrap();
        assert_eq!(mol.atoms()[0].charge, 1);
        assert_eq!(mol.atoms()[0].hydrogens, 4);

        let mol = parse("[13CH3][O-]").unwrap();
        assert_eq!(mol.atoms()[0].isotope, 13);
        assert_eq!(mol.atoms()[1].charge, -1);
        assert_eq!(mol.atoms()[1].hydrogens, 0);

        let mol = parse("N[C@@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atoms()[1].hydrogens, 1);

        let mol = parse("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.atoms()[0].atomic_number, 11);
        assert!(mol.bonds().is_empty());

        let mol = parse("c1cc[nH]c1").unwrap();
        assert_eq!(mol.atoms()[3].hydrogens, 1);
    }

    #[test]
    fn test_two_digit_ring_and_halogens() {
        let mol = parse("C%10CCCCC%10Cl").unwrap();
        assert_eq!(mol.bonds().len(), 7);
        assert_eq!(mol.atoms()[6].atomic_number, 17);
        let mol = parse("BrCCBr").unwrap();
        assert_eq!(mol.atoms()[0].atomic_number, 35);
    }

    #[test]
    fn test_invalid_smiles() {
        assert_eq!(parse("").unwrap_err(), SmilesError::Empty);
        assert!(matches!(parse("C1CC").unwrap_err(), SmilesError::UnclosedRing(1)));
        assert!(matches!(parse("CC(C").unwrap_err(), SmilesError::UnbalancedBranch(_)));
        assert!(matches!(parse("CC)C").unwrap_err(), SmilesError::UnbalancedBranch(_)));
        assert!(matches!(parse("C()C").unwrap_err(), SmilesError::UnbalancedBranch(_)));
        assert!(matches!(parse("C[Xx]").unwrap_err(), SmilesError::UnknownElement { .. }));
        assert!(matches!(parse("C[CH3").unwrap_err(), SmilesError::UnclosedBracket(1)));
        assert!(matches!(parse("CC=").unwrap_err(), SmilesError::DanglingBond(2)));
        assert!(matches!(parse("=C").unwrap_err(), SmilesError::DanglingBond(0)));
        assert!(matches!(parse("C==C").unwrap_err(), SmilesError::DanglingBond(2)));
        assert!(matches!(parse("C11").unwrap_err(), SmilesError::InvalidRingClosure { ring: 1, .. }));
        assert!(matches!(parse("not a smiles").unwrap_err(), SmilesError::UnexpectedChar { .. }));
    }

    #[test]
    fn test_oversized_bracket_numbers_are_rejected() {
        assert_eq!(parse("[99999C]").unwrap_err(), SmilesError::ValueOutOfRange(1));
        assert!(matches!(parse("[CH999]").unwrap_err(), SmilesError::ValueOutOfRange(_)));
        assert!(matches!(parse("[C+999]").unwrap_err(), SmilesError::ValueOutOfRange(_)));
        assert!(matches!(parse("[C-128]").unwrap_err(), SmilesError::ValueOutOfRange(_)));
        let many = format!("[C{}]", "+".repeat(200));
        assert!(matches!(parse(&many).unwrap_err(), SmilesError::ValueOutOfRange(_)));
        assert_eq!(parse("[238U]").unwrap().atoms()[0].isotope, 238);
        assert_eq!(parse("[Fe+3]").unwrap().atoms()[0].charge, 3);
    }

    #[test]
    fn test_long_chain_and_macrocycle() {
        let chain = parse(&"C".repeat(100_000)).unwrap();
        assert_eq!(chain.bonds().len(), 99_999);
        assert!(chain.ring_bonds().iter().all(|r| !r));

        let ring = parse(&format!("C1{}C1", "C".repeat(50_000))).unwrap();
        assert!(ring.ring_bonds().iter().all(|r| *r));
        assert!(ring.atoms().iter().all(|a| !a.aromatic && a.hydrogens == 2));
    }

    fn orders(mol: &Molecule) -> Vec<BondOrder> {
        let mut orders: Vec<BondOrder> = mol.bonds().iter().map(|b| b.order).collect();
        orders.sort_unstable();
        orders
    }

    #[test]
    fn test_kekule_benzene_becomes_aromatic() {
        let kekule = parse("C1=CC=CC=C1").unwrap();
        let aromatic = parse("c1ccccc1").unwrap();
        assert!(kekule.atoms().iter().all(|a| a.aromatic));
        assert_eq!(orders(&kekule), vec![BondOrder::Aromatic; 6]);
        assert_eq!(hydrogens(&kekule), hydrogens(&aromatic));
    }

    #[test]
    fn test_kekule_and_aromatic_aspirin_agree() {
        let kekule = parse("CC(=O)OC1=CC=CC=C1C(=O)O").unwrap();
        let aromatic = parse("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        assert_eq!(orders(&kekule), orders(&aromatic));
        assert_eq!(hydrogens(&kekule), hydrogens(&aromatic));
        // both carbonyls stay double
        assert_eq!(kekule.bonds().iter().filter(|b| b.order == BondOrder::Double).count(), 2);
    }

    #[test]
    fn test_heteroaromatic_and_fused_rings() {
        let pyrrole = parse("C1=CNC=C1").unwrap();
        assert!(pyrrole.atoms().iter().all(|a| a.aromatic));
        assert_eq!(hydrogens(&pyrrole), hydrogens(&parse("c1c[nH]cc1").unwrap()));

        let furan = parse("C1=COC=C1").unwrap();
        assert!(furan.atoms().iter().all(|a| a.aromatic));

        // the second ring of naphthalene has only two double bonds of its own
        let naphthalene = parse("C1=CC=C2C=CC=CC2=C1").unwrap();
        assert_eq!(orders(&naphthalene), vec![BondOrder::Aromatic; 11]);

        // caffeine: exocyclic carbonyls keep their double bonds
        let kekule = parse("CN1C=NC2=C1C(=O)N(C(=O)N2C)C").unwrap();
        let aromatic = parse("Cn1cnc2c1c(=O)n(C)c(=O)n2C").unwrap();
        assert_eq!(orders(&kekule), orders(&aromatic));
        let mut kekule_h = hydrogens(&kekule);
        let mut aromatic_h = hydrogens(&aromatic);
        kekule_h.sort_unstable();
        aromatic_h.sort_unstable();
        assert_eq!(kekule_h, aromatic_h);
    }

    #[test]
    fn test_non_aromatic_rings_are_left_alone() {
        let cyclohexene = parse("C1=CCCCC1").unwrap();
        assert!(cyclohexene.atoms().iter().all(|a| !a.aromatic));
        assert_eq!(cyclohexene.bonds()[0].order, BondOrder::Double);

        // 1,4-benzoquinone counts four pi electrons
        let quinone = parse("O=C1C=CC(=O)C=C1").unwrap();
        assert!(quinone.atoms().iter().all(|a| !a.aromatic));

        let cyclopentadiene = parse("C1=CC=CC1").unwrap();
        assert!(cyclopentadiene.atoms().iter().all(|a| !a.aromatic));
    }

    #[test]
    fn test_bond_between_aromatic_rings_is_single() {
        let biphenyl = parse("c1ccccc1c1ccccc1").unwrap();
        assert_eq!(biphenyl.bonds()[6].order, BondOrder::Single);
        assert_eq!(orders(&biphenyl), orders(&parse("C1=CC=CC=C1C1=CC=CC=C1").unwrap()));
    }
}
