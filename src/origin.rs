//! Resolution of the base a deletion signature originated from.
//!
//! Deletions are frequently reported one or two bases away from the modified
//! base. Starting from the group representative the resolver looks for the
//! strand's target base in the representative itself, the other group members,
//! the run of deamination-consistent bases downstream and finally the wider
//! neighbourhood.
use crate::genomic::Reference;
use crate::group::PositionGroup;
use crate::locus::{Direction, Strand};
use crate::Result;
use log::trace;
use std::fmt;

/// Half width of the neighbourhood scanned as a last resort
pub const NEIGHBORHOOD: u64 = 25;

/// Base reported for every resolved group
pub const REPORTED_BASE: u8 = b'T';

/// How the originating base was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseFlag {
    /// The representative itself carries the target base
    FirstDelBase,
    /// Another group member carries the target base
    AltPositionBase,
    /// The target base ends the downstream run of consistent bases
    DwnStrmDelBase,
    /// Nearest target base in the surrounding sequence
    Neighborhood,
}

impl fmt::Display for BaseFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self {
            BaseFlag::FirstDelBase => "FirstDelBase",
            BaseFlag::AltPositionBase => "AltPositionBase",
            BaseFlag::DwnStrmDelBase => "DwnStrmDelBase",
            BaseFlag::Neighborhood => "Neighborhood",
        };
        write!(f, "{}", flag)
    }
}

impl Direction {
    /// Base a pseudouridine deletion is expected on
    pub fn target(&self) -> u8 {
        match self {
            Direction::Plus => b'T',
            Direction::Minus => b'A',
        }
    }

    /// Bases the downstream run may consist of
    fn is_consistent(&self, nuc: u8) -> bool {
        match self {
            Direction::Plus => matches!(nuc, b'C' | b'T'),
            Direction::Minus => matches!(nuc, b'G' | b'A'),
        }
    }
}

/// Sets the predicted origin and base flag of the representative
pub fn resolve_origin(
    group: &mut PositionGroup,
    reference: &Reference,
    hp_length: usize,
) -> Result<()> {
    let rep = group.representative();
    let direction = rep.strand.direction();
    let target = direction.target();
    let pos = rep.pos;

    let (pred_pos, flag) = if rep.base == target {
        (Some(pos), BaseFlag::FirstDelBase)
    } else if let Some(alt) = alternative_member(group) {
        (Some(alt), BaseFlag::AltPositionBase)
    } else {
        let window = reference.window(&rep.chrom, pos, hp_length)?;
        match downstream_offset(window, direction) {
            Some(offset) => (Some(pos + offset as u64), BaseFlag::DwnStrmDelBase),
            None => (
                nearest_target(reference.seq(&rep.chrom)?, pos, target),
                BaseFlag::Neighborhood,
            ),
        }
    };
    trace!(
        "{}:{} resolved to {:?} via {}",
        rep.chrom,
        pos + 1,
        pred_pos.map(|p| p + 1),
        flag
    );

    let rep = group.representative_mut();
    rep.pred_pos = pred_pos;
    rep.base_flag = Some(flag);
    Ok(())
}

/// Last other member carrying the target base of its own strand, members without a
/// strand call never qualify
fn alternative_member(group: &PositionGroup) -> Option<u64> {
    let rep_pos = group.representative().pos;
    group
        .positions()
        .iter()
        .filter(|p| p.pos != rep_pos && p.strand != Strand::Unknown)
        .filter(|p| p.base == p.strand.direction().target())
        .map(|p| p.pos)
        .last()
}

/// Offset of the first target base inside the leading run of consistent bases
fn downstream_offset(window: &[u8], direction: Direction) -> Option<usize> {
    window
        .iter()
        .take_while(|nuc| direction.is_consistent(**nuc))
        .position(|nuc| *nuc == direction.target())
}

/// Closest target base within the neighbourhood, the earliest wins ties
fn nearest_target(seq: &[u8], pos: u64, target: u8) -> Option<u64> {
    let begin = pos.saturating_sub(NEIGHBORHOOD);
    let end = (pos + NEIGHBORHOOD).min(seq.len() as u64);

    let mut best_distance = 2 * NEIGHBORHOOD;
    let mut best_pos = None;
    for i in begin..end {
        if seq[i as usize] == target {
            let distance = if i > pos { i - pos } else { pos - i };
            if distance < best_distance {
                best_distance = distance;
                best_pos = Some(i);
            }
        }
    }
    best_pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::tests::{group, position};

    fn reference(seq: &[u8]) -> Reference {
        let mut reference = Reference::default();
        reference.insert("chr1", seq.to_vec());
        reference
    }

    fn reversed(mut p: crate::group::Position) -> crate::group::Position {
        p.strand = Strand::Reverse;
        p
    }

    #[test]
    fn first_deleted_base() {
        let reference = reference(b"GGGGGTGGGG");
        let mut g = group(vec![position("chr1", 5, b'T', 5, 10)]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.pred_pos, Some(5));
        assert_eq!(rep.base_flag, Some(BaseFlag::FirstDelBase));
        assert_eq!(rep.reported_base(), b'T');
    }

    #[test]
    fn first_deleted_base_reverse_is_reported_as_t() {
        let reference = reference(b"GGGGGAGGGG");
        let mut g = group(vec![reversed(position("chr1", 5, b'A', 5, 10))]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.base_flag, Some(BaseFlag::FirstDelBase));
        assert_eq!(rep.reported_base(), b'T');
    }

    #[test]
    fn alternative_member_base() {
        let reference = reference(b"GGGGGCTGGG");
        let mut g = group(vec![
            position("chr1", 5, b'C', 8, 10),
            position("chr1", 6, b'T', 5, 10),
        ]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.pos, 5);
        assert_eq!(rep.pred_pos, Some(6));
        assert_eq!(rep.base_flag, Some(BaseFlag::AltPositionBase));
        assert_eq!(rep.reported_base(), b'T');
    }

    #[test]
    fn alternative_member_uses_its_own_strand() {
        let reference = reference(b"GGGGGCAGGGGGGGGGGGGG");
        let mut g = group(vec![
            position("chr1", 5, b'C', 8, 10),
            reversed(position("chr1", 6, b'A', 5, 10)),
        ]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.pos, 5);
        assert_eq!(rep.base_flag, Some(BaseFlag::AltPositionBase));
        assert_eq!(rep.pred_pos, Some(6));
    }

    #[test]
    fn alternative_member_needs_a_strand_call() {
        let reference = reference(b"GGGGGCAGGGGGGGGGGGGG");
        let mut unknown = position("chr1", 6, b'A', 5, 10);
        unknown.strand = Strand::Unknown;
        let mut g = group(vec![position("chr1", 5, b'C', 8, 10), unknown]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.base_flag, Some(BaseFlag::Neighborhood));
        assert_eq!(rep.pred_pos, None);
    }

    #[test]
    fn alternative_member_ignores_wrong_base_for_strand() {
        let reference = reference(b"GGGGGCTGGGGGGGGGGGGG");
        let mut g = group(vec![
            position("chr1", 5, b'C', 8, 10),
            reversed(position("chr1", 6, b'T', 5, 10)),
        ]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.base_flag, Some(BaseFlag::DwnStrmDelBase));
        assert_eq!(rep.pred_pos, Some(6));
    }

    #[test]
    fn downstream_base() {
        let reference = reference(b"GGGGGCCTAGGG");
        let mut g = group(vec![position("chr1", 5, b'C', 8, 10)]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.pred_pos, Some(7));
        assert_eq!(rep.base_flag, Some(BaseFlag::DwnStrmDelBase));
    }

    #[test]
    fn downstream_base_reverse() {
        let reference = reference(b"CCCCCGGACCCC");
        let mut g = group(vec![reversed(position("chr1", 5, b'G', 8, 10))]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.pred_pos, Some(7));
        assert_eq!(rep.base_flag, Some(BaseFlag::DwnStrmDelBase));
    }

    #[test]
    fn neighborhood_prefers_earliest_on_ties() {
        // T at 3 and 7 are both two bases away from 5
        let reference = reference(b"GGGTGCGTGGG");
        let mut g = group(vec![position("chr1", 5, b'C', 8, 10)]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.base_flag, Some(BaseFlag::Neighborhood));
        assert_eq!(rep.pred_pos, Some(3));
        assert_eq!(rep.reported_base(), b'T');
    }

    #[test]
    fn neighborhood_without_target() {
        let reference = reference(b"GGGGGCGGGGG");
        let mut g = group(vec![position("chr1", 5, b'C', 8, 10)]);
        resolve_origin(&mut g, &reference, 6).unwrap();
        let rep = g.representative();
        assert_eq!(rep.base_flag, Some(BaseFlag::Neighborhood));
        assert_eq!(rep.pred_pos, None);
    }

    #[test]
    fn resolution_is_idempotent() {
        let reference = reference(b"GGGTGCGTGGGCCTAGGG");
        for pos in &[5u64, 11] {
            let mut g = group(vec![position("chr1", *pos, b'C', 8, 10)]);
            resolve_origin(&mut g, &reference, 6).unwrap();
            let first = g.representative().clone();
            resolve_origin(&mut g, &reference, 6).unwrap();
            assert_eq!(g.representative(), &first);
        }
    }

    #[test]
    fn missing_chromosome_is_fatal() {
        let reference = reference(b"GGGG");
        let mut g = group(vec![position("chrX", 1, b'C', 8, 10)]);
        assert!(resolve_origin(&mut g, &reference, 6).is_err());
    }
}
