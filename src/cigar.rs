//! CIGAR helpers for unclipped coordinates
//!
//! Positions are 1-based and signed: a read whose leading clip runs past the
//! start of the reference has a non-positive unclipped start.

use noodles::sam::alignment::record::cigar::op::Kind;

/// Parse a textual CIGAR (e.g. the `MC` mate-cigar tag) into `(kind, length)` ops.
///
/// Unknown operation characters and zero-length ops are skipped.
pub fn parse_cigar(cigar: &str) -> Vec<(Kind, usize)> {
    let mut ops = Vec::new();
    let mut len = 0usize;

    for ch in cigar.bytes() {
        if ch.is_ascii_digit() {
            len = len.saturating_mul(10).saturating_add(usize::from(ch - b'0'));
            continue;
        }
        let kind = match ch {
            b'M' => Kind::Match,
            b'I' => Kind::Insertion,
            b'D' => Kind::Deletion,
            b'N' => Kind::Skip,
            b'S' => Kind::SoftClip,
            b'H' => Kind::HardClip,
            b'P' => Kind::Pad,
            b'=' => Kind::SequenceMatch,
            b'X' => Kind::SequenceMismatch,
            _ => {
                len = 0;
                continue;
            }
        };
        if len > 0 {
            ops.push((kind, len));
        }
        len = 0;
    }

    ops
}

/// Number of reference bases spanned by the alignment
#[inline]
pub fn reference_length(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .filter(|(kind, _)| kind.consumes_reference())
        .map(|(_, len)| *len)
        .sum()
}

/// Soft and hard clipping at the start of the alignment
#[inline]
pub fn leading_clipping(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .take_while(|(kind, _)| matches!(kind, Kind::SoftClip | Kind::HardClip))
        .map(|(_, len)| *len)
        .sum()
}

/// Soft and hard clipping at the end of the alignment
#[inline]
pub fn trailing_clipping(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .rev()
        .take_while(|(kind, _)| matches!(kind, Kind::SoftClip | Kind::HardClip))
        .map(|(_, len)| *len)
        .sum()
}

/// Alignment start minus leading clips.
#[inline]
pub fn unclipped_start(alignment_start: i64, ops: &[(Kind, usize)]) -> i64 {
    alignment_start - leading_clipping(ops) as i64
}

/// Alignment end plus trailing clips.
///
/// The alignment end is `start + reference_length - 1`.
#[inline]
pub fn unclipped_end(alignment_start: i64, ops: &[(Kind, usize)]) -> i64 {
    alignment_start + reference_length(ops) as i64 - 1 + trailing_clipping(ops) as i64
}
