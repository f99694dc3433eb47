//! Alignment records as seen by the duplicate-set engine
//!
//! An [`AlignmentRecord`] carries only what ordering, scoring, and flagging
//! need: positions, strand and pairing flags, read name, read group, and
//! a few precomputed scoring inputs. The BAM adapter in [`crate::io`] builds
//! them from `noodles` records; [`RecordBuilder`] builds them directly.
//!
//! Records also carry their ordinal in the input file so that duplicate
//! decisions can be written back to the original records afterwards.

use bstr::{BStr, BString, ByteSlice};
use noodles::sam::alignment::record::Flags;
use std::fmt;
use std::io::{self, Read, Write};

use crate::sort::SpillCodec;

/// One alignment record (a read, or one end of a pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    index: u64,
    name: BString,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    unclipped_start: i64,
    unclipped_end: i64,
    mate_reference_sequence_id: Option<usize>,
    mate_unclipped_start: i64,
    mate_unclipped_end: i64,
    reference_length: u32,
    mate_reference_length: Option<u32>,
    base_quality_sum: u32,
    read_group: Option<BString>,
}

impl AlignmentRecord {
    /// Ordinal of the record in its input file
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Reference index, `None` when the record carries no reference (the unmapped sentinel)
    #[inline]
    pub fn reference_sequence_id(&self) -> Option<usize> {
        self.reference_sequence_id
    }

    #[inline]
    pub fn unclipped_start(&self) -> i64 {
        self.unclipped_start
    }

    #[inline]
    pub fn unclipped_end(&self) -> i64 {
        self.unclipped_end
    }

    #[inline]
    pub fn mate_reference_sequence_id(&self) -> Option<usize> {
        self.mate_reference_sequence_id
    }

    #[inline]
    pub fn mate_unclipped_start(&self) -> i64 {
        self.mate_unclipped_start
    }

    #[inline]
    pub fn mate_unclipped_end(&self) -> i64 {
        self.mate_unclipped_end
    }

    /// Reference bases covered by this record's alignment (0 when unmapped)
    #[inline]
    pub fn reference_length(&self) -> u32 {
        self.reference_length
    }

    /// Reference bases covered by the mate, if known from its mate cigar
    #[inline]
    pub fn mate_reference_length(&self) -> Option<u32> {
        self.mate_reference_length
    }

    /// Sum of base qualities >= 15
    #[inline]
    pub fn base_quality_sum(&self) -> u32 {
        self.base_quality_sum
    }

    #[inline]
    pub fn read_group(&self) -> Option<&BStr> {
        self.read_group.as_ref().map(|rg| rg.as_bstr())
    }

    #[inline]
    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    #[inline]
    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    #[inline]
    pub fn is_mate_unmapped(&self) -> bool {
        self.flags.is_mate_unmapped()
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    #[inline]
    pub fn is_mate_reverse(&self) -> bool {
        self.flags.is_mate_reverse_complemented()
    }

    #[inline]
    pub fn is_first_of_pair(&self) -> bool {
        self.flags.is_first_segment()
    }

    #[inline]
    pub fn is_secondary_or_supplementary(&self) -> bool {
        self.flags.is_secondary() || self.flags.is_supplementary()
    }

    #[inline]
    pub fn is_duplicate(&self) -> bool {
        self.flags.is_duplicate()
    }

    /// Paired, and both this read and its mate are mapped
    #[inline]
    pub fn is_paired_and_both_mapped(&self) -> bool {
        self.is_paired() && !self.is_unmapped() && !self.is_mate_unmapped()
    }

    /// The record itself is mapped, or it is paired with a mapped mate
    #[inline]
    pub fn has_mapped_end(&self) -> bool {
        !self.is_unmapped() || (self.is_paired() && !self.is_mate_unmapped())
    }

    /// The record itself is unmapped, or it is paired with an unmapped mate
    #[inline]
    pub fn has_unmapped_end(&self) -> bool {
        self.is_unmapped() || (self.is_paired() && self.is_mate_unmapped())
    }

    /// 5' unclipped position: unclipped end on the reverse strand, else unclipped start
    #[inline]
    pub fn five_prime_coordinate(&self) -> i64 {
        if self.is_reverse() {
            self.unclipped_end
        } else {
            self.unclipped_start
        }
    }

    /// The mate's 5' unclipped position
    #[inline]
    pub fn mate_five_prime_coordinate(&self) -> i64 {
        if self.is_mate_reverse() {
            self.mate_unclipped_end
        } else {
            self.mate_unclipped_start
        }
    }

    /// The only mutation the engine performs on a record.
    pub(crate) fn set_duplicate(&mut self, is_duplicate: bool) {
        self.flags.set(Flags::DUPLICATE, is_duplicate);
    }
}

impl fmt::Display for AlignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strand = if self.is_reverse() { '-' } else { '+' };
        match self.reference_sequence_id {
            Some(id) => write!(
                f,
                "{} flag={} ref={} pos={}{}",
                self.name,
                u16::from(self.flags),
                id,
                self.five_prime_coordinate(),
                strand
            ),
            None => write!(f, "{} flag={} ref=* (unmapped)", self.name, u16::from(self.flags)),
        }
    }
}

/// Fluent constructor for [`AlignmentRecord`]
///
/// Coordinates given here are unclipped. Unset coordinates default to 0.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: AlignmentRecordParts,
}

#[derive(Debug, Clone, Default)]
struct AlignmentRecordParts {
    index: u64,
    name: BString,
    flags: u16,
    reference_sequence_id: Option<usize>,
    unclipped_start: i64,
    unclipped_end: i64,
    mate_reference_sequence_id: Option<usize>,
    mate_unclipped_start: i64,
    mate_unclipped_end: i64,
    reference_length: u32,
    mate_reference_length: Option<u32>,
    base_quality_sum: u32,
    read_group: Option<BString>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: u64) -> Self {
        self.record.index = index;
        self
    }

    pub fn name(mut self, name: impl Into<BString>) -> Self {
        self.record.name = name.into();
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.record.flags = u16::from(flags);
        self
    }

    pub fn reference_sequence_id(mut self, id: Option<usize>) -> Self {
        self.record.reference_sequence_id = id;
        self
    }

    pub fn unclipped_start(mut self, pos: i64) -> Self {
        self.record.unclipped_start = pos;
        self
    }

    pub fn unclipped_end(mut self, pos: i64) -> Self {
        self.record.unclipped_end = pos;
        self
    }

    pub fn mate_reference_sequence_id(mut self, id: Option<usize>) -> Self {
        self.record.mate_reference_sequence_id = id;
        self
    }

    pub fn mate_unclipped_start(mut self, pos: i64) -> Self {
        self.record.mate_unclipped_start = pos;
        self
    }

    pub fn mate_unclipped_end(mut self, pos: i64) -> Self {
        self.record.mate_unclipped_end = pos;
        self
    }

    pub fn reference_length(mut self, len: u32) -> Self {
        self.record.reference_length = len;
        self
    }

    pub fn mate_reference_length(mut self, len: Option<u32>) -> Self {
        self.record.mate_reference_length = len;
        self
    }

    pub fn base_quality_sum(mut self, sum: u32) -> Self {
        self.record.base_quality_sum = sum;
        self
    }

    pub fn read_group(mut self, read_group: impl Into<BString>) -> Self {
        self.record.read_group = Some(read_group.into());
        self
    }

    pub fn build(self) -> AlignmentRecord {
        let r = self.record;
        AlignmentRecord {
            index: r.index,
            name: r.name,
            flags: Flags::from(r.flags),
            reference_sequence_id: r.reference_sequence_id,
            unclipped_start: r.unclipped_start,
            unclipped_end: r.unclipped_end,
            mate_reference_sequence_id: r.mate_reference_sequence_id,
            mate_unclipped_start: r.mate_unclipped_start,
            mate_unclipped_end: r.mate_unclipped_end,
            reference_length: r.reference_length,
            mate_reference_length: r.mate_reference_length,
            base_quality_sum: r.base_quality_sum,
            read_group: r.read_group,
        }
    }
}

const NONE_ID: i32 = -1;
const NONE_LEN: u32 = u32::MAX;

fn id_to_i32(id: Option<usize>) -> io::Result<i32> {
    match id {
        None => Ok(NONE_ID),
        Some(id) => i32::try_from(id)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "reference id overflows i32")),
    }
}

fn id_from_i32(id: i32) -> Option<usize> {
    usize::try_from(id).ok()
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "field too long"))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(bytes)
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4)?;
    Ok(u32::from_le_bytes(buf4))
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4)?;
    Ok(i32::from_le_bytes(buf4))
}

fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf8 = [0u8; 8];
    r.read_exact(&mut buf8)?;
    Ok(i64::from_le_bytes(buf8))
}

fn read_bytes<R: Read>(r: &mut R, len: u32) -> io::Result<BString> {
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(BString::from(buf))
}

/// Little-endian layout used for spill files:
/// index, flags, ref id, unclipped start/end, mate ref id, mate unclipped
/// start/end, reference length, mate reference length, quality sum,
/// then length-prefixed name and read group.
impl SpillCodec for AlignmentRecord {
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.index.to_le_bytes())?;
        w.write_all(&u16::from(self.flags).to_le_bytes())?;
        w.write_all(&id_to_i32(self.reference_sequence_id)?.to_le_bytes())?;
        w.write_all(&self.unclipped_start.to_le_bytes())?;
        w.write_all(&self.unclipped_end.to_le_bytes())?;
        w.write_all(&id_to_i32(self.mate_reference_sequence_id)?.to_le_bytes())?;
        w.write_all(&self.mate_unclipped_start.to_le_bytes())?;
        w.write_all(&self.mate_unclipped_end.to_le_bytes())?;
        w.write_all(&self.reference_length.to_le_bytes())?;
        w.write_all(&self.mate_reference_length.unwrap_or(NONE_LEN).to_le_bytes())?;
        w.write_all(&self.base_quality_sum.to_le_bytes())?;
        write_bytes(w, &self.name)?;
        match &self.read_group {
            Some(rg) => write_bytes(w, rg)?,
            None => w.write_all(&NONE_LEN.to_le_bytes())?,
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        // A clean end of stream is only allowed at a record boundary.
        let mut buf8 = [0u8; 8];
        let mut filled = 0;
        while filled < buf8.len() {
            match r.read(&mut buf8[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        let index = u64::from_le_bytes(buf8);

        let mut buf2 = [0u8; 2];
        r.read_exact(&mut buf2)?;
        let flags = Flags::from(u16::from_le_bytes(buf2));

        let reference_sequence_id = id_from_i32(read_i32(r)?);
        let unclipped_start = read_i64(r)?;
        let unclipped_end = read_i64(r)?;
        let mate_reference_sequence_id = id_from_i32(read_i32(r)?);
        let mate_unclipped_start = read_i64(r)?;
        let mate_unclipped_end = read_i64(r)?;
        let reference_length = read_u32(r)?;
        let mate_reference_length = Some(read_u32(r)?).filter(|&len| len != NONE_LEN);
        let base_quality_sum = read_u32(r)?;

        let name_len = read_u32(r)?;
        let name = read_bytes(r, name_len)?;
        let read_group = match read_u32(r)? {
            NONE_LEN => None,
            len => Some(read_bytes(r, len)?),
        };

        Ok(Some(Self {
            index,
            name,
            flags,
            reference_sequence_id,
            unclipped_start,
            unclipped_end,
            mate_reference_sequence_id,
            mate_unclipped_start,
            mate_unclipped_end,
            reference_length,
            mate_reference_length,
            base_quality_sum,
            read_group,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn paired_forward() -> AlignmentRecord {
        RecordBuilder::new()
            .index(42)
            .name("read1")
            .flags(Flags::SEGMENTED | Flags::MATE_REVERSE_COMPLEMENTED | Flags::FIRST_SEGMENT)
            .reference_sequence_id(Some(1))
            .unclipped_start(1000)
            .unclipped_end(1099)
            .mate_reference_sequence_id(Some(1))
            .mate_unclipped_start(1200)
            .mate_unclipped_end(1299)
            .reference_length(100)
            .mate_reference_length(Some(100))
            .base_quality_sum(3000)
            .read_group("rg1")
            .build()
    }

    #[test]
    fn test_five_prime_coordinates() {
        let rec = paired_forward();
        assert_eq!(rec.five_prime_coordinate(), 1000);
        assert_eq!(rec.mate_five_prime_coordinate(), 1299);

        let rev = RecordBuilder::new()
            .flags(Flags::REVERSE_COMPLEMENTED)
            .unclipped_start(10)
            .unclipped_end(60)
            .build();
        assert_eq!(rev.five_prime_coordinate(), 60);
    }

    #[test]
    fn test_mapped_and_unmapped_ends() {
        let rec = paired_forward();
        assert!(rec.is_paired_and_both_mapped());
        assert!(rec.has_mapped_end());
        assert!(!rec.has_unmapped_end());

        let mate_unmapped = RecordBuilder::new()
            .flags(Flags::SEGMENTED | Flags::MATE_UNMAPPED)
            .build();
        assert!(!mate_unmapped.is_paired_and_both_mapped());
        assert!(mate_unmapped.has_mapped_end());
        assert!(mate_unmapped.has_unmapped_end());

        let both_unmapped = RecordBuilder::new()
            .flags(Flags::SEGMENTED | Flags::UNMAPPED | Flags::MATE_UNMAPPED)
            .build();
        assert!(!both_unmapped.has_mapped_end());
        assert!(both_unmapped.has_unmapped_end());

        let unmapped_fragment = RecordBuilder::new().flags(Flags::UNMAPPED).build();
        assert!(!unmapped_fragment.has_mapped_end());
        assert!(unmapped_fragment.has_unmapped_end());
    }

    #[test]
    fn test_set_duplicate_touches_only_duplicate_bit() {
        let mut rec = paired_forward();
        let before = u16::from(rec.flags());
        rec.set_duplicate(true);
        assert!(rec.is_duplicate());
        assert_eq!(u16::from(rec.flags()), before | 0x400);
        rec.set_duplicate(false);
        assert_eq!(u16::from(rec.flags()), before);
    }

    #[test]
    fn test_spill_codec_preserves_record() {
        let records = vec![
            paired_forward(),
            RecordBuilder::new().index(7).name("frag").flags(Flags::UNMAPPED).build(),
        ];
        let mut buf = Vec::new();
        for rec in &records {
            rec.write_to(&mut buf).unwrap();
        }

        let mut cursor = Cursor::new(buf);
        let first = AlignmentRecord::read_from(&mut cursor).unwrap().unwrap();
        let second = AlignmentRecord::read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(first, records[0]);
        assert_eq!(second, records[1]);
        assert_eq!(second.read_group(), None);
        assert_eq!(second.reference_sequence_id(), None);
        assert!(AlignmentRecord::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_spill_codec_truncated_record_is_an_error() {
        let mut buf = Vec::new();
        paired_forward().write_to(&mut buf).unwrap();
        buf.truncate(20);
        let mut cursor = Cursor::new(buf);
        let err = AlignmentRecord::read_from(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_display_mentions_name_and_position() {
        let text = paired_forward().to_string();
        assert!(text.contains("read1"));
        assert!(text.contains("pos=1000+"));
    }
}
