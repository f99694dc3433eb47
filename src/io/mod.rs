//! BAM file I/O
//!
//! Conversion from `noodles` BAM records to [`AlignmentRecord`]s, header
//! read-group lookup, and raw flag rewriting for the output pass.

use bstr::{BString, ByteSlice};
use noodles::bam;
use noodles::bgzf::io::Writer as BgzfWriter;
use noodles::sam::alignment::io::Write as SamWrite;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::{Tag, Value};
use noodles::sam::header::Header as SamHeader;
use noodles::sam::header::record::value::map::read_group::tag as rg_tag;
use std::fs::File;
use std::io::{self, Write};

use crate::cigar;
use crate::errors::{DupsetError, Result};
use crate::record::{AlignmentRecord, RecordBuilder};
use crate::scoring::sum_of_base_qualities;

/// Offset of the flag field in a serialized BAM record, as produced by [`record_to_bytes`]
///
/// block_size=4 + ref_id=4 + pos=4 + l_read_name=1 + mapq=1 + bin=2 + n_cigar_op=2
pub const FLAG_OFFSET: usize = 18;

/// The DUPLICATE flag bit in BAM format
pub const DUPLICATE_FLAG: u16 = 0x400;

/// Modify the DUPLICATE flag in raw BAM record bytes
///
/// Returns the modified flag value.
#[inline]
pub fn toggle_duplicate_flag(data: &mut [u8], is_duplicate: bool) -> Option<u16> {
    if data.len() < FLAG_OFFSET + 2 {
        return None;
    }

    let flag = u16::from_le_bytes([data[FLAG_OFFSET], data[FLAG_OFFSET + 1]]);
    let new_flag = if is_duplicate {
        flag | DUPLICATE_FLAG
    } else {
        flag & !DUPLICATE_FLAG
    };

    data[FLAG_OFFSET..FLAG_OFFSET + 2].copy_from_slice(&new_flag.to_le_bytes());

    Some(new_flag)
}

/// `(read group id, library name)` for every `@RG` line with an `LB` field
pub fn read_group_libraries(header: &SamHeader) -> Vec<(BString, String)> {
    header
        .read_groups()
        .iter()
        .filter_map(|(id, rg)| {
            rg.other_fields()
                .get(&rg_tag::LIBRARY)
                .map(|lb| (id.clone(), lb.to_string()))
        })
        .collect()
}

/// Build an [`AlignmentRecord`] from a BAM record.
///
/// `index` is the record's ordinal in the input file. The mate's unclipped
/// coordinates come from the `MC` tag; without it both fall back to the
/// mate's alignment start and the mate contributes no reference length.
pub fn alignment_record_from_bam(record: &bam::Record, index: u64) -> Result<AlignmentRecord> {
    let name = record
        .name()
        .map(|n| BString::from(n.as_bytes()))
        .ok_or_else(|| DupsetError::InvalidRecord {
            name: format!("#{index}"),
            reason: "missing read name".to_string(),
        })?;

    let invalid = |reason: String| DupsetError::InvalidRecord {
        name: name.to_string(),
        reason,
    };

    let flags = record.flags();
    let ops: Vec<(Kind, usize)> = record
        .cigar()
        .iter()
        .map(|op| op.map(|op| (op.kind(), op.len())))
        .collect::<io::Result<_>>()
        .map_err(|e| invalid(format!("bad cigar: {e}")))?;

    let reference_sequence_id = record
        .reference_sequence_id()
        .transpose()
        .map_err(|e| invalid(format!("bad reference id: {e}")))?;
    let alignment_start = record
        .alignment_start()
        .transpose()
        .map_err(|e| invalid(format!("bad position: {e}")))?
        .map_or(0, |p| usize::from(p) as i64);

    let (unclipped_start, unclipped_end) = if flags.is_unmapped() {
        (alignment_start, alignment_start)
    } else {
        (
            cigar::unclipped_start(alignment_start, &ops),
            cigar::unclipped_end(alignment_start, &ops),
        )
    };

    let mate_reference_sequence_id = record
        .mate_reference_sequence_id()
        .transpose()
        .map_err(|e| invalid(format!("bad mate reference id: {e}")))?;
    let mate_start = record
        .mate_alignment_start()
        .transpose()
        .map_err(|e| invalid(format!("bad mate position: {e}")))?
        .map_or(0, |p| usize::from(p) as i64);

    let data = record.data();
    let mate_ops = match data.get(&Tag::MATE_CIGAR) {
        Some(Ok(Value::String(s))) => Some(cigar::parse_cigar(&s.to_str_lossy())),
        _ => None,
    };
    let (mate_unclipped_start, mate_unclipped_end, mate_reference_length) = match &mate_ops {
        Some(ops) if !flags.is_mate_unmapped() => (
            cigar::unclipped_start(mate_start, ops),
            cigar::unclipped_end(mate_start, ops),
            Some(cigar::reference_length(ops) as u32),
        ),
        _ => (mate_start, mate_start, None),
    };

    let mut builder = RecordBuilder::new()
        .index(index)
        .name(name.clone())
        .flags(flags)
        .reference_sequence_id(reference_sequence_id)
        .unclipped_start(unclipped_start)
        .unclipped_end(unclipped_end)
        .mate_reference_sequence_id(mate_reference_sequence_id)
        .mate_unclipped_start(mate_unclipped_start)
        .mate_unclipped_end(mate_unclipped_end)
        .reference_length(cigar::reference_length(&ops) as u32)
        .mate_reference_length(mate_reference_length)
        .base_quality_sum(sum_of_base_qualities(record.quality_scores().as_ref()));

    if let Some(Ok(Value::String(rg))) = data.get(&Tag::READ_GROUP) {
        builder = builder.read_group(rg.as_bytes());
    }

    Ok(builder.build())
}

/// Owning iterator over the remaining records of `reader`, converted and numbered from 0
pub fn alignment_records<R>(
    mut reader: bam::io::Reader<R>,
) -> impl Iterator<Item = Result<AlignmentRecord>>
where
    R: io::Read,
{
    let mut index = 0u64;
    let mut record = bam::Record::default();
    std::iter::from_fn(move || match reader.read_record(&mut record) {
        Ok(0) => None,
        Ok(_) => {
            let result = alignment_record_from_bam(&record, index);
            index += 1;
            Some(result)
        }
        Err(e) => Some(Err(e.into())),
    })
}

/// Write header to BGZF-compressed BAM file
pub fn write_header(writer: &mut BgzfWriter<File>, header: &SamHeader) -> Result<()> {
    let mut header_buf = Vec::new();
    {
        let mut writer = bam::io::Writer::from(&mut header_buf);
        writer.write_header(header)?;
    }
    writer.write_all(&header_buf)?;
    writer.flush()?;
    Ok(())
}

/// Serialize a BAM record to raw bytes
pub fn record_to_bytes(header: &SamHeader, record: &bam::Record) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    {
        let mut writer = bam::io::Writer::from(&mut data);
        writer.write_alignment_record(header, record)?;
    }
    Ok(data)
}
