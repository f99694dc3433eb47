//! External merge sort
//!
//! Items accumulate in memory until the record budget is reached, then the
//! buffer is stably sorted and spilled to an LZ4-framed chunk file in a
//! temporary directory. Reading back merges the chunks; ties go to the
//! earliest chunk, so the overall sort is stable.
//!
//! The comparator is passed to every call that compares rather than stored
//! in the sorter. Callers whose comparator carries mutable state (such as a
//! library registry) can then keep a single copy of that state for sorting
//! and for everything downstream of the sort. It must be the same ordering
//! on every call.

use log::debug;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

use crate::errors::Result;

/// Default number of records held in memory before spilling
pub const DEFAULT_MAX_RECORDS_IN_RAM: usize = 500_000;

/// Binary (de)serialization used for spill files
pub trait SpillCodec: Sized {
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    /// Returns `Ok(None)` at a clean end of stream.
    fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>>;
}

/// Memory budget and spill location for [`ExternalSorter`]
#[derive(Debug, Clone)]
pub struct SortConfig {
    max_records_in_ram: usize,
    tmp_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            max_records_in_ram: DEFAULT_MAX_RECORDS_IN_RAM,
            tmp_dir: None,
        }
    }
}

impl SortConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of records buffered before a spill (at least 1).
    #[must_use]
    pub fn max_records_in_ram(mut self, n: usize) -> Self {
        self.max_records_in_ram = n.max(1);
        self
    }

    /// Set the directory under which spill files are created.
    #[must_use]
    pub fn tmp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(path.into());
        self
    }

    pub fn records_in_ram(&self) -> usize {
        self.max_records_in_ram
    }

    /// Spill location, the system temporary directory unless set
    pub fn spill_root(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

type ChunkReader = BufReader<FrameDecoder<File>>;

pub struct ExternalSorter<T> {
    max_records_in_ram: usize,
    spill_root: PathBuf,
    spill_dir: Option<TempDir>,
    buffer: Vec<T>,
    chunks: Vec<PathBuf>,
    total: u64,
}

impl<T: SpillCodec> ExternalSorter<T> {
    pub fn new(config: &SortConfig) -> Self {
        Self {
            max_records_in_ram: config.records_in_ram(),
            spill_root: config.spill_root(),
            spill_dir: None,
            buffer: Vec::new(),
            chunks: Vec::new(),
            total: 0,
        }
    }

    /// Buffer an item, spilling the buffer once it reaches the budget.
    pub fn add<F>(&mut self, item: T, compare: &mut F) -> Result<()>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.buffer.push(item);
        self.total += 1;
        if self.buffer.len() >= self.max_records_in_ram {
            self.spill(compare)?;
        }
        Ok(())
    }

    /// Items added so far
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Chunk files written so far
    pub fn spill_count(&self) -> usize {
        self.chunks.len()
    }

    fn spill<F>(&mut self, compare: &mut F) -> Result<()>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.sort_by(|a, b| compare(a, b));

        let path = self.next_chunk_path()?;
        let mut enc = FrameEncoder::new(BufWriter::with_capacity(1 << 20, File::create(&path)?));
        let n = self.buffer.len();
        for item in self.buffer.drain(..) {
            item.write_to(&mut enc)?;
        }
        let mut writer = enc.finish().map_err(io::Error::from)?;
        writer.flush()?;

        debug!("spilled {} records to {}", n, path.display());
        self.chunks.push(path);
        Ok(())
    }

    fn next_chunk_path(&mut self) -> Result<PathBuf> {
        let dir = match self.spill_dir.take() {
            Some(dir) => dir,
            None => {
                let dir = Builder::new()
                    .prefix("dupsetrs")
                    .tempdir_in(&self.spill_root)?;
                debug!("spilling sort chunks to {}", dir.path().display());
                dir
            }
        };
        let path = dir.path().join(format!("{}.lz4", fastrand::u64(..)));
        self.spill_dir = Some(dir);
        Ok(path)
    }

    /// Stop accepting items and return them in sorted order.
    pub fn finish<F>(mut self, compare: &mut F) -> Result<SortedStream<T>>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.chunks.is_empty() {
            self.buffer.sort_by(|a, b| compare(a, b));
            return Ok(SortedStream {
                state: State::InMemory(std::mem::take(&mut self.buffer).into_iter()),
                spill_dir: None,
            });
        }

        self.spill(compare)?;
        debug!(
            "merging {} records from {} chunks",
            self.total,
            self.chunks.len()
        );

        let mut readers = Vec::with_capacity(self.chunks.len());
        let mut heads = Vec::with_capacity(self.chunks.len());
        for path in &self.chunks {
            let mut reader = open_chunk_reader(path)?;
            heads.push(T::read_from(&mut reader)?);
            readers.push(reader);
        }

        Ok(SortedStream {
            state: State::Merging { readers, heads },
            spill_dir: self.spill_dir,
        })
    }
}

fn open_chunk_reader(path: &Path) -> io::Result<ChunkReader> {
    Ok(BufReader::with_capacity(
        1 << 18,
        FrameDecoder::new(File::open(path)?),
    ))
}

enum State<T> {
    InMemory(std::vec::IntoIter<T>),
    Merging {
        readers: Vec<ChunkReader>,
        heads: Vec<Option<T>>,
    },
    Closed,
}

/// Sorted output of an [`ExternalSorter`]
///
/// Owns the spill directory; it is deleted on [`SortedStream::close`] or drop.
pub struct SortedStream<T> {
    state: State<T>,
    spill_dir: Option<TempDir>,
}

impl<T: SpillCodec> SortedStream<T> {
    pub fn has_next(&self) -> bool {
        match &self.state {
            State::Closed => false,
            State::InMemory(items) => !items.as_slice().is_empty(),
            State::Merging { heads, .. } => heads.iter().any(Option::is_some),
        }
    }

    /// Next item in sorted order, using the comparator the sorter was fed with.
    pub fn next_with<F>(&mut self, compare: &mut F) -> Option<Result<T>>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        match &mut self.state {
            State::Closed => None,
            State::InMemory(items) => items.next().map(Ok),
            State::Merging { readers, heads } => {
                let mut best: Option<(usize, &T)> = None;
                for (i, head) in heads.iter().enumerate() {
                    if let Some(candidate) = head {
                        if best.is_none_or(|(_, current)| compare(candidate, current) == Ordering::Less) {
                            best = Some((i, candidate));
                        }
                    }
                }
                let (i, _) = best?;
                let item = heads[i].take()?;
                match T::read_from(&mut readers[i]) {
                    Ok(next) => heads[i] = next,
                    Err(e) => {
                        self.close();
                        return Some(Err(e.into()));
                    }
                }
                Some(Ok(item))
            }
        }
    }

    /// Release readers and delete spill files.
    pub fn close(&mut self) {
        self.state = State::Closed;
        self.spill_dir = None;
    }
}
