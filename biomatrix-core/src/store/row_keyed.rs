//! Disk-resident matrix over a packed text file
//!
//! Only the row index (row key -> byte region) and the column keys live in
//! memory. Each read seeks to `region + col * BYTES_PER_VALUE` and decodes
//! one cell. The index can be rebuilt by scanning the file or loaded from a
//! binary side index written next to it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::ValueCodec;
use crate::error::{MatrixError, MatrixResult};
use crate::io::{file_keys, parse_header, split_row_key, trim_line_end};
use crate::keys::KeyIndex;
use crate::matrix::{Matrix, ViewKind};
use crate::store::lease::{AccessPolicy, Lease};

/// Magic bytes of the side index format
const INDEX_MAGIC: &[u8; 4] = b"RKIX";

/// Current side index version
const INDEX_VERSION: u32 = 1;

/// Extension appended to a data file's name to locate its side index
pub const INDEX_EXTENSION: &str = "rowkeys";

/// Byte region of one row's packed cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRegion {
    pub key: String,
    pub offset: u64,
    pub length: u64,
}

/// Row key -> record region index for one packed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKeyIndex {
    col_count: usize,
    bytes_per_value: usize,
    records: Vec<RecordRegion>,
}

impl RowKeyIndex {
    /// Path of the side index belonging to `data_path`
    pub fn side_path<P: AsRef<Path>>(data_path: P) -> PathBuf {
        let mut name = data_path.as_ref().as_os_str().to_owned();
        name.push(".");
        name.push(INDEX_EXTENSION);
        PathBuf::from(name)
    }

    /// Scan a packed file and record where each row's cells start
    ///
    /// Returns the column keys from the header along with the index. Only
    /// line lengths are checked; cell contents are validated when read.
    pub fn build<P: AsRef<Path>>(data_path: P, bytes_per_value: usize) -> MatrixResult<(Vec<String>, Self)> {
        let mut reader = BufReader::new(File::open(data_path)?);
        let mut line = Vec::new();
        let mut offset = reader.read_until(b'\n', &mut line)? as u64;
        if line.is_empty() {
            return Err(MatrixError::format_at(1, "empty file, expected a header line"));
        }
        let cols = parse_header(&line)?;
        let width = (cols.len() * bytes_per_value) as u64;

        let mut records = Vec::new();
        let mut line_no = 1;
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            line_no += 1;
            let start = offset;
            offset += read as u64;

            let content = trim_line_end(&line);
            if content.is_empty() {
                continue;
            }
            let (key, body) = split_row_key(content, line_no)?;
            if body.len() as u64 != width {
                return Err(MatrixError::format_at(
                    line_no,
                    format!("expected {} bytes for {} columns, found {}", width, cols.len(), body.len()),
                ));
            }
            records.push(RecordRegion {
                key: key.to_string(),
                offset: start + key.len() as u64 + 1,
                length: width,
            });
        }

        let index = Self {
            col_count: cols.len(),
            bytes_per_value,
            records,
        };
        Ok((cols, index))
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    pub fn bytes_per_value(&self) -> usize {
        self.bytes_per_value
    }

    pub fn records(&self) -> &[RecordRegion] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> MatrixResult<()> {
        writer.write_all(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_VERSION)?;
        writer.write_u32::<LittleEndian>(self.col_count as u32)?;
        writer.write_u32::<LittleEndian>(self.bytes_per_value as u32)?;
        writer.write_u64::<LittleEndian>(self.records.len() as u64)?;

        for record in &self.records {
            let key_bytes = record.key.as_bytes();
            writer.write_u32::<LittleEndian>(key_bytes.len() as u32)?;
            writer.write_all(key_bytes)?;
            writer.write_u64::<LittleEndian>(record.offset)?;
            writer.write_u64::<LittleEndian>(record.length)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> MatrixResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(MatrixError::format("invalid magic bytes: expected RKIX"));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != INDEX_VERSION {
            return Err(MatrixError::format(format!("unsupported index version: {}", version)));
        }

        let col_count = reader.read_u32::<LittleEndian>()? as usize;
        let bytes_per_value = reader.read_u32::<LittleEndian>()? as usize;
        let expected = (col_count * bytes_per_value) as u64;

        let count = reader.read_u64::<LittleEndian>()? as usize;
        let mut records = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let key_len = reader.read_u32::<LittleEndian>()? as usize;
            let mut key_bytes = vec![0u8; key_len];
            reader.read_exact(&mut key_bytes)?;
            let key = String::from_utf8(key_bytes)
                .map_err(|_| MatrixError::format("index row key is not valid UTF-8"))?;

            let offset = reader.read_u64::<LittleEndian>()?;
            let length = reader.read_u64::<LittleEndian>()?;
            if length != expected {
                return Err(MatrixError::format(format!(
                    "index entry '{}' spans {} bytes, expected {}",
                    key, length, expected
                )));
            }
            records.push(RecordRegion { key, offset, length });
        }

        Ok(Self {
            col_count,
            bytes_per_value,
            records,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> MatrixResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MatrixResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

/// Read-only matrix whose cells stay on disk
///
/// The store owns its file handle and a lease on the file. Both are given
/// up on drop or on [`RowKeyedStructMatrix::release`]; any read after that
/// is a usage error.
pub struct RowKeyedStructMatrix<C: ValueCodec> {
    path: PathBuf,
    rows: KeyIndex,
    cols: KeyIndex,
    codec: C,
    missing: C::Value,
    index: RowKeyIndex,
    handle: Mutex<Option<File>>,
    lease: Mutex<Option<Lease>>,
}

impl<C: ValueCodec> RowKeyedStructMatrix<C> {
    /// Open a packed file, building the row index by scanning it
    pub fn open<P: AsRef<Path>>(path: P, codec: C, policy: AccessPolicy) -> MatrixResult<Self> {
        let path = path.as_ref();
        let lease = Lease::acquire(path, policy)?;
        let (cols, index) = RowKeyIndex::build(path, C::BYTES_PER_VALUE)?;
        log::debug!("Indexed {} rows of {}", index.len(), path.display());
        Self::with_index(path, cols, index, codec, lease)
    }

    /// Open a packed file using a pre-built side index
    pub fn open_with_index<P, Q>(path: P, index_path: Q, codec: C, policy: AccessPolicy) -> MatrixResult<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path = path.as_ref();
        let lease = Lease::acquire(path, policy)?;
        let index = RowKeyIndex::load(index_path)?;
        if index.bytes_per_value() != C::BYTES_PER_VALUE {
            return Err(MatrixError::format(format!(
                "index was built for {}-byte cells, {} cells are {} bytes",
                index.bytes_per_value(),
                codec.name(),
                C::BYTES_PER_VALUE
            )));
        }

        let mut header = Vec::new();
        BufReader::new(File::open(path)?).read_until(b'\n', &mut header)?;
        let cols = parse_header(&header)?;
        if cols.len() != index.col_count() {
            return Err(MatrixError::format(format!(
                "index covers {} columns, {} has {}",
                index.col_count(),
                path.display(),
                cols.len()
            )));
        }
        Self::with_index(path, cols, index, codec, lease)
    }

    fn with_index(path: &Path, cols: Vec<String>, index: RowKeyIndex, codec: C, lease: Lease) -> MatrixResult<Self> {
        let cols = file_keys(cols, "header")?;
        let rows = file_keys(index.records().iter().map(|r| r.key.clone()).collect(), "row keys")?;
        let handle = File::open(path)?;
        let missing = codec.missing_value();
        Ok(Self {
            path: path.to_path_buf(),
            rows,
            cols,
            codec,
            missing,
            index,
            handle: Mutex::new(Some(handle)),
            lease: Mutex::new(Some(lease)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &RowKeyIndex {
        &self.index
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn policy(&self) -> Option<AccessPolicy> {
        self.lease.lock().as_ref().map(Lease::policy)
    }

    /// Close the file handle and give up the lease
    pub fn release(&self) {
        self.handle.lock().take();
        self.lease.lock().take();
    }

    pub fn is_released(&self) -> bool {
        self.handle.lock().is_none()
    }

    /// Raw packed bytes of one row
    pub fn packed_row(&self, row: usize) -> MatrixResult<Vec<u8>> {
        let region = &self.index.records()[row];
        let mut bytes = vec![0u8; region.length as usize];
        self.read_region(region.offset, &mut bytes)?;
        Ok(bytes)
    }

    fn read_region(&self, offset: u64, out: &mut [u8]) -> MatrixResult<()> {
        let mut handle = self.handle.lock();
        let file = handle.as_mut().ok_or_else(|| {
            MatrixError::usage(format!("{} has been released", self.path.display()))
        })?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(out)?;
        Ok(())
    }
}

impl<C: ValueCodec> fmt::Debug for RowKeyedStructMatrix<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowKeyedStructMatrix")
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .field("rows", &self.rows.len())
            .field("cols", &self.cols.len())
            .field("released", &self.is_released())
            .finish()
    }
}

impl<C: ValueCodec> Matrix<C::Value> for RowKeyedStructMatrix<C> {
    fn row_keys(&self) -> &KeyIndex {
        &self.rows
    }

    fn col_keys(&self) -> &KeyIndex {
        &self.cols
    }

    fn missing_value(&self) -> &C::Value {
        &self.missing
    }

    fn read_at(&self, row: usize, col: usize) -> MatrixResult<Option<C::Value>> {
        let offset = self.index.records()[row].offset + (col * C::BYTES_PER_VALUE) as u64;
        let mut cell = vec![0u8; C::BYTES_PER_VALUE];
        self.read_region(offset, &mut cell)?;
        self.codec.decode_cell(&cell)
    }

    fn write_at(&self, _row: usize, _col: usize, _value: Option<C::Value>) -> MatrixResult<()> {
        Err(MatrixError::read_only(ViewKind::RowKeyedStruct.name()))
    }

    fn kind(&self) -> ViewKind {
        ViewKind::RowKeyedStruct
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FloatCodec, PairCodec};
    use crate::value::UoPair;
    use tempfile::TempDir;

    fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("calls.txt");
        std::fs::write(&path, "var\tc1\tc2\nr1\tab??\nr2\tcdef\n").unwrap();
        path
    }

    #[test]
    fn test_reads_seek_into_file() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let m = RowKeyedStructMatrix::open(&path, PairCodec, AccessPolicy::SharedRead).unwrap();
        assert_eq!(m.row_count(), 2);
        assert_eq!(m.get("r2", "c2").unwrap(), UoPair::new(b'e', b'f').unwrap());
        assert_eq!(m.try_get("r1", "c2").unwrap(), None);
        assert_eq!(m.packed_row(1).unwrap(), b"cdef".to_vec());
    }

    #[test]
    fn test_writes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let m = RowKeyedStructMatrix::open(write_sample(&dir), PairCodec, AccessPolicy::SharedRead).unwrap();
        let err = m.set("r1", "c1", UoPair::new(b'g', b'g').unwrap()).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_use_after_release() {
        let dir = TempDir::new().unwrap();
        let m = RowKeyedStructMatrix::open(write_sample(&dir), PairCodec, AccessPolicy::Exclusive).unwrap();
        m.release();
        assert!(m.is_released());
        assert_eq!(m.policy(), None);
        assert!(m.try_get("r1", "c1").unwrap_err().is_usage());
    }

    #[test]
    fn test_exclusive_policy_is_enforced() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let first = RowKeyedStructMatrix::open(&path, PairCodec, AccessPolicy::Exclusive).unwrap();
        let err = RowKeyedStructMatrix::open(&path, PairCodec, AccessPolicy::SharedRead).unwrap_err();
        assert!(err.is_usage());
        drop(first);
        let _again = RowKeyedStructMatrix::open(&path, PairCodec, AccessPolicy::SharedRead).unwrap();
    }

    #[test]
    fn test_failed_open_releases_lease() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "var\tc1\nr1\tabc\n").unwrap();
        let err = RowKeyedStructMatrix::open(&path, PairCodec, AccessPolicy::Exclusive).unwrap_err();
        assert!(err.is_format());
        assert!(Lease::acquire(&path, AccessPolicy::Exclusive).is_ok());
    }

    #[test]
    fn test_side_index_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let (_, index) = RowKeyIndex::build(&path, PairCodec::BYTES_PER_VALUE).unwrap();
        let side = RowKeyIndex::side_path(&path);
        assert!(side.to_string_lossy().ends_with("calls.txt.rowkeys"));
        index.save(&side).unwrap();
        assert_eq!(RowKeyIndex::load(&side).unwrap(), index);

        let m = RowKeyedStructMatrix::open_with_index(&path, &side, PairCodec, AccessPolicy::SharedRead).unwrap();
        assert_eq!(m.get("r1", "c1").unwrap(), UoPair::new(b'a', b'b').unwrap());
    }

    #[test]
    fn test_index_for_other_codec_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir);
        let (_, index) = RowKeyIndex::build(&path, PairCodec::BYTES_PER_VALUE).unwrap();
        let side = RowKeyIndex::side_path(&path);
        index.save(&side).unwrap();
        let err = RowKeyedStructMatrix::open_with_index(&path, &side, FloatCodec, AccessPolicy::SharedRead)
            .err()
            .unwrap();
        assert!(err.is_format());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes: &[u8] = b"NOPE\x01\x00\x00\x00";
        assert!(RowKeyIndex::read_from(&mut bytes).unwrap_err().is_format());
    }
}
