//! Materialized copies of the tokenized grid.
//!
//! Tokenizing happens once. Every row lands in a [`RowStore`], an
//! append-only file of bincode-encoded rows with an offset table, so that
//! validation, warning collection and translation can each re-scan (or jump
//! to a row) without touching the raw input again.
//!
//! Heuristics need whole columns rather than rows. [`ColumnStore`] builds
//! that view incrementally: each appended row reads the previous column file
//! (one record per column, values tab-joined) and writes the other of two
//! alternating files with one more value per column. A file is never read
//! and written at the same time, and memory stays flat no matter how many
//! rows arrive. The quadratic I/O is acceptable for pasted tables.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use tempfile::TempDir;

use crate::{
    error::{ImportError, ImportResult},
    tokenizer::{Cell, Row, RowReader},
};

const ROW_STORE_FILE: &str = "rows.bin";
const COLUMN_FILES: [&str; 2] = ["columns-a.tsv", "columns-b.tsv"];

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Append-only row file plus the byte offset and source row number of
/// every row.
#[derive(Debug)]
pub struct RowStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    offsets: Vec<u64>,
    source_rows: Vec<usize>,
    position: u64,
}

impl RowStore {
    pub fn create(dir: &Path) -> ImportResult<Self> {
        let path = dir.join(ROW_STORE_FILE);
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            offsets: Vec::new(),
            source_rows: Vec::new(),
            position: 0,
        })
    }

    pub fn append(&mut self, row: &Row, source_row: usize) -> ImportResult<()> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(OpenOptions::new().append(true).open(&self.path)?),
        };
        let writer = self.writer.insert(writer);
        let written = bincode::serde::encode_into_std_write(row, writer, bincode_config())?;
        self.offsets.push(self.position);
        self.source_rows.push(source_row);
        self.position += written as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> ImportResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn reader(&self) -> ImportResult<RowStoreReader<'_>> {
        if self.writer.is_some() {
            return Err(ImportError::Io(std::io::Error::other(
                "row store must be flushed before it is read",
            )));
        }
        Ok(RowStoreReader {
            store: self,
            reader: BufReader::new(File::open(&self.path)?),
            next: 0,
        })
    }

    pub fn row(&self, index: usize) -> ImportResult<Row> {
        self.reader()?.read_at(index)
    }

    /// Row number in the pasted text, counting the header and blank rows.
    pub fn source_row(&self, index: usize) -> ImportResult<usize> {
        self.source_rows
            .get(index)
            .copied()
            .ok_or(ImportError::RowOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub fn numbered(&self) -> ImportResult<impl Iterator<Item = ImportResult<(usize, Row)>> + '_> {
        let reader = self.reader()?;
        Ok(self
            .source_rows
            .iter()
            .copied()
            .zip(reader)
            .map(|(source_row, row)| row.map(|row| (source_row, row))))
    }
}

pub struct RowStoreReader<'a> {
    store: &'a RowStore,
    reader: BufReader<File>,
    next: usize,
}

impl RowStoreReader<'_> {
    pub fn read_at(&mut self, index: usize) -> ImportResult<Row> {
        let offset = *self
            .store
            .offsets
            .get(index)
            .ok_or(ImportError::RowOutOfRange {
                index,
                len: self.store.len(),
            })?;
        if index != self.next {
            self.reader.seek(SeekFrom::Start(offset))?;
            self.next = index;
        }
        self.read_next()
    }

    pub fn seek_row(&mut self, index: usize) -> ImportResult<()> {
        match self.store.offsets.get(index) {
            Some(offset) => {
                self.reader.seek(SeekFrom::Start(*offset))?;
            }
            None => {
                self.reader.seek(SeekFrom::End(0))?;
            }
        }
        self.next = index;
        Ok(())
    }

    fn read_next(&mut self) -> ImportResult<Row> {
        let row: Row = bincode::serde::decode_from_std_read(&mut self.reader, bincode_config())?;
        self.next += 1;
        Ok(row)
    }
}

impl Iterator for RowStoreReader<'_> {
    type Item = ImportResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.store.len() {
            return None;
        }
        Some(self.read_next())
    }
}

#[derive(Debug)]
pub struct ColumnStore {
    dir: PathBuf,
    width: usize,
    rows: usize,
}

impl ColumnStore {
    pub fn create(dir: &Path, width: usize) -> ImportResult<Self> {
        let store = Self {
            dir: dir.to_path_buf(),
            width,
            rows: 0,
        };
        File::create(store.current_path())?;
        Ok(store)
    }

    fn file_for(&self, rows: usize) -> PathBuf {
        self.dir.join(COLUMN_FILES[rows % 2])
    }

    pub fn current_path(&self) -> PathBuf {
        self.file_for(self.rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn append(&mut self, row: &[Cell]) -> ImportResult<()> {
        let source = self.current_path();
        let target = self.file_for(self.rows + 1);
        let mut reader = column_reader(&source)?;
        let mut records = reader.records();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(&target)?;
        for index in 0..self.width {
            let mut record = records.next().transpose()?.unwrap_or_default();
            let value = row.get(index).and_then(|cell| cell.as_deref());
            record.push_field(value.unwrap_or(""));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn columns(&self) -> ImportResult<ColumnReader> {
        let reader = column_reader(&self.current_path())?;
        Ok(ColumnReader {
            records: reader.into_records(),
            width: self.width,
            index: 0,
        })
    }
}

fn column_reader(path: &Path) -> ImportResult<csv::Reader<File>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?)
}

pub struct ColumnReader {
    records: csv::StringRecordsIntoIter<File>,
    width: usize,
    index: usize,
}

impl Iterator for ColumnReader {
    type Item = ImportResult<Vec<Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.width {
            return None;
        }
        self.index += 1;
        let values = match self.records.next() {
            Some(Ok(record)) => record
                .iter()
                .map(|value| (!value.is_empty()).then(|| value.to_string()))
                .collect(),
            Some(Err(err)) => return Some(Err(err.into())),
            None => Vec::new(),
        };
        Some(Ok(values))
    }
}

#[derive(Debug)]
pub struct Grid {
    header: Vec<String>,
    rows: RowStore,
    columns: ColumnStore,
    skipped_rows: usize,
    // Dropped last so the files above are gone before the directory.
    _workspace: TempDir,
}

impl Grid {
    pub fn materialize<R: BufRead>(input: R, sample_rows: usize) -> ImportResult<Self> {
        let workspace = tempfile::Builder::new().prefix("card-import").tempdir()?;
        let mut reader = RowReader::new(input);
        let header = reader.read_header()?.ok_or(ImportError::EmptyInput)?;
        debug!(
            "Materializing grid with {} column(s) under {:?}",
            header.len(),
            workspace.path()
        );

        let mut rows = RowStore::create(workspace.path())?;
        let mut columns = ColumnStore::create(workspace.path(), header.len())?;
        while let Some(row) = reader.next_row()? {
            if sample_rows == 0 || columns.rows() < sample_rows {
                columns.append(&row)?;
            }
            rows.append(&row, reader.source_row())?;
        }
        rows.flush()?;

        info!(
            "Read {} row(s) across {} column(s); {} blank row(s) skipped",
            rows.len(),
            header.len(),
            reader.skipped_rows()
        );
        Ok(Self {
            header,
            rows,
            columns,
            skipped_rows: reader.skipped_rows(),
            _workspace: workspace,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    pub fn columns(&self) -> &ColumnStore {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn row(&self, index: usize) -> ImportResult<Row> {
        self.rows.row(index)
    }
}
