//! Byte-level tokenizer for pasted spreadsheet content.
//!
//! Cells are separated by tabs and rows by newlines. A cell may be wrapped in
//! double quotes, in which case it can carry literal newlines and doubled
//! quotes (`""`) that stand for a single quote character. Quoting is tracked
//! by [`QuoteState`], a four-state machine that only moves when a quote byte
//! arrives, so an embedded newline is a plain fact of the current state
//! rather than something found by scanning ahead.
//!
//! [`Tokenizer`] produces cells, [`RowReader`] groups them into rows that
//! are normalized to the header width.

use std::{
    borrow::Cow,
    io::{self, BufRead},
};

use log::trace;

pub const TAB: u8 = b'\t';
pub const NEWLINE: u8 = b'\n';
pub const CARRIAGE_RETURN: u8 = b'\r';
pub const QUOTE: u8 = b'"';

/// One resolved cell. `None` means "no value", which is distinct from an
/// empty string; resolution never yields `Some("")`.
pub type Cell = Option<String>;

/// A row of cells. Rows handed out by [`RowReader`] always have the header's
/// width.
pub type Row = Vec<Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteState {
    #[default]
    Complete,
    Pending,
    EscapePending,
    EscapeComplete,
}

impl QuoteState {
    pub fn next(self, current: Option<u8>, previous: Option<u8>) -> Self {
        match self {
            QuoteState::Complete => QuoteState::Pending,
            QuoteState::Pending if current == Some(QUOTE) && previous != Some(QUOTE) => {
                QuoteState::EscapePending
            }
            QuoteState::Pending => QuoteState::Complete,
            QuoteState::EscapePending => QuoteState::EscapeComplete,
            QuoteState::EscapeComplete => QuoteState::Pending,
        }
    }

    pub fn append_quote(self) -> bool {
        !matches!(self, QuoteState::EscapePending)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, QuoteState::Pending | QuoteState::EscapePending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Cell,
    Line,
    EndOfDocument,
}

#[derive(Debug, Default)]
pub struct ByteBuffer {
    bytes: Vec<Option<u8>>,
    state: QuoteState,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: Option<u8>) {
        if byte == Some(QUOTE) {
            self.state = self.state.next(self.current_byte(), self.previous_byte());
            if self.state.append_quote() {
                self.bytes.push(byte);
            }
        } else {
            self.bytes.push(byte);
        }
    }

    pub fn quote_state(&self) -> QuoteState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn boundary(&self) -> Option<Boundary> {
        match self.bytes.last() {
            Some(Some(TAB)) => Some(Boundary::Cell),
            Some(Some(NEWLINE)) if !self.state.is_pending() => Some(Boundary::Line),
            Some(None) => Some(Boundary::EndOfDocument),
            _ => None,
        }
    }

    pub fn current_byte(&self) -> Option<u8> {
        if self.boundary().is_some() {
            return None;
        }
        self.bytes.last().copied().flatten()
    }

    pub fn previous_byte(&self) -> Option<u8> {
        if self.boundary().is_some() || self.bytes.len() < 2 {
            return None;
        }
        self.bytes[self.bytes.len() - 2]
    }

    pub fn resolve(&self) -> Cell {
        let mut bytes: Vec<u8> = self.bytes.iter().flatten().copied().collect();
        match self.boundary() {
            Some(Boundary::Cell) => {
                bytes.pop();
            }
            Some(Boundary::Line) => {
                bytes.pop();
                if bytes.last() == Some(&CARRIAGE_RETURN) {
                    bytes.pop();
                }
            }
            _ => {}
        }
        resolve_text(&String::from_utf8_lossy(&bytes))
    }
}

pub fn resolve_text(raw: &str) -> Cell {
    let unquoted = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let collapsed: Cow<'_, str> = if unquoted.contains("\"\"") {
        Cow::Owned(unquoted.replace("\"\"", "\""))
    } else {
        Cow::Borrowed(unquoted)
    };
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: Cell,
    pub boundary: Boundary,
}

pub struct Tokenizer<R> {
    reader: R,
    line: Vec<u8>,
    position: usize,
    exhausted: bool,
    finished: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            position: 0,
            exhausted: false,
            finished: false,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if self.position >= self.line.len() {
            if self.exhausted {
                return Ok(None);
            }
            self.line.clear();
            self.position = 0;
            if self.reader.read_until(NEWLINE, &mut self.line)? == 0 {
                self.exhausted = true;
                return Ok(None);
            }
        }
        let byte = self.line[self.position];
        self.position += 1;
        Ok(Some(byte))
    }

    pub fn next_cell(&mut self) -> io::Result<Option<Token>> {
        if self.finished {
            return Ok(None);
        }
        let mut buffer = ByteBuffer::new();
        loop {
            let byte = self.next_byte()?;
            buffer.push(byte);
            if let Some(boundary) = buffer.boundary() {
                if boundary == Boundary::EndOfDocument {
                    self.finished = true;
                }
                return Ok(Some(Token {
                    value: buffer.resolve(),
                    boundary,
                }));
            }
        }
    }

    pub fn next_raw_row(&mut self) -> io::Result<Option<Row>> {
        let mut cells = Vec::new();
        while let Some(token) = self.next_cell()? {
            // Nothing after the final newline.
            if token.boundary == Boundary::EndOfDocument && cells.is_empty() && token.value.is_none()
            {
                return Ok(None);
            }
            cells.push(token.value);
            if token.boundary != Boundary::Cell {
                return Ok(Some(cells));
            }
        }
        Ok(if cells.is_empty() { None } else { Some(cells) })
    }
}

pub fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Option::is_none)
}

pub fn normalize_row(mut row: Row, width: usize) -> Row {
    row.resize(width, None);
    row
}

pub struct RowReader<R> {
    tokenizer: Tokenizer<R>,
    width: Option<usize>,
    skipped: usize,
    source_row: usize,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            tokenizer: Tokenizer::new(reader),
            width: None,
            skipped: 0,
            source_row: 0,
        }
    }

    fn next_non_blank(&mut self) -> io::Result<Option<Row>> {
        while let Some(row) = self.tokenizer.next_raw_row()? {
            self.source_row += 1;
            if is_blank_row(&row) {
                self.skipped += 1;
                continue;
            }
            return Ok(Some(row));
        }
        Ok(None)
    }

    pub fn read_header(&mut self) -> io::Result<Option<Vec<String>>> {
        let Some(mut row) = self.next_non_blank()? else {
            return Ok(None);
        };
        while matches!(row.last(), Some(None)) {
            row.pop();
        }
        self.width = Some(row.len());
        trace!("Header row has {} column(s)", row.len());
        Ok(Some(row.into_iter().map(Option::unwrap_or_default).collect()))
    }

    pub fn next_row(&mut self) -> io::Result<Option<Row>> {
        let Some(row) = self.next_non_blank()? else {
            return Ok(None);
        };
        Ok(Some(match self.width {
            Some(width) => normalize_row(row, width),
            None => row,
        }))
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    /// 1-based source row of the row read last, blank rows included.
    pub fn source_row(&self) -> usize {
        self.source_row
    }
}

impl<R: BufRead> Iterator for RowReader<R> {
    type Item = io::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
