//! Input and output plumbing for the command line.
//!
//! The `-` path routes through stdin/stdout. Inputs are handed to the import
//! session as raw bytes; decoding happens there so the tokenizer only ever
//! sees UTF-8.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(reader)
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).expect("default"), UTF_8);
        assert_eq!(
            resolve_encoding(Some(" latin1 ")).expect("label").name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
