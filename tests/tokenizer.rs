use card_import::tokenizer::{Boundary, Row, RowReader, Tokenizer, normalize_row, resolve_text};
use proptest::prelude::*;

fn read_all(input: &str) -> (Vec<String>, Vec<Row>) {
    let mut reader = RowReader::new(input.as_bytes());
    let header = reader.read_header().expect("read header").expect("header");
    let rows = reader.map(|row| row.expect("row")).collect();
    (header, rows)
}

/// Encodes a value the way a spreadsheet puts it on the clipboard.
fn encode(value: &str) -> String {
    if value.contains(['"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

/// Two words joined by a space or a newline, optionally with a quote
/// character glued to the first word.
fn cell_value() -> impl Strategy<Value = String> {
    (word(), any::<bool>(), prop_oneof![Just(' '), Just('\n')], word()).prop_map(
        |(first, quoted, separator, second)| {
            let quote = if quoted { "\"" } else { "" };
            format!("{first}{quote}{separator}{second}")
        },
    )
}

#[test]
fn doubled_quotes_collapse_inside_a_quoted_cell() {
    let (_, rows) = read_all("Name\n\"say \"\"hi\"\" now\"\n");
    assert_eq!(rows[0][0].as_deref(), Some("say \"hi\" now"));
}

#[test]
fn quoted_newline_stays_in_the_cell() {
    let (header, rows) = read_all("Name\tNotes\nfirst\t\"line one\nline two\"\nsecond\tplain\n");
    assert_eq!(header, vec!["Name".to_string(), "Notes".to_string()]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1].as_deref(), Some("line one\nline two"));
    assert_eq!(rows[1][0].as_deref(), Some("second"));
}

#[test]
fn every_token_reports_its_boundary() {
    let mut tokenizer = Tokenizer::new("a\tb\nc".as_bytes());
    let mut boundaries = Vec::new();
    while let Some(token) = tokenizer.next_cell().expect("token") {
        boundaries.push(token.boundary);
    }
    assert_eq!(
        boundaries,
        vec![Boundary::Cell, Boundary::Line, Boundary::EndOfDocument]
    );
}

#[test]
fn blank_text_resolves_to_no_value() {
    assert_eq!(resolve_text("   "), None);
    assert_eq!(resolve_text("\"  \""), None);
    assert_eq!(resolve_text("  padded "), Some("padded".to_string()));
}

#[test]
fn a_lone_pair_of_quotes_reads_as_one_quote() {
    let (_, rows) = read_all("Name\tSize\n\"\"\t1\n");
    assert_eq!(rows[0][0].as_deref(), Some("\""));
}

proptest! {
    #[test]
    fn encoded_cells_read_back_unchanged(
        values in proptest::collection::vec(cell_value(), 1..5)
    ) {
        let header: Vec<String> = (0..values.len()).map(|i| format!("c{i}")).collect();
        let line: Vec<String> = values.iter().map(|value| encode(value)).collect();
        let input = format!("{}\n{}\n", header.join("\t"), line.join("\t"));

        let (read_header, rows) = read_all(&input);
        prop_assert_eq!(read_header, header);
        prop_assert_eq!(rows.len(), 1);
        let expected: Row = values.into_iter().map(Some).collect();
        prop_assert_eq!(&rows[0], &expected);
    }

    #[test]
    fn rows_take_the_header_width(
        width in 1usize..6,
        cells in proptest::collection::vec(word(), 1..9)
    ) {
        let header: Vec<String> = (0..width).map(|i| format!("h{i}")).collect();
        let input = format!("{}\n{}\n", header.join("\t"), cells.join("\t"));

        let (_, rows) = read_all(&input);
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(rows[0].len(), width);
        let expected = normalize_row(cells.into_iter().map(Some).collect(), width);
        prop_assert_eq!(&rows[0], &expected);
    }
}
