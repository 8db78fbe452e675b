mod common;

use card_import::{
    mapping::{ImportKind, MappingSource},
    session::ImportOptions,
    table::mapping_table,
};

use common::{fixture_project, open_session, tsv};

fn kinds(session: &card_import::session::ImportSession) -> Vec<ImportKind> {
    session.header().mappings().iter().map(|m| m.kind()).collect()
}

#[test]
fn realistic_table_is_inferred_column_by_column() {
    let project = fixture_project();
    let input = tsv(&[
        &["Ticket", "Title", "Points", "Due", "Notes", "Priority", "", "Owner"],
        &[
            "#12",
            "Login page",
            "3",
            "2024-01-05",
            "Users need to sign in with their email address before anything else",
            "High",
            "x",
            "alice",
        ],
        &["#13", "Signup", "3", "2024-01-06", "", "Low", "", "bob"],
        &["#14", "Logout button", "8", "2024-01-05", "", "High", "", "alice"],
        &["#15", "Reset password", "8", "2024-02-01", "", "High", "", "bob"],
    ]);
    let session = open_session(&input, &project, ImportOptions::default());

    assert_eq!(
        kinds(&session),
        vec![
            ImportKind::Identifier,
            ImportKind::Name,
            ImportKind::NumericList,
            ImportKind::Date,
            ImportKind::Description,
            ImportKind::EnumeratedList,
            ImportKind::Ignore,
            ImportKind::User,
        ]
    );
    let header = session.header();
    assert_eq!(header.mapping(6).map(|m| m.source()), Some(MappingSource::BlankHeader));
    assert_eq!(
        header.mapping(7).map(|m| m.source()),
        Some(MappingSource::ExistingProperty)
    );
}

#[test]
fn diverse_numbers_are_free_numeric() {
    let project = fixture_project();
    let input = tsv(&[&["Title", "Size"], &["a", "3"], &["b", "7"], &["c", "12"]]);
    let session = open_session(&input, &project, ImportOptions::default());
    assert_eq!(kinds(&session), vec![ImportKind::Name, ImportKind::FreeNumeric]);
}

#[test]
fn reserved_names_beat_the_heuristics() {
    let project = fixture_project();
    let input = tsv(&[
        &["Name", "Number", "Type", "Tags", "Description"],
        &["Alpha", "7", "Story", "ui, login", "short"],
    ]);
    let session = open_session(&input, &project, ImportOptions::default());
    assert_eq!(
        kinds(&session),
        vec![
            ImportKind::Name,
            ImportKind::Identifier,
            ImportKind::CardType,
            ImportKind::TagList,
            ImportKind::Description,
        ]
    );
    assert!(
        session
            .header()
            .mappings()
            .iter()
            .all(|m| m.source() == MappingSource::ReservedName)
    );
}

#[test]
fn a_guessed_name_yields_to_the_literal_name_column() {
    let project = fixture_project();
    let input = tsv(&[&["Title", "Name"], &["Login", "Login page"], &["Signup", "Signup page"]]);
    let session = open_session(&input, &project, ImportOptions::default());
    assert_eq!(kinds(&session), vec![ImportKind::EnumeratedList, ImportKind::Name]);
}

#[test]
fn positional_overrides_win_and_gaps_keep_inference() {
    let project = fixture_project();
    let input = tsv(&[&["Title", "Points", "Notes"], &["Login", "3", "hello"]]);
    let options = ImportOptions {
        overrides: vec![None, Some(ImportKind::FreeText)],
        ..ImportOptions::default()
    };
    let mut session = open_session(&input, &project, options);
    assert_eq!(session.header().mapping(0).map(|m| m.kind()), Some(ImportKind::Name));
    assert_eq!(
        session.header().mapping(1).map(|m| (m.kind(), m.source())),
        Some((ImportKind::FreeText, MappingSource::Override))
    );

    assert!(session.override_kind(2, ImportKind::Ignore, &project));
    assert!(!session.override_kind(9, ImportKind::Ignore, &project));
    assert_eq!(session.header().mapping(2).map(|m| m.kind()), Some(ImportKind::Ignore));
}

#[test]
fn tree_columns_bind_to_their_tree() {
    let project = fixture_project();
    let input = tsv(&[
        &["Name", "Planning - Release", "Planning"],
        &["Story one", "#2", "yes"],
    ]);
    let session = open_session(&input, &project, ImportOptions::default());
    let header = session.header();
    assert_eq!(
        header.mapping(1).map(|m| (m.kind(), m.tree())),
        Some((ImportKind::TreeRelationship, Some("Planning")))
    );
    let groups = header.tree_groups(&project);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].missing, vec!["Planning - Iteration".to_string()]);
    assert!(!groups[0].is_complete());
}

#[test]
fn mapping_table_shows_kind_source_and_sample() {
    let project = fixture_project();
    let input = tsv(&[&["Number", "Status"], &["4", "Open"]]);
    let session = open_session(&input, &project, ImportOptions::default());
    let row = session.row(0).expect("row");
    let rendered = mapping_table(session.header(), Some(row.as_slice())).render();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[2].contains("card number"));
    assert!(lines[2].contains("reserved name"));
    assert!(lines[3].contains("managed text list"));
    assert!(lines[3].contains("existing property"));
    assert!(lines[3].ends_with("Open"));
}
