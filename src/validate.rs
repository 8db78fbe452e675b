use std::{
    collections::{BTreeMap, HashMap},
    sync::OnceLock,
};

use itertools::Itertools;
use log::{debug, warn};
use regex::Regex;

use crate::{
    data::{normalize_name, parse_card_number},
    error::{ImportError, ImportResult},
    grid::RowStore,
    mapping::{Header, ImportKind, Mapping},
    project::{Project, PropertyType, predefined_property},
    session::ImportOptions,
};

pub const MAX_PROPERTY_NAME_LENGTH: usize = 40;

fn invalid_name_characters() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[&=#;\[\]]").expect("property name pattern"))
}

pub fn duplicate_headers(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| normalize_name(name))
        .duplicates()
        .collect()
}

pub fn check_property_name(name: &str, kind: ImportKind) -> ImportResult<()> {
    let invalid = |reason: &str| ImportError::InvalidPropertyName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid("the name is blank"));
    }
    if trimmed.chars().count() > MAX_PROPERTY_NAME_LENGTH {
        return Err(invalid(&format!(
            "names are limited to {MAX_PROPERTY_NAME_LENGTH} characters"
        )));
    }
    if invalid_name_characters().is_match(trimmed) {
        return Err(invalid("names cannot contain &, =, #, ;, [ or ]"));
    }
    if let Some(predefined) = predefined_property(trimmed)
        && !(predefined.importable && kind == ImportKind::User)
    {
        return Err(invalid("it is a predefined property"));
    }
    Ok(())
}

pub fn new_property_columns<'h, P: Project + ?Sized>(
    header: &'h Header,
    project: &P,
) -> Vec<&'h Mapping> {
    header
        .mappings()
        .iter()
        .filter(|mapping| mapping.kind().property_type().is_some())
        .filter(|mapping| project.property(mapping.property_name()).is_none())
        .filter(|mapping| {
            !predefined_property(mapping.property_name())
                .is_some_and(|predefined| predefined.importable)
        })
        .unique_by(|mapping| normalize_name(mapping.property_name()))
        .collect()
}

pub fn validate<P: Project + ?Sized>(
    header: &Header,
    rows: &RowStore,
    project: &P,
    options: &ImportOptions,
) -> ImportResult<()> {
    let duplicates = duplicate_headers(&header.names());
    if !duplicates.is_empty() {
        return Err(ImportError::DuplicateHeaders(duplicates));
    }

    for kind in [
        ImportKind::Identifier,
        ImportKind::Name,
        ImportKind::TagList,
        ImportKind::CardType,
    ] {
        let columns: Vec<String> = header.of_kind(kind).map(|m| m.name().to_string()).collect();
        if columns.len() > 1 {
            return Err(ImportError::ConflictingMappings {
                kind: kind.describe().to_string(),
                columns,
            });
        }
    }

    if let Some(tree) = options.tree.as_deref()
        && project.tree(tree).is_none()
    {
        return Err(ImportError::UnknownTree(tree.to_string()));
    }

    for mapping in header.mappings().iter().filter(|m| m.kind().is_tree()) {
        let wanted = match mapping.kind() {
            ImportKind::TreeRelationship => PropertyType::TreeRelationship,
            _ => PropertyType::TreeBelonging,
        };
        let bound = project
            .property(mapping.property_name())
            .is_some_and(|definition| definition.property_type == wanted);
        if !bound {
            return Err(ImportError::UnknownTreeProperty {
                column: mapping.name().to_string(),
                kind: mapping.kind().describe().to_string(),
            });
        }
    }

    for mapping in new_property_columns(header, project) {
        check_property_name(mapping.property_name(), mapping.kind())?;
    }

    scan_rows(header, rows, project, options)
}

fn scan_rows<P: Project + ?Sized>(
    header: &Header,
    rows: &RowStore,
    project: &P,
    options: &ImportOptions,
) -> ImportResult<()> {
    let identifier = header.first_of(ImportKind::Identifier).map(Mapping::index);
    let card_type = header.first_of(ImportKind::CardType).map(Mapping::index);
    let length_checked: Vec<&Mapping> = header
        .mappings()
        .iter()
        .filter(|mapping| {
            !matches!(
                mapping.kind(),
                ImportKind::Description
                    | ImportKind::IncompleteChecklist
                    | ImportKind::CompletedChecklist
                    | ImportKind::Ignore
            )
        })
        .collect();

    let mut seen_numbers: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    let mut too_long = Vec::new();
    let mut new_card_types: HashMap<String, String> = HashMap::new();

    for row in rows.numbered()? {
        let (row_number, row) = row?;

        if let Some(value) = identifier.and_then(|column| row[column].as_deref()) {
            let number = parse_card_number(value).ok_or_else(|| ImportError::InvalidIdentifier {
                row: row_number,
                value: value.to_string(),
            })?;
            if number > options.max_identifier {
                return Err(ImportError::IdentifierTooLarge {
                    row: row_number,
                    number,
                    max: options.max_identifier,
                });
            }
            seen_numbers.entry(number).or_default().push(row_number);
        }

        for mapping in &length_checked {
            if let Some(value) = row[mapping.index()].as_deref()
                && value.chars().count() > options.max_field_length
            {
                too_long.push(format!("row {row_number} column '{}'", mapping.name()));
            }
        }

        if let Some(value) = card_type.and_then(|column| row[column].as_deref())
            && project.card_type(value).is_none()
        {
            new_card_types
                .entry(normalize_name(value))
                .or_insert_with(|| value.to_string());
        }
    }

    if let Some((number, rows)) = seen_numbers.into_iter().find(|(_, rows)| rows.len() > 1) {
        return Err(ImportError::DuplicateIdentifier { number, rows });
    }
    if !too_long.is_empty() {
        return Err(ImportError::FieldTooLong {
            limit: options.max_field_length,
            cells: too_long,
        });
    }
    if !new_card_types.is_empty() && !options.allow_new_card_types {
        let names = new_card_types.into_values().sorted().collect();
        return Err(ImportError::UnauthorizedCardTypes(names));
    }
    debug!("Validation passed for {} row(s)", rows.len());
    Ok(())
}

pub fn new_card_types<P: Project + ?Sized>(
    header: &Header,
    rows: &RowStore,
    project: &P,
) -> ImportResult<Vec<String>> {
    let Some(column) = header.first_of(ImportKind::CardType).map(Mapping::index) else {
        return Ok(Vec::new());
    };
    let mut found: HashMap<String, String> = HashMap::new();
    for row in rows.reader()? {
        let row = row?;
        if let Some(value) = row[column].as_deref()
            && project.card_type(value).is_none()
        {
            found
                .entry(normalize_name(value))
                .or_insert_with(|| value.to_string());
        }
    }
    Ok(found.into_values().sorted().collect())
}

pub fn collect_warnings<P: Project + ?Sized>(
    header: &Header,
    rows: &RowStore,
    project: &P,
    options: &ImportOptions,
) -> ImportResult<Vec<String>> {
    let mut warnings = Vec::new();

    match header.first_of(ImportKind::Name) {
        None => warnings.push(
            "No column is imported as the card name; every card will receive a generic one"
                .to_string(),
        ),
        Some(mapping) => {
            let unnamed = rows
                .reader()?
                .filter_map_ok(|row| row[mapping.index()].is_none().then_some(()))
                .process_results(|iter| iter.count())?;
            if unnamed > 0 {
                warnings.push(format!(
                    "{unnamed} row(s) have no name and will receive a generic one"
                ));
            }
        }
    }

    if header.first_of(ImportKind::CardType).is_none() {
        warnings.push(format!(
            "No card type column found; new cards will be created as '{}'",
            project.default_card_type()
        ));
    }

    let duplicates = duplicate_headers(&header.names());
    if !duplicates.is_empty() {
        warnings.push(format!(
            "Duplicate column names: {}",
            duplicates.join(", ")
        ));
    }

    let selected_tree = options.tree.as_deref();
    for mapping in header.mappings().iter().filter(|m| m.kind().is_tree()) {
        let Some(tree) = mapping.tree() else { continue };
        if !selected_tree.is_some_and(|selected| selected.eq_ignore_ascii_case(tree)) {
            warnings.push(format!(
                "Property '{}' is only used by tree '{tree}' and will only be updated when importing into that tree",
                mapping.property_name()
            ));
        }
    }

    let calculated: Vec<&str> = existing_properties(header, project)
        .filter(|(_, property_type, _)| property_type.is_calculated())
        .map(|(name, _, _)| name)
        .collect();
    if !calculated.is_empty() {
        warnings.push(format!(
            "Cannot set values for formula or aggregate properties: {}",
            calculated.join(", ")
        ));
    }

    let transition_only: Vec<&str> = existing_properties(header, project)
        .filter(|(_, _, transition_only)| *transition_only)
        .map(|(name, _, _)| name)
        .collect();
    if !transition_only.is_empty() {
        warnings.push(format!(
            "Properties can only be changed by transitions and will not be imported: {}",
            transition_only.join(", ")
        ));
    }

    if let Some(tree) = selected_tree {
        let group = header
            .tree_groups(project)
            .into_iter()
            .find(|group| group.tree.eq_ignore_ascii_case(tree));
        match group {
            None => warnings.push(format!(
                "No columns describe tree '{tree}'; cards will be added to it without parents"
            )),
            Some(group) if !group.is_complete() => warnings.push(format!(
                "Columns for tree '{tree}' are incomplete; missing: {}",
                group.missing.join(", ")
            )),
            Some(_) => {}
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(warnings)
}

fn existing_properties<'h, P: Project + ?Sized>(
    header: &'h Header,
    project: &'h P,
) -> impl Iterator<Item = (&'h str, PropertyType, bool)> {
    header.mappings().iter().filter_map(move |mapping| {
        let definition = project.property(mapping.existing_property()?)?;
        Some((
            definition.name.as_str(),
            definition.property_type,
            definition.transition_only,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_ignore_case_and_inner_spacing() {
        assert_eq!(
            duplicate_headers(&["Due Date", "Status", "due  date", ""]),
            vec!["due date".to_string()]
        );
        assert!(duplicate_headers(&["Name", "Status", "", ""]).is_empty());
    }

    #[test]
    fn property_names_reject_reserved_characters() {
        assert!(check_property_name("Status", ImportKind::EnumeratedList).is_ok());
        assert!(check_property_name("Size [pts]", ImportKind::FreeNumeric).is_err());
        assert!(check_property_name(&"x".repeat(41), ImportKind::FreeText).is_err());
    }

    #[test]
    fn predefined_names_are_protected_unless_importable() {
        assert!(check_property_name("Created on", ImportKind::Date).is_err());
        assert!(check_property_name("Created by", ImportKind::User).is_ok());
        assert!(check_property_name("Created by", ImportKind::FreeText).is_err());
    }
}
