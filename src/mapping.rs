//! Column mappings: what each column of the pasted table becomes.
//!
//! Every header column is resolved left to right. A caller override wins
//! outright; otherwise a reserved field name or an existing property of the
//! same name decides the kind; otherwise the ranked heuristic rules in
//! [`HEURISTIC_RULES`] are tried top to bottom, first match wins. A final
//! guard demotes guessed identifier/name/type/tag columns that would collide
//! with a column already claiming that field.

use std::{collections::HashSet, fmt, str::FromStr};

use heck::ToSnakeCase;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::normalize_name,
    error::ImportError,
    heuristics::{Heuristics, Selector, Shape},
    project::{Project, PropertyType, predefined_property},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Identifier,
    Name,
    Description,
    #[serde(rename = "tags")]
    TagList,
    CardType,
    EnumeratedList,
    FreeText,
    FreeNumeric,
    NumericList,
    Date,
    User,
    CardRelationship,
    TreeRelationship,
    TreeBelonging,
    IncompleteChecklist,
    CompletedChecklist,
    Ignore,
}

const ALL_KINDS: [ImportKind; 17] = [
    ImportKind::Identifier,
    ImportKind::Name,
    ImportKind::Description,
    ImportKind::TagList,
    ImportKind::CardType,
    ImportKind::EnumeratedList,
    ImportKind::FreeText,
    ImportKind::FreeNumeric,
    ImportKind::NumericList,
    ImportKind::Date,
    ImportKind::User,
    ImportKind::CardRelationship,
    ImportKind::TreeRelationship,
    ImportKind::TreeBelonging,
    ImportKind::IncompleteChecklist,
    ImportKind::CompletedChecklist,
    ImportKind::Ignore,
];

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Identifier => "identifier",
            ImportKind::Name => "name",
            ImportKind::Description => "description",
            ImportKind::TagList => "tags",
            ImportKind::CardType => "card_type",
            ImportKind::EnumeratedList => "enumerated_list",
            ImportKind::FreeText => "free_text",
            ImportKind::FreeNumeric => "free_numeric",
            ImportKind::NumericList => "numeric_list",
            ImportKind::Date => "date",
            ImportKind::User => "user",
            ImportKind::CardRelationship => "card_relationship",
            ImportKind::TreeRelationship => "tree_relationship",
            ImportKind::TreeBelonging => "tree_belonging",
            ImportKind::IncompleteChecklist => "incomplete_checklist",
            ImportKind::CompletedChecklist => "completed_checklist",
            ImportKind::Ignore => "ignore",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ImportKind::Identifier => "card number",
            ImportKind::Name => "card name",
            ImportKind::Description => "card description",
            ImportKind::TagList => "tags",
            ImportKind::CardType => "card type",
            ImportKind::EnumeratedList => "managed text list",
            ImportKind::FreeText => "any text",
            ImportKind::FreeNumeric => "any number",
            ImportKind::NumericList => "managed number list",
            ImportKind::Date => "date",
            ImportKind::User => "team member",
            ImportKind::CardRelationship => "card",
            ImportKind::TreeRelationship => "tree relationship",
            ImportKind::TreeBelonging => "tree membership",
            ImportKind::IncompleteChecklist => "incomplete checklist items",
            ImportKind::CompletedChecklist => "completed checklist items",
            ImportKind::Ignore => "(ignore)",
        }
    }

    pub fn options() -> Vec<ImportKind> {
        ALL_KINDS
            .iter()
            .copied()
            .filter(|kind| *kind != ImportKind::Ignore)
            .chain(std::iter::once(ImportKind::Ignore))
            .collect()
    }

    /// Kinds at most one column may claim.
    pub fn is_unique(self) -> bool {
        matches!(
            self,
            ImportKind::Identifier | ImportKind::Name | ImportKind::CardType | ImportKind::TagList
        )
    }

    pub fn is_property(self) -> bool {
        matches!(
            self,
            ImportKind::EnumeratedList
                | ImportKind::FreeText
                | ImportKind::FreeNumeric
                | ImportKind::NumericList
                | ImportKind::Date
                | ImportKind::User
                | ImportKind::CardRelationship
                | ImportKind::TreeRelationship
                | ImportKind::TreeBelonging
        )
    }

    pub fn is_tree(self) -> bool {
        matches!(self, ImportKind::TreeRelationship | ImportKind::TreeBelonging)
    }

    pub fn property_type(self) -> Option<PropertyType> {
        match self {
            ImportKind::EnumeratedList => Some(PropertyType::ManagedText),
            ImportKind::FreeText => Some(PropertyType::FreeText),
            ImportKind::FreeNumeric => Some(PropertyType::FreeNumber),
            ImportKind::NumericList => Some(PropertyType::ManagedNumber),
            ImportKind::Date => Some(PropertyType::Date),
            ImportKind::User => Some(PropertyType::User),
            ImportKind::CardRelationship => Some(PropertyType::Card),
            _ => None,
        }
    }

    pub fn for_property_type(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::ManagedText => ImportKind::EnumeratedList,
            PropertyType::FreeText => ImportKind::FreeText,
            PropertyType::ManagedNumber => ImportKind::NumericList,
            PropertyType::FreeNumber => ImportKind::FreeNumeric,
            PropertyType::Date => ImportKind::Date,
            PropertyType::User => ImportKind::User,
            PropertyType::Formula | PropertyType::Aggregate => ImportKind::Ignore,
            PropertyType::Card => ImportKind::CardRelationship,
            PropertyType::TreeRelationship => ImportKind::TreeRelationship,
            PropertyType::TreeBelonging => ImportKind::TreeBelonging,
        }
    }

    pub fn for_reserved_name(name: &str) -> Option<Self> {
        match normalize_name(name).as_str() {
            "number" | "#" => Some(ImportKind::Identifier),
            "name" => Some(ImportKind::Name),
            "description" => Some(ImportKind::Description),
            "type" => Some(ImportKind::CardType),
            "tags" => Some(ImportKind::TagList),
            "incomplete checklist items" => Some(ImportKind::IncompleteChecklist),
            "completed checklist items" => Some(ImportKind::CompletedChecklist),
            _ => None,
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let token = value.trim().to_snake_case();
        let kind = match token.as_str() {
            "number" | "card_number" => ImportKind::Identifier,
            "type" => ImportKind::CardType,
            "tag_list" => ImportKind::TagList,
            "text_list" | "managed_text" => ImportKind::EnumeratedList,
            "any_text" => ImportKind::FreeText,
            "any_number" => ImportKind::FreeNumeric,
            "card" => ImportKind::CardRelationship,
            other => ALL_KINDS
                .iter()
                .copied()
                .find(|kind| kind.as_str() == other)
                .ok_or_else(|| ImportError::UnknownKind(value.to_string()))?,
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    Override,
    ReservedName,
    ExistingProperty,
    Heuristic,
    BlankHeader,
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MappingSource::Override => "override",
            MappingSource::ReservedName => "reserved name",
            MappingSource::ExistingProperty => "existing property",
            MappingSource::Heuristic => "guessed",
            MappingSource::BlankHeader => "blank header",
        };
        f.write_str(label)
    }
}

/// Ranked rules, evaluated top to bottom; the first that holds decides.
pub const HEURISTIC_RULES: &[(Selector, Shape, ImportKind)] = &[
    (Selector::OnlyFirstColumn, Shape::CardNumber, ImportKind::Identifier),
    (Selector::FirstNonEmptyColumn, Shape::ShortText, ImportKind::Name),
    (Selector::FullyMatches, Shape::Blank, ImportKind::EnumeratedList),
    (Selector::Diverse, Shape::Number, ImportKind::FreeNumeric),
    (Selector::FullyMatches, Shape::Number, ImportKind::NumericList),
    (Selector::FullyMatches, Shape::Date, ImportKind::Date),
    (Selector::Diverse, Shape::ShortText, ImportKind::FreeText),
    (Selector::Contains, Shape::Verbose, ImportKind::Description),
];

pub fn guess_kind(heuristics: &Heuristics, index: usize) -> ImportKind {
    HEURISTIC_RULES
        .iter()
        .find(|(selector, shape, _)| heuristics.matches(index, *selector, *shape))
        .map(|(_, _, kind)| *kind)
        .unwrap_or(ImportKind::EnumeratedList)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapping {
    name: String,
    index: usize,
    kind: ImportKind,
    source: MappingSource,
    property: Option<String>,
    tree: Option<String>,
}

impl Mapping {
    fn new(name: &str, index: usize, kind: ImportKind, source: MappingSource) -> Self {
        Self {
            name: name.to_string(),
            index,
            kind,
            source,
            property: None,
            tree: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> ImportKind {
        self.kind
    }

    pub fn source(&self) -> MappingSource {
        self.source
    }

    pub fn existing_property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    pub fn property_name(&self) -> &str {
        self.property.as_deref().unwrap_or(&self.name)
    }

    pub fn tree(&self) -> Option<&str> {
        self.tree.as_deref()
    }

    pub fn column(&self) -> Column {
        Column {
            index: self.index,
            tree: self.tree.clone(),
        }
    }

    /// Replaces the kind and rebinds the column to the project property of
    /// the same name, as an override given up front would.
    pub fn override_kind<P: Project + ?Sized>(&mut self, kind: ImportKind, project: &P) {
        self.kind = kind;
        self.source = MappingSource::Override;
        self.property = None;
        self.tree = None;
        if kind.is_property() {
            self.bind_property(project);
        }
    }

    fn bind_property<P: Project + ?Sized>(&mut self, project: &P) {
        if let Some(definition) = project.property(&self.name) {
            self.property = Some(definition.name.clone());
            self.tree = definition.tree.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub tree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeColumnGroup {
    pub tree: String,
    pub columns: Vec<Column>,
    pub missing: Vec<String>,
}

impl TreeColumnGroup {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    mappings: Vec<Mapping>,
}

impl Header {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self { mappings }
    }

    pub fn resolve<P: Project + ?Sized>(
        names: &[String],
        heuristics: &Heuristics,
        project: &P,
        overrides: &[Option<ImportKind>],
    ) -> Self {
        let mappings = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let override_kind = overrides.get(index).copied().flatten();
                resolve_column(name, index, heuristics, project, override_kind)
            })
            .collect();
        let mut header = Self { mappings };
        header.demote_colliding_guesses();
        for mapping in &header.mappings {
            debug!(
                "Column {} '{}' -> {} ({})",
                mapping.index, mapping.name, mapping.kind, mapping.source
            );
        }
        header
    }

    fn demote_colliding_guesses(&mut self) {
        let reserved_headers: HashSet<ImportKind> = self
            .mappings
            .iter()
            .filter_map(|mapping| ImportKind::for_reserved_name(&mapping.name))
            .filter(|kind| kind.is_unique())
            .collect();
        let mut claimed: HashSet<ImportKind> = self
            .mappings
            .iter()
            .filter(|mapping| mapping.source != MappingSource::Heuristic)
            .map(|mapping| mapping.kind)
            .filter(|kind| kind.is_unique())
            .collect();
        for mapping in &mut self.mappings {
            if mapping.source != MappingSource::Heuristic || !mapping.kind.is_unique() {
                continue;
            }
            if claimed.contains(&mapping.kind) || reserved_headers.contains(&mapping.kind) {
                debug!(
                    "Column '{}' also looks like {}; importing it as {}",
                    mapping.name,
                    mapping.kind.describe(),
                    ImportKind::EnumeratedList.describe()
                );
                mapping.kind = ImportKind::EnumeratedList;
            } else {
                claimed.insert(mapping.kind);
            }
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn width(&self) -> usize {
        self.mappings.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.mappings.iter().map(Mapping::name).collect()
    }

    pub fn mapping(&self, index: usize) -> Option<&Mapping> {
        self.mappings.get(index)
    }

    pub fn of_kind(&self, kind: ImportKind) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter().filter(move |mapping| mapping.kind == kind)
    }

    pub fn first_of(&self, kind: ImportKind) -> Option<&Mapping> {
        self.of_kind(kind).next()
    }

    pub fn override_kind<P: Project + ?Sized>(
        &mut self,
        index: usize,
        kind: ImportKind,
        project: &P,
    ) -> bool {
        match self.mappings.get_mut(index) {
            Some(mapping) => {
                mapping.override_kind(kind, project);
                true
            }
            None => false,
        }
    }

    pub fn columns(&self) -> Vec<Column> {
        self.mappings.iter().map(Mapping::column).collect()
    }

    pub fn tree_groups<P: Project + ?Sized>(&self, project: &P) -> Vec<TreeColumnGroup> {
        let mut trees: Vec<&str> = Vec::new();
        for mapping in &self.mappings {
            if let Some(tree) = mapping.tree()
                && mapping.kind.is_tree()
                && !trees.iter().any(|seen| seen.eq_ignore_ascii_case(tree))
            {
                trees.push(tree);
            }
        }
        trees
            .into_iter()
            .map(|tree| {
                let members: Vec<&Mapping> = self
                    .mappings
                    .iter()
                    .filter(|mapping| {
                        mapping.kind.is_tree()
                            && mapping.tree().is_some_and(|t| t.eq_ignore_ascii_case(tree))
                    })
                    .collect();
                let missing = project
                    .tree_properties(tree)
                    .into_iter()
                    .filter(|definition| definition.property_type == PropertyType::TreeRelationship)
                    .filter(|definition| {
                        !members.iter().any(|mapping| {
                            normalize_name(mapping.property_name()) == normalize_name(&definition.name)
                        })
                    })
                    .map(|definition| definition.name.clone())
                    .collect();
                TreeColumnGroup {
                    tree: tree.to_string(),
                    columns: members.iter().map(|mapping| mapping.column()).collect(),
                    missing,
                }
            })
            .collect()
    }
}

fn resolve_column<P: Project + ?Sized>(
    name: &str,
    index: usize,
    heuristics: &Heuristics,
    project: &P,
    override_kind: Option<ImportKind>,
) -> Mapping {
    if let Some(kind) = override_kind {
        let mut mapping = Mapping::new(name, index, kind, MappingSource::Override);
        if kind.is_property() {
            mapping.bind_property(project);
        }
        return mapping;
    }
    if name.trim().is_empty() {
        return Mapping::new(name, index, ImportKind::Ignore, MappingSource::BlankHeader);
    }
    if let Some(kind) = ImportKind::for_reserved_name(name) {
        return Mapping::new(name, index, kind, MappingSource::ReservedName);
    }
    if let Some(definition) = project.property(name) {
        let kind = ImportKind::for_property_type(definition.property_type);
        let mut mapping = Mapping::new(name, index, kind, MappingSource::ExistingProperty);
        mapping.property = Some(definition.name.clone());
        mapping.tree = definition.tree.clone();
        return mapping;
    }
    if let Some(predefined) = predefined_property(name) {
        let kind = if predefined.importable {
            ImportKind::User
        } else {
            ImportKind::Ignore
        };
        let mut mapping = Mapping::new(name, index, kind, MappingSource::ReservedName);
        mapping.property = Some(predefined.name.to_string());
        return mapping;
    }
    Mapping::new(name, index, guess_kind(heuristics, index), MappingSource::Heuristic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heuristics::ColumnFacts,
        project::{InMemoryProject, PropertyDefinition, TreeConfiguration},
        tokenizer::Cell,
    };

    fn facts(columns: &[&[Option<&str>]]) -> Heuristics {
        Heuristics::from_facts(
            columns
                .iter()
                .enumerate()
                .map(|(index, values)| {
                    let cells: Vec<Cell> = values.iter().map(|v| v.map(str::to_string)).collect();
                    ColumnFacts::from_values(index, &cells)
                })
                .collect(),
        )
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn kinds_parse_from_loose_tokens() {
        assert_eq!("Free Numeric".parse::<ImportKind>().unwrap(), ImportKind::FreeNumeric);
        assert_eq!("treeRelationship".parse::<ImportKind>().unwrap(), ImportKind::TreeRelationship);
        assert_eq!("tags".parse::<ImportKind>().unwrap(), ImportKind::TagList);
        assert!("sparkles".parse::<ImportKind>().is_err());
    }

    #[test]
    fn options_end_with_ignore() {
        let options = ImportKind::options();
        assert_eq!(options.len(), 17);
        assert_eq!(options.last(), Some(&ImportKind::Ignore));
        assert_eq!(options.iter().filter(|k| **k == ImportKind::Ignore).count(), 1);
    }

    #[test]
    fn guesses_follow_rule_precedence() {
        let heuristics = facts(&[
            &[Some("1"), Some("2"), Some("3"), Some("4")],
            &[Some("Login"), Some("Logout"), Some("Signup"), Some("Reset")],
            &[None, None, None, None],
            &[Some("3"), Some("7"), Some("12"), Some("5")],
            &[Some("3"), Some("3"), Some("7"), Some("7")],
            &[Some("2024-01-01"), None, Some("2024-02-01"), None],
            &[Some("red"), Some("blue"), Some("green"), Some("pink")],
            &[None, Some("A sentence that easily runs past forty characters."), None, None],
            &[Some("High"), Some("High"), Some("Low"), Some("Low")],
        ]);
        let guessed: Vec<ImportKind> = (0..9).map(|i| guess_kind(&heuristics, i)).collect();
        assert_eq!(
            guessed,
            vec![
                ImportKind::Identifier,
                ImportKind::Name,
                ImportKind::EnumeratedList,
                ImportKind::FreeNumeric,
                ImportKind::NumericList,
                ImportKind::Date,
                ImportKind::FreeText,
                ImportKind::Description,
                ImportKind::EnumeratedList,
            ]
        );
    }

    #[test]
    fn reserved_and_existing_names_skip_heuristics() {
        let project = InMemoryProject::new()
            .with_property(PropertyDefinition::new("Estimate", PropertyType::ManagedNumber))
            .with_property(PropertyDefinition::new("Velocity", PropertyType::Formula));
        let heuristics = facts(&[&[Some("a")], &[Some("x")], &[Some("1")], &[Some("2")]]);
        let header = Header::resolve(
            &names(&["NAME", "type", "estimate", "Velocity"]),
            &heuristics,
            &project,
            &[],
        );
        let kinds: Vec<_> = header.mappings().iter().map(Mapping::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ImportKind::Name,
                ImportKind::CardType,
                ImportKind::NumericList,
                ImportKind::Ignore
            ]
        );
        assert_eq!(header.mappings()[2].property_name(), "Estimate");
        assert_eq!(header.mappings()[2].source(), MappingSource::ExistingProperty);
    }

    #[test]
    fn overrides_win_verbatim() {
        let project = InMemoryProject::new();
        let heuristics = facts(&[&[Some("1")], &[Some("Login")]]);
        let header = Header::resolve(
            &names(&["Ticket", "Title"]),
            &heuristics,
            &project,
            &[Some(ImportKind::Ignore), None],
        );
        assert_eq!(header.mappings()[0].kind(), ImportKind::Ignore);
        assert_eq!(header.mappings()[0].source(), MappingSource::Override);
        assert_eq!(header.mappings()[1].kind(), ImportKind::Name);
    }

    #[test]
    fn guessed_name_yields_to_literal_name_header() {
        let project = InMemoryProject::new();
        let heuristics = facts(&[&[Some("Login")], &[Some("Real name")]]);
        let header = Header::resolve(&names(&["Title", "Name"]), &heuristics, &project, &[]);
        assert_eq!(header.mappings()[0].kind(), ImportKind::EnumeratedList);
        assert_eq!(header.mappings()[1].kind(), ImportKind::Name);
    }

    #[test]
    fn blank_header_cells_are_ignored() {
        let header = Header::resolve(
            &names(&["Name", ""]),
            &facts(&[&[Some("a")], &[Some("b")]]),
            &InMemoryProject::new(),
            &[],
        );
        assert_eq!(header.mappings()[1].kind(), ImportKind::Ignore);
        assert_eq!(header.mappings()[1].source(), MappingSource::BlankHeader);
    }

    #[test]
    fn tree_groups_report_missing_relationships() {
        let project = InMemoryProject::new()
            .with_property(
                PropertyDefinition::new("Planning - Release", PropertyType::TreeRelationship)
                    .in_tree("Planning"),
            )
            .with_property(
                PropertyDefinition::new("Planning - Iteration", PropertyType::TreeRelationship)
                    .in_tree("Planning"),
            )
            .with_tree(TreeConfiguration {
                name: "Planning".to_string(),
                card_types: vec!["Release".into(), "Iteration".into(), "Story".into()],
            });
        let header = Header::resolve(
            &names(&["Name", "Planning - Release"]),
            &facts(&[&[Some("a")], &[Some("#1")]]),
            &project,
            &[],
        );
        let groups = header.tree_groups(&project);
        assert_eq!(groups.len(), 1);
        assert!(!groups[0].is_complete());
        assert_eq!(groups[0].missing, vec!["Planning - Iteration".to_string()]);
        assert_eq!(header.columns()[1].tree.as_deref(), Some("Planning"));
    }

    #[test]
    fn late_overrides_bind_like_early_ones() {
        let project = InMemoryProject::new().with_property(
            PropertyDefinition::new("Planning - Release", PropertyType::TreeRelationship)
                .in_tree("Planning"),
        );
        let mut header = Header::resolve(
            &names(&["Name", "planning - release"]),
            &facts(&[&[Some("a")], &[Some("#1")]]),
            &project,
            &[None, Some(ImportKind::Ignore)],
        );
        assert_eq!(header.mappings()[1].tree(), None);

        assert!(header.override_kind(1, ImportKind::TreeRelationship, &project));
        let mapping = &header.mappings()[1];
        assert_eq!(mapping.tree(), Some("Planning"));
        assert_eq!(mapping.property_name(), "Planning - Release");
        assert_eq!(mapping.source(), MappingSource::Override);

        assert!(header.override_kind(1, ImportKind::Ignore, &project));
        assert_eq!(header.mappings()[1].tree(), None);
        assert_eq!(header.mappings()[1].existing_property(), None);
    }
}
