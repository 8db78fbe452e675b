use std::{fs::File, io::BufReader, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    card::Card,
    data::normalize_name,
    error::{ImportError, ImportResult},
};

pub const DEFAULT_CARD_TYPE: &str = "Card";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    ManagedText,
    FreeText,
    ManagedNumber,
    FreeNumber,
    Date,
    User,
    Formula,
    Aggregate,
    Card,
    TreeRelationship,
    TreeBelonging,
}

impl PropertyType {
    pub fn is_calculated(self) -> bool {
        matches!(self, PropertyType::Formula | PropertyType::Aggregate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transition_only: bool,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            tree: None,
            transition_only: false,
        }
    }

    pub fn in_tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = Some(tree.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeConfiguration {
    pub name: String,
    pub card_types: Vec<String>,
}

impl TreeConfiguration {
    pub fn position(&self, card_type: &str) -> Option<usize> {
        self.card_types
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(card_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredefinedProperty {
    pub name: &'static str,
    pub importable: bool,
}

pub const PREDEFINED_PROPERTIES: &[PredefinedProperty] = &[
    PredefinedProperty { name: "Number", importable: false },
    PredefinedProperty { name: "Name", importable: false },
    PredefinedProperty { name: "Description", importable: false },
    PredefinedProperty { name: "Type", importable: false },
    PredefinedProperty { name: "Project", importable: false },
    PredefinedProperty { name: "Created on", importable: false },
    PredefinedProperty { name: "Modified on", importable: false },
    PredefinedProperty { name: "Created by", importable: true },
    PredefinedProperty { name: "Modified by", importable: true },
];

pub fn predefined_property(name: &str) -> Option<&'static PredefinedProperty> {
    let wanted = normalize_name(name);
    PREDEFINED_PROPERTIES
        .iter()
        .find(|predefined| normalize_name(predefined.name) == wanted)
}

pub trait Project {
    fn property(&self, name: &str) -> Option<&PropertyDefinition>;
    fn properties(&self) -> &[PropertyDefinition];
    fn create_property(&mut self, definition: PropertyDefinition) -> ImportResult<()>;

    fn card_types(&self) -> &[String];
    fn create_card_type(&mut self, name: &str) -> ImportResult<()>;
    fn default_card_type(&self) -> &str;

    fn tree(&self, name: &str) -> Option<&TreeConfiguration>;

    fn user(&self, login: &str) -> Option<&str>;

    fn find_card(&self, number: u64) -> Option<Card>;
    fn max_card_number(&self) -> u64;

    fn card_type(&self, name: &str) -> Option<&str> {
        let wanted = normalize_name(name);
        self.card_types()
            .iter()
            .find(|candidate| normalize_name(candidate) == wanted)
            .map(String::as_str)
    }

    fn tree_properties(&self, tree: &str) -> Vec<&PropertyDefinition> {
        self.properties()
            .iter()
            .filter(|definition| {
                definition
                    .tree
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(tree))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryProject {
    #[serde(default)]
    pub card_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_card_type: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub trees: Vec<TreeConfiguration>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl InMemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> ImportResult<Self> {
        let file = File::open(path)?;
        let project: Self = serde_yaml::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded project with {} propert(ies), {} card type(s), {} card(s)",
            project.properties.len(),
            project.card_types.len(),
            project.cards.len()
        );
        Ok(project)
    }

    pub fn save(&self, path: &Path) -> ImportResult<()> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn with_card_types<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.card_types.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_property(mut self, definition: PropertyDefinition) -> Self {
        self.properties.push(definition);
        self
    }

    pub fn with_tree(mut self, tree: TreeConfiguration) -> Self {
        self.trees.push(tree);
        self
    }

    pub fn with_users<I, S>(mut self, logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(logins.into_iter().map(Into::into));
        self
    }

    pub fn with_card(mut self, card: Card) -> Self {
        self.cards.push(card);
        self
    }

    pub fn store_card(&mut self, card: Card) {
        match self.cards.iter_mut().find(|existing| existing.number == card.number) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }
}

impl Project for InMemoryProject {
    fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        let wanted = normalize_name(name);
        self.properties
            .iter()
            .find(|definition| normalize_name(&definition.name) == wanted)
    }

    fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    fn create_property(&mut self, definition: PropertyDefinition) -> ImportResult<()> {
        if self.property(&definition.name).is_some() {
            return Err(ImportError::Schema(format!(
                "property '{}' already exists",
                definition.name
            )));
        }
        debug!(
            "Creating property '{}' as {:?}",
            definition.name, definition.property_type
        );
        self.properties.push(definition);
        Ok(())
    }

    fn card_types(&self) -> &[String] {
        &self.card_types
    }

    fn create_card_type(&mut self, name: &str) -> ImportResult<()> {
        if self.card_type(name).is_some() {
            return Err(ImportError::Schema(format!(
                "card type '{name}' already exists"
            )));
        }
        debug!("Creating card type '{name}'");
        self.card_types.push(name.to_string());
        Ok(())
    }

    fn default_card_type(&self) -> &str {
        self.default_card_type
            .as_deref()
            .or_else(|| self.card_types.first().map(String::as_str))
            .unwrap_or(DEFAULT_CARD_TYPE)
    }

    fn tree(&self, name: &str) -> Option<&TreeConfiguration> {
        let wanted = normalize_name(name);
        self.trees
            .iter()
            .find(|tree| normalize_name(&tree.name) == wanted)
    }

    fn user(&self, login: &str) -> Option<&str> {
        let wanted = login.trim();
        self.users
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    fn find_card(&self, number: u64) -> Option<Card> {
        self.cards.iter().find(|card| card.number == number).cloned()
    }

    fn max_card_number(&self) -> u64 {
        self.cards.iter().map(|card| card.number).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> InMemoryProject {
        InMemoryProject::new()
            .with_card_types(["Release", "Story"])
            .with_property(PropertyDefinition::new("Status", PropertyType::ManagedText))
            .with_property(
                PropertyDefinition::new("Planning - Release", PropertyType::TreeRelationship)
                    .in_tree("Planning"),
            )
            .with_tree(TreeConfiguration {
                name: "Planning".to_string(),
                card_types: vec!["Release".to_string(), "Story".to_string()],
            })
            .with_users(["alice"])
    }

    #[test]
    fn lookups_ignore_case_and_spacing() {
        let project = sample_project();
        assert_eq!(project.property("  status ").map(|p| p.name.as_str()), Some("Status"));
        assert_eq!(project.card_type("STORY"), Some("Story"));
        assert_eq!(project.card_types().to_vec(), vec!["Release".to_string(), "Story".to_string()]);
        assert_eq!(project.user("Alice"), Some("alice"));
        assert_eq!(project.tree("planning").map(|t| t.card_types.len()), Some(2));
    }

    #[test]
    fn creating_an_existing_property_fails() {
        let mut project = sample_project();
        let err = project
            .create_property(PropertyDefinition::new("STATUS", PropertyType::FreeText))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn default_card_type_falls_back_to_first_type() {
        assert_eq!(sample_project().default_card_type(), "Release");
        assert_eq!(InMemoryProject::new().default_card_type(), DEFAULT_CARD_TYPE);
    }

    #[test]
    fn tree_properties_filter_by_tree() {
        let project = sample_project();
        let names: Vec<_> = project
            .tree_properties("planning")
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Planning - Release"]);
    }

    #[test]
    fn predefined_lookup_reports_importability() {
        assert!(predefined_property("created BY").unwrap().importable);
        assert!(!predefined_property("Created on").unwrap().importable);
        assert!(predefined_property("Status").is_none());
    }

    #[test]
    fn storing_a_card_replaces_the_same_number() {
        let mut project = sample_project().with_card(Card::new(4, "Story"));
        let mut updated = Card::new(4, "Release");
        updated.name = "Renamed".to_string();
        project.store_card(updated);
        project.store_card(Card::new(9, "Story"));
        assert_eq!(project.cards.len(), 2);
        assert_eq!(project.find_card(4).map(|card| card.name), Some("Renamed".to_string()));
        assert_eq!(project.max_card_number(), 9);
    }
}
