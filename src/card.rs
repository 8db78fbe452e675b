use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{data::PropertyValue, error::PropertyValueError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    #[default]
    New,
    Populated,
    Erred,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub number: u64,
    pub name: String,
    pub card_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default)]
    pub state: CardState,
    #[serde(default)]
    pub is_new: bool,
}

impl Card {
    pub fn new(number: u64, card_type: impl Into<String>) -> Self {
        Self {
            number,
            name: String::new(),
            card_type: card_type.into(),
            description: None,
            properties: BTreeMap::new(),
            tags: Vec::new(),
            checklist: Vec::new(),
            errors: Vec::new(),
            state: CardState::New,
            is_new: true,
        }
    }

    pub fn generic_name(number: u64) -> String {
        format!("Card #{number}")
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, value: Option<PropertyValue>) {
        match value {
            Some(value) => {
                self.properties.insert(name.to_string(), value);
            }
            None => {
                self.properties.remove(name);
            }
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn add_checklist_item(&mut self, text: &str, completed: bool) {
        self.checklist.push(ChecklistItem {
            text: text.to_string(),
            completed,
        });
    }

    pub fn record_error(&mut self, error: &PropertyValueError) {
        self.errors.push(error.to_string());
        self.state = CardState::Erred;
    }

    pub fn mark_populated(&mut self) {
        if self.state != CardState::Erred {
            self.state = CardState::Populated;
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
