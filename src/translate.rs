use log::{debug, info, trace};

use crate::{
    card::{Card, CardState},
    data::{
        PropertyValue, parse_belonging, parse_card_number, parse_card_reference, parse_naive_date,
        parse_number,
    },
    error::{ImportError, ImportResult, PropertyValueError},
    grid::{RowStore, RowStoreReader},
    mapping::{Header, ImportKind, Mapping},
    project::{Project, PropertyDefinition, PropertyType, TreeConfiguration},
    tokenizer::Row,
    validate::{new_card_types, new_property_columns},
};

pub const DESCRIPTION_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChanges {
    pub properties: Vec<String>,
    pub card_types: Vec<String>,
}

impl SchemaChanges {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.card_types.is_empty()
    }
}

pub(crate) fn prepare_schema<P: Project + ?Sized>(
    header: &Header,
    rows: &RowStore,
    project: &mut P,
) -> ImportResult<SchemaChanges> {
    let mut changes = SchemaChanges::default();
    let planned: Vec<(String, PropertyType)> = new_property_columns(header, project)
        .into_iter()
        .filter_map(|mapping| {
            let property_type = mapping.kind().property_type()?;
            Some((mapping.property_name().trim().to_string(), property_type))
        })
        .collect();
    for (name, property_type) in planned {
        project.create_property(PropertyDefinition::new(name.clone(), property_type))?;
        changes.properties.push(name);
    }
    for card_type in new_card_types(header, rows, project)? {
        project.create_card_type(&card_type)?;
        changes.card_types.push(card_type);
    }
    if !changes.is_empty() {
        info!(
            "Created {} propert(ies) and {} card type(s) before translation",
            changes.properties.len(),
            changes.card_types.len()
        );
    }
    Ok(changes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPlan {
    order: Vec<usize>,
    numbers: Vec<u64>,
}

impl TranslationPlan {
    pub(crate) fn build<P: Project + ?Sized>(
        header: &Header,
        rows: &RowStore,
        project: &P,
        tree: Option<&TreeConfiguration>,
    ) -> ImportResult<Self> {
        let identifier = header.first_of(ImportKind::Identifier).map(Mapping::index);
        let card_type = header.first_of(ImportKind::CardType).map(Mapping::index);

        let mut explicit = Vec::with_capacity(rows.len());
        let mut types = Vec::with_capacity(rows.len());
        for row in rows.reader()? {
            let row = row?;
            explicit.push(
                identifier
                    .and_then(|column| row[column].as_deref())
                    .and_then(parse_card_number),
            );
            types.push(card_type.and_then(|column| row[column].clone()));
        }

        let highest = explicit
            .iter()
            .flatten()
            .copied()
            .max()
            .unwrap_or(0)
            .max(project.max_card_number());
        let mut last = highest;
        let mut numbers = Vec::with_capacity(explicit.len());
        for number in explicit {
            let number = match number {
                Some(number) => number,
                None => {
                    last = last
                        .checked_add(1)
                        .ok_or(ImportError::CardNumbersExhausted(last))?;
                    last
                }
            };
            numbers.push(number);
        }

        let mut order: Vec<usize> = (0..numbers.len()).collect();
        if let Some(tree) = tree {
            let positions: Vec<usize> = numbers
                .iter()
                .zip(&types)
                .map(|(number, explicit_type)| {
                    let effective = match explicit_type {
                        Some(name) => Some(name.clone()),
                        None => project
                            .find_card(*number)
                            .map(|card| card.card_type)
                            .or_else(|| Some(project.default_card_type().to_string())),
                    };
                    effective
                        .and_then(|name| tree.position(&name))
                        .unwrap_or(usize::MAX)
                })
                .collect();
            order.sort_by_key(|index| positions[*index]);
            debug!("Ordered {} row(s) by level in tree '{}'", order.len(), tree.name);
        }
        Ok(Self { order, numbers })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn number(&self, row_index: usize) -> Option<u64> {
        self.numbers.get(row_index).copied()
    }
}

pub struct RowTranslator<'a, P: Project + ?Sized> {
    header: &'a Header,
    project: &'a P,
    tree: Option<&'a TreeConfiguration>,
}

impl<'a, P: Project + ?Sized> RowTranslator<'a, P> {
    pub(crate) fn new(
        header: &'a Header,
        project: &'a P,
        tree: Option<&'a TreeConfiguration>,
    ) -> Self {
        Self {
            header,
            project,
            tree,
        }
    }

    fn cell<'r>(&self, row: &'r Row, kind: ImportKind) -> Option<&'r str> {
        self.header
            .first_of(kind)
            .and_then(|mapping| row.get(mapping.index()))
            .and_then(|cell| cell.as_deref())
    }

    fn cells<'r>(&'r self, row: &'r Row, kind: ImportKind) -> impl Iterator<Item = &'r str> {
        self.header
            .of_kind(kind)
            .filter_map(move |mapping| row.get(mapping.index()).and_then(|cell| cell.as_deref()))
    }

    pub fn translate(&self, row: &Row, number: u64) -> Card {
        let mut card = match self.project.find_card(number) {
            Some(mut existing) => {
                existing.is_new = false;
                existing.state = CardState::New;
                existing.errors.clear();
                existing
            }
            None => Card::new(number, self.project.default_card_type()),
        };

        if let Some(card_type) = self.cell(row, ImportKind::CardType) {
            card.card_type = self
                .project
                .card_type(card_type)
                .unwrap_or(card_type)
                .to_string();
        }

        match self.cell(row, ImportKind::Name) {
            Some(name) => card.name = name.to_string(),
            None if card.name.is_empty() => card.name = Card::generic_name(number),
            None => {}
        }

        let description: Vec<&str> = self.cells(row, ImportKind::Description).collect();
        if !description.is_empty() {
            card.description = Some(description.join(DESCRIPTION_SEPARATOR));
        }

        if let Some(tags) = self.cell(row, ImportKind::TagList) {
            for tag in tags.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
                card.add_tag(tag);
            }
        }

        for (kind, completed) in [
            (ImportKind::IncompleteChecklist, false),
            (ImportKind::CompletedChecklist, true),
        ] {
            if let Some(items) = self.cell(row, kind) {
                for item in items.lines().map(str::trim).filter(|item| !item.is_empty()) {
                    card.add_checklist_item(item, completed);
                }
            }
        }

        for mapping in self.header.mappings() {
            if mapping.kind().is_property() {
                self.apply_property(&mut card, mapping, row);
            }
        }
        self.join_selected_tree(&mut card);

        card.mark_populated();
        trace!("Translated card #{} ({:?})", card.number, card.state);
        card
    }

    fn in_selected_tree(&self, mapping: &Mapping) -> bool {
        match (self.tree, mapping.tree()) {
            (Some(selected), Some(tree)) => selected.name.eq_ignore_ascii_case(tree),
            _ => false,
        }
    }

    fn apply_property(&self, card: &mut Card, mapping: &Mapping, row: &Row) {
        if mapping.kind().is_tree() && !self.in_selected_tree(mapping) {
            return;
        }
        let name = mapping.property_name();
        if let Some(definition) = self.project.property(name)
            && (definition.property_type.is_calculated() || definition.transition_only)
        {
            return;
        }
        let Some(raw) = row.get(mapping.index()).and_then(|cell| cell.as_deref()) else {
            card.set_property(name, None);
            return;
        };
        match self.convert(mapping.kind(), name, raw) {
            Ok(value) => card.set_property(name, Some(value)),
            Err(err) => {
                debug!("Card #{}: {err}", card.number);
                card.record_error(&err);
            }
        }
    }

    fn convert(
        &self,
        kind: ImportKind,
        property: &str,
        raw: &str,
    ) -> Result<PropertyValue, PropertyValueError> {
        let property = property.to_string();
        let value = raw.to_string();
        match kind {
            ImportKind::FreeNumeric | ImportKind::NumericList => parse_number(raw)
                .map(PropertyValue::Number)
                .ok_or(PropertyValueError::InvalidNumber { property, value }),
            ImportKind::Date => parse_naive_date(raw)
                .map(PropertyValue::Date)
                .ok_or(PropertyValueError::InvalidDate { property, value }),
            ImportKind::User => match self.project.user(raw) {
                Some(login) => Ok(PropertyValue::User(login.to_string())),
                None => Err(PropertyValueError::InvalidUser { property, value }),
            },
            ImportKind::CardRelationship | ImportKind::TreeRelationship => parse_card_reference(raw)
                .map(PropertyValue::Card)
                .ok_or(PropertyValueError::InvalidCardReference { property, value }),
            ImportKind::TreeBelonging => parse_belonging(raw)
                .map(PropertyValue::Belongs)
                .ok_or(PropertyValueError::InvalidBelonging { property, value }),
            _ => Ok(PropertyValue::Text(value)),
        }
    }

    fn join_selected_tree(&self, card: &mut Card) {
        let Some(tree) = self.tree else { return };
        if tree.position(&card.card_type).is_none() {
            return;
        }
        let belonging = self
            .project
            .tree_properties(&tree.name)
            .into_iter()
            .find(|definition| definition.property_type == PropertyType::TreeBelonging);
        if let Some(definition) = belonging
            && card.property(&definition.name).is_none()
        {
            card.set_property(&definition.name, Some(PropertyValue::Belongs(true)));
        }
    }
}

pub struct Translation<'a, P: Project + ?Sized> {
    translator: RowTranslator<'a, P>,
    rows: &'a RowStore,
    reader: RowStoreReader<'a>,
    plan: TranslationPlan,
    position: usize,
}

impl<'a, P: Project + ?Sized> Translation<'a, P> {
    pub(crate) fn new(
        translator: RowTranslator<'a, P>,
        rows: &'a RowStore,
        plan: TranslationPlan,
        start: usize,
    ) -> ImportResult<Self> {
        Ok(Self {
            translator,
            rows,
            reader: rows.reader()?,
            plan,
            position: start,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total(&self) -> usize {
        self.plan.len()
    }
}

impl<P: Project + ?Sized> Iterator for Translation<'_, P> {
    type Item = ImportResult<(Card, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.plan.order().get(self.position)?;
        self.position += 1;
        let number = self.plan.number(index)?;
        let translated = self.reader.read_at(index).and_then(|row| {
            let source_row = self.rows.source_row(index)?;
            Ok((self.translator.translate(&row, number), source_row))
        });
        Some(translated)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}
