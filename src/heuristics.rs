use std::collections::HashSet;

use log::trace;

use crate::{
    data::{is_card_number, is_date, is_number, word_count},
    error::ImportResult,
    tokenizer::Cell,
};

pub const VERBOSE_MIN_CHARS: usize = 40;
pub const SHORT_TEXT_MAX_WORDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordBucket {
    Zero,
    Few,
    Many,
}

impl WordBucket {
    pub fn of(value: &str) -> Self {
        match word_count(value) {
            0 => WordBucket::Zero,
            n if n <= SHORT_TEXT_MAX_WORDS => WordBucket::Few,
            _ => WordBucket::Many,
        }
    }

    fn slot(self) -> usize {
        match self {
            WordBucket::Zero => 0,
            WordBucket::Few => 1,
            WordBucket::Many => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    CardNumber,
    Number,
    Blank,
    Date,
    ShortText,
    Verbose,
}

impl Shape {
    pub fn matches(self, value: &str) -> bool {
        match self {
            Shape::CardNumber => is_card_number(value),
            Shape::Number => is_number(value),
            Shape::Blank => value.trim().is_empty(),
            Shape::Date => is_date(value),
            Shape::ShortText => WordBucket::of(value) != WordBucket::Many,
            Shape::Verbose => is_verbose(value),
        }
    }
}

pub fn is_verbose(value: &str) -> bool {
    value.contains('\n') || value.chars().count() >= VERBOSE_MIN_CHARS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    OnlyFirstColumn,
    FirstNonEmptyColumn,
    FullyMatches,
    Diverse,
    Contains,
}

const SHAPES: [Shape; 6] = [
    Shape::CardNumber,
    Shape::Number,
    Shape::Blank,
    Shape::Date,
    Shape::ShortText,
    Shape::Verbose,
];

impl Shape {
    fn slot(self) -> usize {
        match self {
            Shape::CardNumber => 0,
            Shape::Number => 1,
            Shape::Blank => 2,
            Shape::Date => 3,
            Shape::ShortText => 4,
            Shape::Verbose => 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFacts {
    pub index: usize,
    pub values: usize,
    pub blanks: usize,
    pub distinct: usize,
    pub word_buckets: [usize; 3],
    shape_counts: [usize; 6],
}

impl ColumnFacts {
    pub fn from_values(index: usize, values: &[Cell]) -> Self {
        let mut facts = ColumnFacts {
            index,
            values: values.len(),
            ..ColumnFacts::default()
        };
        let mut seen = HashSet::new();
        for value in values {
            let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) else {
                facts.blanks += 1;
                facts.word_buckets[WordBucket::Zero.slot()] += 1;
                continue;
            };
            seen.insert(value);
            facts.word_buckets[WordBucket::of(value).slot()] += 1;
            for shape in SHAPES {
                if shape.matches(value) {
                    facts.shape_counts[shape.slot()] += 1;
                }
            }
        }
        facts.distinct = seen.len();
        trace!("Column {index} facts: {facts:?}");
        facts
    }

    pub fn non_blank(&self) -> usize {
        self.values - self.blanks
    }

    pub fn is_blank(&self) -> bool {
        self.non_blank() == 0
    }

    pub fn count(&self, shape: Shape) -> usize {
        match shape {
            Shape::Blank => self.blanks,
            other => self.shape_counts[other.slot()],
        }
    }

    pub fn words(&self, bucket: WordBucket) -> usize {
        self.word_buckets[bucket.slot()]
    }

    pub fn is_diverse(&self) -> bool {
        self.values > 0 && self.blanks == 0 && self.distinct * 2 > self.values
    }

    pub fn fully_matches(&self, shape: Shape) -> bool {
        match shape {
            Shape::Blank => self.is_blank(),
            other => self.non_blank() > 0 && self.count(other) == self.non_blank(),
        }
    }

    pub fn contains(&self, shape: Shape) -> bool {
        self.count(shape) > 0
    }

    fn holds_text(&self) -> bool {
        !self.is_blank()
            && !self.fully_matches(Shape::CardNumber)
            && !self.fully_matches(Shape::Number)
            && !self.fully_matches(Shape::Date)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Heuristics {
    facts: Vec<ColumnFacts>,
    first_text_column: Option<usize>,
}

impl Heuristics {
    pub fn from_columns<I>(columns: I) -> ImportResult<Self>
    where
        I: IntoIterator<Item = ImportResult<Vec<Cell>>>,
    {
        let facts = columns
            .into_iter()
            .enumerate()
            .map(|(index, values)| values.map(|values| ColumnFacts::from_values(index, &values)))
            .collect::<ImportResult<Vec<_>>>()?;
        Ok(Self::from_facts(facts))
    }

    pub fn from_facts(facts: Vec<ColumnFacts>) -> Self {
        let first_text_column = facts
            .iter()
            .find(|facts| facts.holds_text())
            .map(|facts| facts.index);
        Self {
            facts,
            first_text_column,
        }
    }

    pub fn facts(&self, index: usize) -> Option<&ColumnFacts> {
        self.facts.get(index)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn matches(&self, index: usize, selector: Selector, shape: Shape) -> bool {
        let Some(facts) = self.facts(index) else {
            return false;
        };
        match selector {
            Selector::OnlyFirstColumn => index == 0 && facts.fully_matches(shape),
            Selector::FirstNonEmptyColumn => {
                self.first_text_column == Some(index) && facts.fully_matches(shape)
            }
            Selector::FullyMatches => facts.fully_matches(shape),
            Selector::Diverse => facts.is_diverse() && facts.fully_matches(shape),
            Selector::Contains => facts.contains(shape),
        }
    }
}
