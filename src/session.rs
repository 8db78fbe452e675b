use std::io::{BufReader, Read};

use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use log::{debug, info};
use serde::Deserialize;

use crate::{
    card::Card,
    error::{ImportError, ImportResult},
    grid::Grid,
    heuristics::Heuristics,
    mapping::{Header, ImportKind},
    project::Project,
    tokenizer::Row,
    translate::{RowTranslator, SchemaChanges, Translation, TranslationPlan, prepare_schema},
    validate::{collect_warnings, validate},
};

pub const DEFAULT_SAMPLE_ROWS: usize = 2000;
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 255;
pub const DEFAULT_MAX_IDENTIFIER: u64 = 2_147_483_647;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub overrides: Vec<Option<ImportKind>>,
    pub tree: Option<String>,
    pub sample_rows: usize,
    pub max_field_length: usize,
    pub max_identifier: u64,
    pub allow_new_card_types: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            tree: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            max_identifier: DEFAULT_MAX_IDENTIFIER,
            allow_new_card_types: false,
        }
    }
}

#[derive(Debug)]
pub struct ImportSession {
    grid: Grid,
    header: Header,
    options: ImportOptions,
}

impl ImportSession {
    pub fn open<R, P>(
        input: R,
        encoding: &'static Encoding,
        project: &P,
        options: ImportOptions,
    ) -> ImportResult<Self>
    where
        R: Read,
        P: Project + ?Sized,
    {
        let decoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .build(input);
        let grid = Grid::materialize(BufReader::new(decoded), options.sample_rows)?;
        let heuristics = Heuristics::from_columns(grid.columns().columns()?)?;
        let header = Header::resolve(grid.header(), &heuristics, project, &options.overrides);
        debug!(
            "Opened import of {} row(s) with encoding {}",
            grid.row_count(),
            encoding.name()
        );
        Ok(Self {
            grid,
            header,
            options,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn row_count(&self) -> usize {
        self.grid.row_count()
    }

    pub fn row(&self, index: usize) -> ImportResult<Row> {
        self.grid.row(index)
    }

    pub fn override_kind<P: Project + ?Sized>(
        &mut self,
        index: usize,
        kind: ImportKind,
        project: &P,
    ) -> bool {
        self.header.override_kind(index, kind, project)
    }

    pub fn validate<P: Project + ?Sized>(&self, project: &P) -> ImportResult<()> {
        validate(&self.header, self.grid.rows(), project, &self.options)
    }

    pub fn warnings<P: Project + ?Sized>(&self, project: &P) -> ImportResult<Vec<String>> {
        collect_warnings(&self.header, self.grid.rows(), project, &self.options)
    }

    /// Validates, then creates missing properties and card types. Nothing in
    /// the project changes when validation fails. Cards can only be
    /// translated through the returned [`PreparedImport`].
    pub fn prepare_schema<P: Project + ?Sized>(
        &self,
        project: &mut P,
    ) -> ImportResult<PreparedImport<'_>> {
        self.validate(project)?;
        let changes = prepare_schema(&self.header, self.grid.rows(), project)?;
        Ok(PreparedImport {
            session: self,
            changes,
        })
    }

    pub fn import<P: Project + ?Sized>(&self, project: &mut P) -> ImportResult<Vec<(Card, usize)>> {
        let prepared = self.prepare_schema(project)?;
        let cards = prepared
            .translate(&*project, 0)?
            .collect::<ImportResult<Vec<_>>>()?;
        let erred = cards.iter().filter(|(card, _)| card.has_errors()).count();
        info!(
            "Translated {} card(s); {} with property errors",
            cards.len(),
            erred
        );
        Ok(cards)
    }
}

#[derive(Debug)]
pub struct PreparedImport<'s> {
    session: &'s ImportSession,
    changes: SchemaChanges,
}

impl PreparedImport<'_> {
    pub fn changes(&self) -> &SchemaChanges {
        &self.changes
    }

    pub fn translate<'a, P: Project + ?Sized>(
        &'a self,
        project: &'a P,
        start: usize,
    ) -> ImportResult<Translation<'a, P>> {
        let session = self.session;
        let tree = match session.options.tree.as_deref() {
            Some(name) => Some(
                project
                    .tree(name)
                    .ok_or_else(|| ImportError::UnknownTree(name.to_string()))?,
            ),
            None => None,
        };
        let rows = session.grid.rows();
        let plan = TranslationPlan::build(&session.header, rows, project, tree)?;
        if start > 0 {
            debug!("Resuming translation at position {start} of {}", plan.len());
        }
        let translator = RowTranslator::new(&session.header, project, tree);
        Translation::new(translator, rows, plan, start)
    }
}
