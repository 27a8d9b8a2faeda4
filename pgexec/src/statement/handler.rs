//! Result handlers wired into executor round trips.
use std::sync::Arc;

use crate::{
    Error,
    common::verbose,
    executor::{CursorHandle, ResultHandler},
    postgres::Oid,
    row::{Field, Tuple},
};

/// One result as produced by the server.
pub(crate) enum RawResult {
    Rows {
        fields: Arc<[Field]>,
        tuples: Vec<Tuple>,
        cursor: Option<CursorHandle>,
    },
    Status {
        count: u64,
        oid: Oid,
    },
}

/// Collects the result chain of one execution.
#[derive(Default)]
pub(crate) struct StatementHandler {
    pub(crate) results: Vec<RawResult>,
    pub(crate) warnings: Vec<String>,
}

impl StatementHandler {
    /// Columns of the first row set, for describe only round trips.
    pub(crate) fn first_fields(&self) -> Option<Arc<[Field]>> {
        self.results.iter().find_map(|r| match r {
            RawResult::Rows { fields, .. } => Some(fields.clone()),
            RawResult::Status { .. } => None,
        })
    }
}

impl ResultHandler for StatementHandler {
    fn handle_result_rows(&mut self, fields: Arc<[Field]>, tuples: Vec<Tuple>, cursor: Option<CursorHandle>) {
        verbose!(rows = tuples.len(), more = cursor.is_some(), "result rows");
        self.results.push(RawResult::Rows { fields, tuples, cursor });
    }

    fn handle_command_status(&mut self, _status: &str, count: u64, oid: Oid) {
        verbose!(status = _status, count, "command status");
        self.results.push(RawResult::Status { count, oid });
    }

    fn handle_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Collects update counts of a batch.
///
/// Row sets are only accepted when generated keys are wanted, their
/// tuples are gathered into one keys result.
pub(crate) struct BatchHandler {
    pub(crate) counts: Vec<u64>,
    pub(crate) keys: Option<(Arc<[Field]>, Vec<Tuple>)>,
    pub(crate) warnings: Vec<String>,
    pub(crate) error: Option<Error>,
    expect_keys: bool,
}

impl BatchHandler {
    pub(crate) fn new(expect_keys: bool) -> BatchHandler {
        BatchHandler { counts: Vec::new(), keys: None, warnings: Vec::new(), error: None, expect_keys }
    }
}

impl ResultHandler for BatchHandler {
    fn handle_result_rows(&mut self, fields: Arc<[Field]>, tuples: Vec<Tuple>, _: Option<CursorHandle>) {
        if !self.expect_keys {
            self.error.get_or_insert_with(|| Error::no_data("A result was returned when none was expected."));
            return;
        }
        match &mut self.keys {
            Some((_, rows)) => rows.extend(tuples),
            None => self.keys = Some((fields, tuples)),
        }
    }

    fn handle_command_status(&mut self, _status: &str, count: u64, _: Oid) {
        verbose!(status = _status, count, "batch entry done");
        self.counts.push(count);
    }

    fn handle_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Receives one page of an open cursor.
#[derive(Default)]
pub(crate) struct PageHandler {
    pub(crate) page: Option<(Vec<Tuple>, Option<CursorHandle>)>,
    pub(crate) warnings: Vec<String>,
    pub(crate) error: Option<Error>,
}

impl ResultHandler for PageHandler {
    fn handle_result_rows(&mut self, _: Arc<[Field]>, tuples: Vec<Tuple>, cursor: Option<CursorHandle>) {
        verbose!(rows = tuples.len(), more = cursor.is_some(), "page fetched");
        self.page = Some((tuples, cursor));
    }

    fn handle_command_status(&mut self, status: &str, _: u64, _: Oid) {
        self.error.get_or_insert_with(|| Error::state(format!("Unexpected command status: {status}.")));
    }

    fn handle_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}
