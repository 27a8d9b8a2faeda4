//! Row cursor over a statement result.
//!
//! A [`Cursor`] holds the rows received so far. Forward cursors opened
//! with a fetch size keep a server portal and read the next page when the
//! buffered rows run out. Scrollable cursors hold every row and allow
//! random access.
//!
//! Rows are numbered from 1, as are columns.
use std::{fmt, sync::Arc};

use crate::{
    Error, Result, Session,
    common::{log_warn, verbose},
    executor::{CursorHandle, Executor},
    row::{Field, Tuple},
    statement::{PageHandler, ResultKind},
};

mod get;
mod table;
mod update;

pub use get::ColumnIndex;

use update::Edits;

/// Settings a cursor inherits from its statement.
#[derive(Debug, Clone)]
pub(crate) struct CursorOptions {
    pub(crate) kind: ResultKind,
    pub(crate) fetch_size: usize,
    pub(crate) max_rows: usize,
    /// Sql the rows were read with, used to find the updatable table.
    pub(crate) origin: Option<String>,
}

/// Rows of one result.
pub struct Cursor<E: Executor> {
    session: Session<E>,
    fields: Arc<[Field]>,
    rows: Vec<Tuple>,
    handle: Option<CursorHandle>,
    kind: ResultKind,
    fetch_size: usize,
    max_rows: usize,
    origin: Option<String>,
    /// Rows read and discarded before the first buffered row.
    row_offset: usize,
    /// Index into `rows`, -1 before the first row.
    current: isize,
    was_null: bool,
    warnings: Vec<String>,
    edits: Edits,
    closed: bool,
}

impl<E: Executor> Cursor<E> {
    pub(crate) fn new(
        session: Session<E>,
        fields: Arc<[Field]>,
        rows: Vec<Tuple>,
        handle: Option<CursorHandle>,
        options: CursorOptions,
    ) -> Cursor<E> {
        Cursor {
            session,
            fields,
            rows,
            handle,
            kind: options.kind,
            fetch_size: options.fetch_size,
            max_rows: options.max_rows,
            origin: options.origin,
            row_offset: 0,
            current: -1,
            was_null: false,
            warnings: Vec::new(),
            edits: Edits::default(),
            closed: false,
        }
    }

    pub fn result_kind(&self) -> ResultKind {
        self.kind
    }

    /// Column descriptions.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Rows per page, zero reads the rest at once.
    pub fn set_fetch_size(&mut self, rows: i32) -> Result<()> {
        self.check_closed()?;
        self.fetch_size = usize::try_from(rows)
            .map_err(|_| Error::range("Fetch size must be a value greater to or equal to 0."))?;
        Ok(())
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Server notices received while fetching.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn check_closed(&self) -> Result<()> {
        match self.closed {
            true => Err(Error::state("This ResultSet is closed.")),
            false => Ok(()),
        }
    }

    fn check_scrollable(&self) -> Result<()> {
        self.check_closed()?;
        match self.kind.is_scrollable() {
            true => Ok(()),
            false => Err(Error::state(
                "Operation requires a scrollable ResultSet, but this ResultSet is FORWARD_ONLY.",
            )),
        }
    }

    fn check_relative_move(&self) -> Result<()> {
        match self.edits.on_insert_row {
            true => Err(Error::state("Can't use relative move methods while on the insert row.")),
            false => Ok(()),
        }
    }

    /// Buffered index of the current row.
    fn position(&self) -> Option<usize> {
        usize::try_from(self.current).ok().filter(|&i| i < self.rows.len())
    }

    /// The insert row or the current row.
    fn current_tuple(&self) -> Result<&Tuple> {
        if self.edits.on_insert_row {
            return Ok(&self.edits.insert_row);
        }
        self.position()
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| Error::state("ResultSet not positioned properly, perhaps you need to call next."))
    }

    // ===== Forward =====

    /// Move to the next row, returns `false` past the last row.
    ///
    /// A forward cursor with an open portal fetches the next page when the
    /// buffered rows run out.
    pub async fn next(&mut self) -> Result<bool> {
        self.check_closed()?;
        self.check_relative_move()?;
        self.edits.pending.clear();

        let len = self.rows.len();
        if self.current + 1 < len as isize {
            self.current += 1;
            return Ok(true);
        }

        if self.handle.is_none() || (self.max_rows > 0 && self.row_offset + len >= self.max_rows) {
            self.current = len as isize;
            return Ok(false);
        }

        let prev_offset = self.row_offset;
        self.row_offset += len;
        let rows = self.page_size();
        if let Err(err) = self.fetch(rows).await {
            self.row_offset = prev_offset;
            return Err(err);
        }
        self.current = 0;
        Ok(!self.rows.is_empty())
    }

    /// Rows to ask for, bounded by the row limit.
    fn page_size(&self) -> usize {
        match self.max_rows {
            0 => self.fetch_size,
            max if self.fetch_size == 0 || self.row_offset + self.fetch_size > max => {
                max.saturating_sub(self.row_offset)
            }
            _ => self.fetch_size,
        }
    }

    /// Replace the buffered rows with the next page of the portal.
    async fn fetch(&mut self, rows: usize) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            self.rows.clear();
            return Ok(());
        };

        let session = self.session.clone();
        let mut handler = PageHandler::default();
        let result = match session.lock().await {
            Ok(mut exec) => {
                verbose!(portal = %handle.portal(), rows, "fetch");
                exec.fetch(&handle, &mut handler, rows).await
            }
            Err(err) => Err(err),
        };
        self.warnings.append(&mut handler.warnings);

        if let Err(err) = result.and_then(|()| handler.error.map_or(Ok(()), Err)) {
            self.handle = Some(handle);
            return Err(err);
        }

        let (page, next) = handler.page.unwrap_or_default();
        self.rows = page;
        self.handle = next;
        Ok(())
    }

    /// Returns `true` on the last row of the result.
    ///
    /// On the last buffered row of an open portal the next page is read
    /// ahead, the current row is kept in front of it.
    pub async fn is_last(&mut self) -> Result<bool> {
        self.check_closed()?;
        if self.edits.on_insert_row {
            return Ok(false);
        }

        let len = self.rows.len();
        if len == 0 || self.current != len as isize - 1 {
            return Ok(false);
        }
        if self.handle.is_none() || (self.max_rows > 0 && self.row_offset + len >= self.max_rows) {
            return Ok(true);
        }

        self.row_offset += len;
        let rows = self.page_size();
        // the current row moves to the front of the next page
        self.row_offset -= 1;
        let saved = self.rows.pop();
        if let Err(err) = self.fetch(rows).await {
            self.row_offset -= len - 1;
            self.rows.extend(saved);
            return Err(err);
        }

        self.rows.splice(0..0, saved);
        self.current = 0;
        Ok(self.rows.len() == 1)
    }

    pub fn is_before_first(&self) -> Result<bool> {
        self.check_closed()?;
        if self.edits.on_insert_row {
            return Ok(false);
        }
        Ok(self.row_offset as isize + self.current < 0 && !self.rows.is_empty())
    }

    pub fn is_after_last(&self) -> Result<bool> {
        self.check_closed()?;
        if self.edits.on_insert_row {
            return Ok(false);
        }
        let len = self.rows.len();
        if self.row_offset + len == 0 {
            return Ok(false);
        }
        Ok(self.current >= len as isize)
    }

    pub fn is_first(&self) -> Result<bool> {
        self.check_closed()?;
        if self.edits.on_insert_row || self.row_offset + self.rows.len() == 0 {
            return Ok(false);
        }
        Ok(self.row_offset as isize + self.current == 0)
    }

    /// Number of the current row, zero when not on a row.
    pub fn get_row(&self) -> Result<usize> {
        self.check_closed()?;
        if self.edits.on_insert_row {
            return Ok(0);
        }
        Ok(self.position().map_or(0, |i| self.row_offset + i + 1))
    }

    // ===== Scroll =====

    /// Move to row `row`, negative counts from the end.
    ///
    /// Zero and rows before the first move before the first row, rows
    /// past the last move after the last row, both return `false`.
    pub fn absolute(&mut self, row: isize) -> Result<bool> {
        self.check_scrollable()?;
        let len = self.rows.len() as isize;

        let index = match row {
            0 => {
                self.before_first()?;
                return Ok(false);
            }
            row if row < 0 && row >= -len => len + row,
            row if row < 0 => {
                self.before_first()?;
                return Ok(false);
            }
            row if row <= len => row - 1,
            _ => {
                self.after_last()?;
                return Ok(false);
            }
        };

        self.current = index;
        self.edits.leave_insert_row();
        Ok(true)
    }

    /// Move `rows` rows from the current one.
    pub fn relative(&mut self, rows: isize) -> Result<bool> {
        self.check_scrollable()?;
        self.check_relative_move()?;
        let index = self.current + 1 + rows;
        if index < 0 {
            self.before_first()?;
            return Ok(false);
        }
        self.absolute(index)
    }

    pub fn first(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        if self.rows.is_empty() {
            return Ok(false);
        }
        self.current = 0;
        self.edits.leave_insert_row();
        Ok(true)
    }

    pub fn last(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        if self.rows.is_empty() {
            return Ok(false);
        }
        self.current = self.rows.len() as isize - 1;
        self.edits.leave_insert_row();
        Ok(true)
    }

    pub fn previous(&mut self) -> Result<bool> {
        self.check_scrollable()?;
        self.check_relative_move()?;
        self.edits.pending.clear();
        if self.current - 1 < 0 {
            self.current = -1;
            return Ok(false);
        }
        self.current -= 1;
        Ok(true)
    }

    pub fn before_first(&mut self) -> Result<()> {
        self.check_scrollable()?;
        if !self.rows.is_empty() {
            self.current = -1;
        }
        self.edits.leave_insert_row();
        Ok(())
    }

    pub fn after_last(&mut self) -> Result<()> {
        self.check_scrollable()?;
        if !self.rows.is_empty() {
            self.current = self.rows.len() as isize;
        }
        self.edits.leave_insert_row();
        Ok(())
    }

    // ===== Lifecycle =====

    /// Release the rows, an open portal is closed on the next round trip.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rows = Vec::new();
        self.edits = Edits::default();
        if let Some(handle) = self.handle.take() {
            self.session.close_portal_later(handle.portal().clone());
        }
    }
}

impl<E: Executor> Drop for Cursor<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log_warn!("cursor dropped without close, portal {} left open", handle.portal());
            self.session.close_portal_later(handle.portal().clone());
        }
    }
}

impl<E: Executor> fmt::Debug for Cursor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("kind", &self.kind)
            .field("columns", &self.fields.len())
            .field("rows", &self.rows.len())
            .field("row", &(self.row_offset as isize + self.current + 1))
            .field("portal", &self.handle)
            .field("closed", &self.closed)
            .finish()
    }
}
