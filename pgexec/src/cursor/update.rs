//! Row changes through an updatable cursor.
//!
//! Edits are kept per column until the row is written back with a
//! synthesized `UPDATE`, `INSERT` or `DELETE` against the single table
//! the cursor reads from. Rows are identified by the `oid` column when it
//! is selected, otherwise by the first candidate key whose columns are
//! all selected.
use bytes::Bytes;

use super::{
    ColumnIndex, Cursor,
    table::{self, TableRef},
};
use crate::{
    Error, Result,
    common::verbose,
    error::Unsupported,
    executor::Executor,
    postgres::PgFormat,
    query::CacheKey,
    row::{Field, Tuple},
    statement::{PreparedStatement, ResultKind},
    temporal::{Date, Time, Timestamp},
    value::Value,
};

/// Pending changes of a cursor.
#[derive(Default)]
pub(super) struct Edits {
    /// Column base name and new value, in edit order.
    pub(super) pending: Vec<(String, Value)>,
    pub(super) on_insert_row: bool,
    pub(super) insert_row: Tuple,
    /// Resolved once, [`None`] inside when the cursor is not updatable.
    target: Option<Option<Target>>,
}

impl Edits {
    pub(super) fn leave_insert_row(&mut self) {
        self.on_insert_row = false;
        self.pending.clear();
    }
}

/// Table and key columns rows are written back to.
#[derive(Debug, Clone)]
struct Target {
    table: TableRef,
    /// Column position and name.
    keys: Vec<(usize, String)>,
}

impl Target {
    fn key_names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(_, name)| name.as_str())
    }
}

macro_rules! update_fn {
    (@conv $value:ident) => { $value };
    (@conv $value:ident $conv:expr) => { $conv($value) };
    ($($(#[$doc:meta])* $name:ident($ty:ty) => $variant:ident$(($conv:expr))?;)*) => {$(
        $(#[$doc])*
        pub fn $name(&mut self, index: impl ColumnIndex, value: $ty) -> Result<()> {
            self.update_value(index, Value::$variant(update_fn!(@conv value $($conv)?)))
        }
    )*};
}

impl<E: Executor> Cursor<E> {
    fn check_concurrency(&self) -> Result<()> {
        self.check_closed()?;
        match self.kind.is_updatable() {
            true => Ok(()),
            false => Err(Error::state("ResultSets with concurrency CONCUR_READ_ONLY cannot be updated.")),
        }
    }

    /// Returns `true` if rows can be changed through this cursor.
    ///
    /// The first call looks up the key columns of the table.
    pub async fn is_updatable(&mut self) -> Result<bool> {
        self.check_concurrency()?;
        Ok(self.target().await?.is_some())
    }

    async fn target(&mut self) -> Result<Option<Target>> {
        if let Some(target) = &self.edits.target {
            return Ok(target.clone());
        }
        let target = self.find_target().await?;
        self.edits.target = Some(target.clone());
        Ok(target)
    }

    async fn find_target(&self) -> Result<Option<Target>> {
        let Some(table) = self.origin.as_deref().and_then(table::scan_table) else {
            verbose!("cursor is not reading a single table");
            return Ok(None);
        };

        if let Some(i) = self.fields.iter().position(|f| f.name().eq_ignore_ascii_case("oid")) {
            return Ok(Some(Target { table, keys: vec![(i, "oid".to_owned())] }));
        }

        let (schema, name) = table::quoteless_table_name(&table.name);
        let candidates = {
            let mut exec = self.session.lock().await?;
            exec.primary_keys(schema.as_deref(), &name).await?
        };

        let keys = candidates.into_iter().find_map(|key| {
            let columns = key
                .into_iter()
                .map(|column| {
                    let i = self.fields.iter().position(|f| f.base_name() == column)?;
                    Some((i, column))
                })
                .collect::<Option<Vec<_>>>()?;
            (!columns.is_empty()).then_some(columns)
        });
        if keys.is_none() {
            verbose!(table = %table.name, "no key of the table is selected");
        }
        Ok(keys.map(|keys| Target { table, keys }))
    }

    async fn check_updatable(&mut self) -> Result<Target> {
        self.check_concurrency()?;
        self.target().await?.ok_or_else(|| {
            Error::state(
                "ResultSet is not updateable. The query that generated this result set must \
                select only one table, and must select all primary keys from that table.",
            )
        })
    }

    fn check_on_row(&self) -> Result<usize> {
        self.position().ok_or_else(|| {
            Error::state("Cannot update the ResultSet because it is either before the start or after the end of the results.")
        })
    }

    /// Key values of buffered row `row`.
    fn key_values(&self, row: usize, target: &Target) -> Result<Vec<Value>> {
        let utils = self.utils();
        target
            .keys
            .iter()
            .map(|&(i, _)| match self.rows.get(row).and_then(|t| t.get(i)).cloned().flatten() {
                Some(bytes) => Ok(self.fields[i].decode(&bytes, &utils)?),
                None => Ok(Value::Null),
            })
            .collect()
    }

    /// Column bytes of `value` in the transfer format of `field`.
    fn encode(&self, field: &Field, value: &Value) -> Result<Option<Bytes>> {
        if value.is_null() {
            return Ok(None);
        }
        match field.format() {
            PgFormat::Text => Ok(Some(Bytes::from(value.render(&self.utils(), None)?))),
            PgFormat::Binary => Err(Unsupported("updating binary transferred columns").into()),
        }
    }

    /// Write `values` into every column of `tuple` with a matching base name.
    fn merge<'a>(&self, tuple: &mut Tuple, values: impl IntoIterator<Item = &'a (String, Value)>) -> Result<()> {
        for (name, value) in values {
            for (i, field) in self.fields.iter().enumerate() {
                if field.base_name().eq_ignore_ascii_case(name) {
                    tuple[i] = self.encode(field, value)?;
                }
            }
        }
        Ok(())
    }

    fn prepare(&self, sql: &str, wants_keys: bool, kind: ResultKind) -> Result<PreparedStatement<E>> {
        verbose!(sql, "synthesized");
        let key = match wants_keys {
            true => CacheKey::returning(sql, false, Vec::new()),
            false => CacheKey::new(sql, false),
        };
        PreparedStatement::new(self.session.clone(), key, kind, wants_keys)
    }

    async fn execute_synthesized(&self, sql: &str, values: &[Value]) -> Result<u64> {
        let mut ps = self.prepare(sql, false, ResultKind::default())?;
        let result = update(&mut ps, values).await;
        ps.close();
        result
    }

    // ===== Edits =====

    /// Set a column of the current row or the insert row.
    ///
    /// Nothing is sent until [`update_row`][Self::update_row] or
    /// [`insert_row`][Self::insert_row].
    pub fn update_value(&mut self, index: impl ColumnIndex, value: Value) -> Result<()> {
        self.check_concurrency()?;
        if !self.edits.on_insert_row {
            self.check_on_row()?;
        }
        let column = index.column(&self.fields)?;
        let name = self.fields[column].base_name().to_owned();
        match self.edits.pending.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.edits.pending.push((name, value)),
        }
        Ok(())
    }

    pub fn update_null(&mut self, index: impl ColumnIndex) -> Result<()> {
        self.update_value(index, Value::Null)
    }

    update_fn! {
        update_bool(bool) => Bool;
        update_i16(i16) => Int2;
        update_i32(i32) => Int4;
        update_i64(i64) => Int8;
        update_f32(f32) => Float4;
        update_f64(f64) => Float8;
        /// Set exact decimal text.
        update_numeric(&str) => Numeric(str::to_owned);
        update_str(&str) => Text(str::to_owned);
        update_bytes(&[u8]) => Bytes(Bytes::copy_from_slice);
        update_date(Date) => Date;
        update_time(Time) => Time;
        update_timestamp(Timestamp) => Timestamp;
    }

    /// Drop the pending edits of the current row.
    pub fn cancel_row_updates(&mut self) -> Result<()> {
        self.check_closed()?;
        if self.edits.on_insert_row {
            return Err(Error::state("Cannot call cancel_row_updates() when on the insert row."));
        }
        self.edits.pending.clear();
        Ok(())
    }

    // ===== Write back =====

    /// Write the pending edits of the current row to the table.
    pub async fn update_row(&mut self) -> Result<()> {
        let target = self.check_updatable().await?;
        if self.edits.on_insert_row {
            return Err(Error::state("Cannot call update_row() when on the insert row."));
        }
        let row = self.check_on_row()?;
        if self.edits.pending.is_empty() {
            return Err(Error::state("No column values were updated on the current row."));
        }

        let sql = table::update_sql(
            &target.table,
            self.edits.pending.iter().map(|(name, _)| name.as_str()),
            target.key_names(),
        );
        let mut values: Vec<_> = self.edits.pending.iter().map(|(_, v)| v.clone()).collect();
        values.extend(self.key_values(row, &target)?);
        self.execute_synthesized(&sql, &values).await?;

        let pending = std::mem::take(&mut self.edits.pending);
        let mut tuple = self.rows[row].clone();
        self.merge(&mut tuple, &pending)?;
        self.rows[row] = tuple;
        Ok(())
    }

    /// Delete the current row from the table and the cursor.
    ///
    /// The cursor moves to the row before.
    pub async fn delete_row(&mut self) -> Result<()> {
        let target = self.check_updatable().await?;
        if self.edits.on_insert_row {
            return Err(Error::state("Cannot call delete_row() when on the insert row."));
        }
        let row = self.check_on_row()?;

        let sql = table::delete_sql(&target.table, target.key_names());
        let values = self.key_values(row, &target)?;
        self.execute_synthesized(&sql, &values).await?;

        self.rows.remove(row);
        self.current -= 1;
        self.edits.leave_insert_row();
        Ok(())
    }

    /// Insert the insert row into the table and append it to the cursor.
    ///
    /// Values generated by the server replace the ones sent.
    pub async fn insert_row(&mut self) -> Result<()> {
        let target = self.check_updatable().await?;
        if !self.edits.on_insert_row {
            return Err(Error::state("Not on the insert row."));
        }
        if self.edits.pending.is_empty() {
            return Err(Error::range("You must specify at least one column value to insert a row."));
        }

        let sql = table::insert_sql(&target.table, self.edits.pending.iter().map(|(name, _)| name.as_str()));
        let values: Vec<_> = self.edits.pending.iter().map(|(_, v)| v.clone()).collect();

        let mut ps = self.prepare(&sql, true, ResultKind::default())?;
        let result = insert(&mut ps, &values).await;
        ps.close();
        let generated = result?;

        let pending = std::mem::take(&mut self.edits.pending);
        let mut tuple = vec![None; self.fields.len()];
        self.merge(&mut tuple, pending.iter().chain(&generated))?;
        self.rows.push(tuple);
        self.edits.insert_row = vec![None; self.fields.len()];
        Ok(())
    }

    /// Read the current row again from the table.
    pub async fn refresh_row(&mut self) -> Result<()> {
        let target = self.check_updatable().await?;
        if self.edits.on_insert_row {
            return Err(Error::state("Can't refresh the insert row."));
        }
        let Some(row) = self.position() else {
            return Ok(());
        };

        let sql = table::select_sql(&target.table, self.fields.iter().map(Field::base_name), target.key_names());
        let values = self.key_values(row, &target)?;

        let mut ps = self.prepare(&sql, false, ResultKind::updatable())?;
        let result = select(&mut ps, &values).await;
        ps.close();

        if let Some(tuple) = result? {
            self.rows[row] = tuple;
        }
        self.edits.pending.clear();
        Ok(())
    }

    // ===== Insert row =====

    /// Move to the insert row, a buffer for a new row.
    ///
    /// The current row is remembered.
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.check_concurrency()?;
        self.edits.insert_row = vec![None; self.fields.len()];
        self.edits.pending.clear();
        self.edits.on_insert_row = true;
        Ok(())
    }

    /// Leave the insert row, back to the remembered row.
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.check_concurrency()?;
        self.edits.leave_insert_row();
        Ok(())
    }

    /// Changes by others are not visible, always `false`.
    pub fn row_updated(&self) -> Result<bool> {
        self.check_closed()?;
        Ok(false)
    }

    pub fn row_inserted(&self) -> Result<bool> {
        self.check_closed()?;
        Ok(false)
    }

    pub fn row_deleted(&self) -> Result<bool> {
        self.check_closed()?;
        Ok(false)
    }
}

fn bind<E: Executor>(ps: &mut PreparedStatement<E>, values: &[Value]) -> Result<()> {
    values.iter().enumerate().try_for_each(|(i, value)| ps.set_value(i + 1, value))
}

async fn update<E: Executor>(ps: &mut PreparedStatement<E>, values: &[Value]) -> Result<u64> {
    bind(ps, values)?;
    ps.execute_update().await
}

/// Execute an insert, returns the generated columns by label.
async fn insert<E: Executor>(ps: &mut PreparedStatement<E>, values: &[Value]) -> Result<Vec<(String, Value)>> {
    bind(ps, values)?;
    ps.execute_update().await?;

    let mut generated = Vec::new();
    let Some(keys) = ps.generated_keys() else {
        return Ok(generated);
    };
    if keys.next().await? {
        for i in 1..=keys.fields().len() {
            let name = keys.fields()[i - 1].name().to_owned();
            generated.push((name, keys.get_value(i)?));
        }
    }
    Ok(generated)
}

async fn select<E: Executor>(ps: &mut PreparedStatement<E>, values: &[Value]) -> Result<Option<Tuple>> {
    bind(ps, values)?;
    let cursor = ps.execute_query().await?;
    match cursor.next().await? {
        true => cursor.current_tuple().cloned().map(Some),
        false => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ErrorKind, Session, SessionFactory,
        mock::{MockExecutor, Script, tuple},
        postgres::{PgFormat, Type},
        row::Field,
        statement::{ResultKind, Statement},
    };

    const SELECT: &str = "select id, name from t";

    fn fields() -> Vec<Field> {
        vec![
            Field::new("id", Type::Int4.oid(), PgFormat::Text),
            Field::new("name", Type::Text.oid(), PgFormat::Text),
        ]
    }

    fn mock() -> MockExecutor {
        MockExecutor::new()
            .script(Script::typed(
                SELECT,
                fields(),
                vec![tuple(&[Some("1"), Some("a")]), tuple(&[Some("2"), Some("b")])],
            ))
            .primary_key("t", &["id"])
    }

    fn updatable(session: &Session<MockExecutor>) -> Statement<MockExecutor> {
        session.create_statement_with(ResultKind::updatable())
    }

    #[tokio::test]
    async fn update_row_synthesizes_update() {
        let mock = mock();
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query(SELECT).await.unwrap();
        assert!(cursor.is_updatable().await.unwrap());

        assert!(cursor.next().await.unwrap());
        cursor.update_str(2, "x").unwrap();
        // nothing sent yet
        assert_eq!(log.last().sql, SELECT);

        cursor.update_row().await.unwrap();
        let update = log.last();
        assert_eq!(update.sql, "UPDATE t SET name = $1 WHERE id = $2");
        assert_eq!(update.params.get(1).unwrap().value(), Some(&b"x"[..]));
        assert_eq!(update.params.get(2).unwrap().value(), Some(&1i32.to_be_bytes()[..]));

        assert_eq!(cursor.get_str(2).unwrap().as_deref(), Some("x"));
        assert_eq!(cursor.get_i32(1).unwrap(), 1);

        let err = cursor.update_row().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::State(_)));
    }

    #[tokio::test]
    async fn cancel_drops_pending_edits() {
        let mock = mock();
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query(SELECT).await.unwrap();

        let err = cursor.update_str(2, "x").unwrap_err();
        assert!(err.to_string().contains("either before the start or after the end"));

        cursor.next().await.unwrap();
        cursor.update_str("name", "x").unwrap();
        cursor.cancel_row_updates().unwrap();
        assert!(cursor.update_row().await.is_err());
        assert_eq!(log.dispatches().len(), 1);
        assert_eq!(cursor.get_str(2).unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn delete_row_moves_back() {
        let mock = mock();
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query(SELECT).await.unwrap();

        assert!(cursor.absolute(1).unwrap());
        cursor.delete_row().await.unwrap();
        assert_eq!(log.last().sql, "DELETE FROM t WHERE id = $1");
        assert!(cursor.is_before_first().unwrap());

        assert!(cursor.next().await.unwrap());
        assert_eq!(cursor.get_i32(1).unwrap(), 2);
        assert!(!cursor.next().await.unwrap());
    }

    #[tokio::test]
    async fn insert_row_merges_generated_keys() {
        let mock = mock().script(
            Script::typed(
                "INSERT INTO t (name) VALUES ($1)\nRETURNING *",
                fields(),
                vec![tuple(&[Some("3"), Some("c")])],
            )
            .with_status("INSERT", 1),
        );
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query(SELECT).await.unwrap();
        cursor.next().await.unwrap();

        let err = cursor.insert_row().await.unwrap_err();
        assert!(err.to_string().contains("Not on the insert row."));

        cursor.move_to_insert_row().unwrap();
        let err = cursor.insert_row().await.unwrap_err();
        assert!(err.to_string().contains("You must specify at least one column value to insert a row."));
        assert!(cursor.update_row().await.is_err());
        assert!(cursor.delete_row().await.is_err());

        cursor.update_str(2, "c").unwrap();
        cursor.insert_row().await.unwrap();
        assert_eq!(log.last().sql, "INSERT INTO t (name) VALUES ($1)\nRETURNING *");

        cursor.move_to_current_row().unwrap();
        assert_eq!(cursor.get_i32(1).unwrap(), 1);
        assert!(cursor.last().unwrap());
        assert_eq!(cursor.get_i32(1).unwrap(), 3);
        assert_eq!(cursor.get_str(2).unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn refresh_row_reads_again() {
        let mock = mock().script(Script::typed(
            "SELECT id, name FROM t WHERE id = $1",
            fields(),
            vec![tuple(&[Some("1"), Some("fresh")])],
        ));
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query(SELECT).await.unwrap();

        // not on a row, nothing to refresh
        cursor.refresh_row().await.unwrap();

        cursor.next().await.unwrap();
        cursor.refresh_row().await.unwrap();
        assert_eq!(cursor.get_str(2).unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn oid_column_is_the_key() {
        let fields = vec![
            Field::new("oid", Type::Oid.oid(), PgFormat::Text),
            Field::new("name", Type::Text.oid(), PgFormat::Text),
        ];
        let mock = MockExecutor::new().script(Script::typed(
            "select oid, name from t",
            fields,
            vec![tuple(&[Some("99"), Some("a")])],
        ));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query("select oid, name from t").await.unwrap();
        cursor.next().await.unwrap();
        cursor.update_null(2).unwrap();
        cursor.update_row().await.unwrap();
        assert_eq!(log.last().sql, "UPDATE t SET name = $1 WHERE oid = $2");
        assert_eq!(cursor.get_str(2).unwrap(), None);
    }

    #[tokio::test]
    async fn not_updatable() {
        let mock = mock()
            .script(Script::rows("select * from t, u", &["id"], &[&["1"]]))
            .script(Script::rows("select name from t", &["name"], &[&["a"]]));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);

        let mut stmt = session.create_statement();
        let cursor = stmt.execute_query(SELECT).await.unwrap();
        cursor.next().await.unwrap();
        let err = cursor.update_str(2, "x").unwrap_err();
        assert!(err.to_string().contains("ResultSets with concurrency CONCUR_READ_ONLY cannot be updated."));
        assert!(cursor.is_updatable().await.is_err());

        let mut stmt = updatable(&session);
        let cursor = stmt.execute_query("select * from t, u").await.unwrap();
        assert!(!cursor.is_updatable().await.unwrap());
        cursor.next().await.unwrap();
        cursor.update_str(1, "x").unwrap();
        let err = cursor.update_row().await.unwrap_err();
        assert!(err.to_string().contains("ResultSet is not updateable."));

        // the key column is not selected
        let cursor = stmt.execute_query("select name from t").await.unwrap();
        assert!(!cursor.is_updatable().await.unwrap());
        assert!(log.dispatches().iter().all(|d| !d.sql.starts_with("UPDATE")));
    }
}
