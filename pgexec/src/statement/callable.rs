use super::{PreparedStatement, ResultKind};
use crate::{
    Error, Result, Session,
    executor::Executor,
    flags::QueryFlags,
    params::ParameterList,
    postgres::SqlType,
    query::CacheKey,
    value::Value,
};

/// A function or procedure call, `{? = call f(?)}`.
///
/// Out parameters are registered with their sql type before execution,
/// the single returned row is unpacked into them afterwards.
pub struct CallableStatement<E: Executor> {
    prepared: PreparedStatement<E>,
    outs: Option<Vec<Option<Value>>>,
    was_null: bool,
}

forward_statement!(CallableStatement, prepared.inner);
forward_params!(CallableStatement, prepared.params);

impl<E: Executor> CallableStatement<E> {
    pub(crate) fn new(session: Session<E>, key: CacheKey, kind: ResultKind) -> Result<Self> {
        let prepared = PreparedStatement::new(session, key, kind, false)?;
        Ok(CallableStatement { prepared, outs: None, was_null: false })
    }

    /// Declare parameter `index` as an out parameter of type `ty`.
    pub fn register_out_parameter(&mut self, index: usize, ty: SqlType) -> Result<()> {
        self.prepared.inner.check_closed()?;
        self.prepared.params.register_out(index, ty)
    }

    /// Execute the call, returns `true` if the first result is a row set.
    ///
    /// For functions with out parameters the row is consumed.
    pub async fn execute(&mut self) -> Result<bool> {
        self.outs = None;
        self.prepared.execute_with_flags(QueryFlags::empty()).await?;
        let has_rows = self.prepared.inner.first_is_rows();

        let is_function = self.prepared.query().is_some_and(|h| h.is_function());
        if !is_function || self.prepared.params.out_count() == 0 {
            return Ok(has_rows);
        }

        let outs = self.extract().await;
        self.prepared.inner.close_results();
        self.outs = Some(outs?);
        Ok(has_rows)
    }

    /// Execute a command, returns its update count.
    pub async fn execute_update(&mut self) -> Result<u64> {
        self.outs = None;
        self.prepared.execute_update().await
    }

    async fn extract(&mut self) -> Result<Vec<Option<Value>>> {
        let registered = self.prepared.params.out_types().to_vec();
        let out_count = self.prepared.params.out_count();

        let Some(cursor) = self.prepared.inner.result_set() else {
            return Err(Error::no_data("A CallableStatement was executed with nothing returned."));
        };
        if !cursor.next().await? {
            return Err(Error::no_data("A CallableStatement was executed with nothing returned."));
        }
        if cursor.fields().len() != out_count {
            return Err(Error::state("A CallableStatement was executed with an invalid number of parameters"));
        }

        let mut outs = vec![None; registered.len()];
        let mut column = 0;
        for (slot, ty) in outs.iter_mut().zip(registered) {
            let Some(ty) = ty else {
                continue;
            };
            column += 1;
            let actual = cursor.fields()[column - 1].ty().sql_type().normalized();
            let value = cursor.get_value(column)?;
            *slot = Some(match (actual, ty) {
                _ if actual == ty => value,
                (SqlType::Double, SqlType::Real) => match value {
                    Value::Float8(v) => Value::Float4(v as f32),
                    other => other,
                },
                _ => {
                    return Err(Error::mismatch(format!(
                        "A CallableStatement function was executed and the out parameter {column} \
                        was of type {actual:?} however type {ty:?} was registered."
                    )));
                }
            });
        }
        Ok(outs)
    }

    fn out(&mut self, index: usize) -> Result<&Value> {
        let Some(outs) = &self.outs else {
            return Err(match self.prepared.params.out_count() {
                0 => Error::state("No function outputs were registered."),
                _ => Error::state("Results cannot be retrieved from a CallableStatement before it is executed."),
            });
        };
        let len = outs.len();
        let slot = index
            .checked_sub(1)
            .and_then(|i| outs.get(i))
            .ok_or_else(|| Error::range(format!("The column index is out of range: {index}, number of columns: {len}.")))?;
        let value = slot
            .as_ref()
            .ok_or_else(|| Error::state(format!("Parameter {index} was not registered as an out parameter.")))?;
        self.was_null = value.is_null();
        Ok(value)
    }

    /// Returns `true` if the last out parameter read was `NULL`.
    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub fn get_value(&mut self, index: usize) -> Result<Value> {
        self.out(index).cloned()
    }

    pub fn get_bool(&mut self, index: usize) -> Result<bool> {
        match self.out(index)? {
            Value::Null => Ok(false),
            value => value.to_bool(),
        }
    }

    pub fn get_i16(&mut self, index: usize) -> Result<i16> {
        match self.out(index)? {
            Value::Null => Ok(0),
            value => value.to_i16(),
        }
    }

    pub fn get_i32(&mut self, index: usize) -> Result<i32> {
        match self.out(index)? {
            Value::Null => Ok(0),
            value => value.to_i32(),
        }
    }

    pub fn get_i64(&mut self, index: usize) -> Result<i64> {
        match self.out(index)? {
            Value::Null => Ok(0),
            value => value.to_i64(),
        }
    }

    pub fn get_f32(&mut self, index: usize) -> Result<f32> {
        match self.out(index)? {
            Value::Null => Ok(0.0),
            value => value.to_f32(),
        }
    }

    pub fn get_f64(&mut self, index: usize) -> Result<f64> {
        match self.out(index)? {
            Value::Null => Ok(0.0),
            value => value.to_f64(),
        }
    }

    pub fn get_numeric(&mut self, index: usize) -> Result<Option<String>> {
        match self.out(index)? {
            Value::Null => Ok(None),
            value => value.to_numeric().map(Some),
        }
    }

    pub fn get_str(&mut self, index: usize) -> Result<Option<String>> {
        let utils = self.prepared.inner.session.timestamp_utils().clone();
        match self.out(index)? {
            Value::Null => Ok(None),
            value => value.render(&utils, None).map(Some),
        }
    }

    pub fn close(&mut self) {
        self.outs = None;
        self.prepared.close();
    }
}

impl<E: Executor> std::fmt::Debug for CallableStatement<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableStatement")
            .field("prepared", &self.prepared)
            .field("executed", &self.outs.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ErrorKind, SessionFactory,
        mock::{MockExecutor, Script, tuple},
        postgres::{PgFormat, SqlType, Type},
        row::Field,
    };

    const SQL: &str = "select * from add_one($1,$2) as result";

    fn script(ty: Type, value: Option<&str>) -> Script {
        let fields = vec![Field::new("result", ty.oid(), PgFormat::Text)];
        Script::typed(SQL, fields, vec![tuple(&[value])])
    }

    #[tokio::test]
    async fn out_parameter_is_unpacked() {
        let mock = MockExecutor::new().script(script(Type::Int4, Some("2")));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut call = session.prepare_call("{? = call add_one(?)}").unwrap();

        let err = call.get_i32(1).unwrap_err();
        assert!(err.to_string().contains("No function outputs were registered."));

        call.register_out_parameter(1, SqlType::Integer).unwrap();
        call.set_i32(2, 1).unwrap();
        let err = call.get_i32(1).unwrap_err();
        assert!(err.to_string().contains("before it is executed"));

        call.execute().await.unwrap();
        assert_eq!(call.get_i32(1).unwrap(), 2);
        assert!(!call.was_null());
        assert!(call.result_set().is_none());
        assert!(call.get_i32(2).is_err());
        assert_eq!(log.last().sql, SQL);
        assert_eq!(log.last().params.get(1).unwrap().oid(), Type::Void.oid());
    }

    #[tokio::test]
    async fn null_out_parameter() {
        let mock = MockExecutor::new().script(script(Type::Int4, None));
        let session = SessionFactory::default().open(mock);
        let mut call = session.prepare_call("{? = call add_one(?)}").unwrap();
        call.register_out_parameter(1, SqlType::Integer).unwrap();
        call.set_i32(2, 1).unwrap();
        call.execute().await.unwrap();
        assert_eq!(call.get_i32(1).unwrap(), 0);
        assert!(call.was_null());
    }

    #[tokio::test]
    async fn double_widens_to_registered_real() {
        let mock = MockExecutor::new().script(script(Type::Float8, Some("1.5")));
        let session = SessionFactory::default().open(mock);
        let mut call = session.prepare_call("{? = call add_one(?)}").unwrap();
        call.register_out_parameter(1, SqlType::Real).unwrap();
        call.set_f64(2, 0.5).unwrap();
        call.execute().await.unwrap();
        assert_eq!(call.get_value(1).unwrap(), crate::value::Value::Float4(1.5));
    }

    #[tokio::test]
    async fn registered_type_must_match() {
        let mock = MockExecutor::new().script(script(Type::Int4, Some("2")));
        let session = SessionFactory::default().open(mock);
        let mut call = session.prepare_call("{? = call add_one(?)}").unwrap();
        call.register_out_parameter(1, SqlType::Varchar).unwrap();
        call.set_i32(2, 1).unwrap();
        let err = call.execute().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TypeMismatch(_)));
        assert!(err.to_string().contains("the out parameter 1 was of type Integer however type Varchar was registered."));
    }

    #[tokio::test]
    async fn nothing_returned() {
        let fields = vec![Field::new("result", Type::Int4.oid(), PgFormat::Text)];
        let mock = MockExecutor::new().script(crate::mock::Script::typed(SQL, fields, vec![]));
        let session = SessionFactory::default().open(mock);
        let mut call = session.prepare_call("{? = call add_one(?)}").unwrap();
        call.register_out_parameter(1, SqlType::Integer).unwrap();
        call.set_i32(2, 1).unwrap();
        let err = call.execute().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoData(_)));
    }
}
