//! Session context shared by statements and cursors.
use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};
use tokio::sync::MutexGuard;

use crate::{
    Config, Result,
    common::{log_warn, span, verbose},
    executor::Executor,
    flags::QueryFlags,
    query::{CacheKey, NameGenerator, ParseContext, PortalName, QueryCache, QueryHandle, StatementName},
    registry::TypeRegistry,
    statement::{CallableStatement, PreparedStatement, ResultKind, Statement},
    temporal::TimestampUtils,
};

/// Creates sessions and hands out their ids.
#[derive(Debug)]
pub struct SessionFactory {
    next_id: AtomicU64,
    config: Config,
    registry: Arc<TypeRegistry>,
}

impl SessionFactory {
    pub fn new(config: Config) -> SessionFactory {
        SessionFactory { next_id: AtomicU64::new(1), config, registry: Arc::default() }
    }

    /// Factory configured from environment, see [`Config::from_env`].
    pub fn from_env() -> SessionFactory {
        SessionFactory::new(Config::from_env())
    }

    /// Set the custom type handlers of every session.
    pub fn with_registry(mut self, registry: TypeRegistry) -> SessionFactory {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wrap a connected executor into a session.
    ///
    /// Server capabilities are read once here.
    pub fn open<E: Executor>(&self, executor: E) -> Session<E> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        span!("open", id);
        let config = self.config.clone();

        let cx = ParseContext {
            std_strings: executor.standard_conforming_strings(),
            select_from_call: executor.server_version_at_least(8, 1),
        };
        let utils = Arc::new(TimestampUtils::new(
            executor.server_version_at_least(8, 2),
            !executor.integer_datetimes(),
            config.timezone,
        ));

        let pending = Arc::new(Pending::default());
        let cache = QueryCache::new(config.cache_queries, config.cache_bytes(), {
            let pending = pending.clone();
            move |mut handle: QueryHandle| {
                if let Some(name) = handle.unprepare() {
                    pending.statement(name);
                }
            }
        });

        verbose!(id, "session opened");

        Session {
            inner: Arc::new(Inner {
                id,
                cancel_sender: executor.cancel_sender(),
                executor: tokio::sync::Mutex::new(executor),
                cancel_lock: Arc::default(),
                cache,
                pending,
                names: NameGenerator::default(),
                auto_commit: AtomicBool::new(config.auto_commit),
                cx,
                utils,
                registry: self.registry.clone(),
                config,
            }),
        }
    }
}

impl Default for SessionFactory {
    fn default() -> Self {
        SessionFactory::new(Config::default())
    }
}

/// Server side objects waiting to be closed.
#[derive(Default)]
struct Pending {
    statements: Mutex<Vec<StatementName>>,
    portals: Mutex<Vec<PortalName>>,
}

impl Pending {
    fn statement(&self, name: StatementName) {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner).push(name);
    }

    fn portal(&self, name: PortalName) {
        self.portals.lock().unwrap_or_else(PoisonError::into_inner).push(name);
    }

    fn take_statements(&self) -> Vec<StatementName> {
        std::mem::take(&mut *self.statements.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn take_portals(&self) -> Vec<PortalName> {
        std::mem::take(&mut *self.portals.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

struct Inner<E: Executor> {
    id: u64,
    executor: tokio::sync::Mutex<E>,
    cancel_sender: E::Cancel,
    cancel_lock: Arc<tokio::sync::Mutex<()>>,
    cache: QueryCache,
    pending: Arc<Pending>,
    names: NameGenerator,
    auto_commit: AtomicBool,
    cx: ParseContext,
    utils: Arc<TimestampUtils>,
    registry: Arc<TypeRegistry>,
    config: Config,
}

/// A database session.
///
/// Cheap to clone, every clone shares the executor, the query cache and
/// the statement names.
pub struct Session<E: Executor> {
    inner: Arc<Inner<E>>,
}

impl<E: Executor> Session<E> {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn auto_commit(&self) -> bool {
        self.inner.auto_commit.load(Ordering::Acquire)
    }

    pub fn set_auto_commit(&self, value: bool) {
        self.inner.auto_commit.store(value, Ordering::Release);
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    /// Temporal codec of this session.
    pub fn timestamp_utils(&self) -> &Arc<TimestampUtils> {
        &self.inner.utils
    }

    /// Number of queries waiting in the cache.
    pub fn cached_queries(&self) -> usize {
        self.inner.cache.len()
    }

    /// Drop every cached query, named statements are closed on the next
    /// round trip.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// A statement for ad hoc sql.
    pub fn create_statement(&self) -> Statement<E> {
        self.create_statement_with(ResultKind::default())
    }

    pub fn create_statement_with(&self, kind: ResultKind) -> Statement<E> {
        Statement::new(self.clone(), kind)
    }

    /// Parse `sql` into a reusable statement, `?` are its parameters.
    pub fn prepare_statement(&self, sql: &str) -> Result<PreparedStatement<E>> {
        self.prepare_statement_with(sql, ResultKind::default())
    }

    pub fn prepare_statement_with(&self, sql: &str, kind: ResultKind) -> Result<PreparedStatement<E>> {
        let key = CacheKey::new(sql, self.inner.config.escape_processing);
        PreparedStatement::new(self.clone(), key, kind, false)
    }

    /// Prepare a statement that returns generated `columns`, all when empty.
    pub fn prepare_statement_returning(&self, sql: &str, columns: &[&str]) -> Result<PreparedStatement<E>> {
        let columns = columns.iter().map(|&c| c.to_owned()).collect();
        let key = CacheKey::returning(sql, self.inner.config.escape_processing, columns);
        PreparedStatement::new(self.clone(), key, ResultKind::default(), true)
    }

    /// Prepare a function or procedure call, `{? = call f(?)}`.
    pub fn prepare_call(&self, sql: &str) -> Result<CallableStatement<E>> {
        self.prepare_call_with(sql, ResultKind::default())
    }

    pub fn prepare_call_with(&self, sql: &str, kind: ResultKind) -> Result<CallableStatement<E>> {
        let key = CacheKey::callable(sql, self.inner.config.escape_processing);
        CallableStatement::new(self.clone(), key, kind)
    }

    /// Current transaction isolation level.
    ///
    /// Unknown or missing values are reported as [`IsolationLevel::ReadCommitted`].
    pub async fn transaction_isolation(&self) -> Result<IsolationLevel> {
        let mut stmt = self.create_statement();
        stmt.execute_with_flags("SHOW TRANSACTION ISOLATION LEVEL", QueryFlags::SUPPRESS_BEGIN)
            .await?;

        let mut level = None;
        if let Some(cursor) = stmt.result_set() {
            if cursor.next().await? {
                level = cursor.get_str(1)?;
            }
        }
        stmt.close();

        let parsed = level.as_deref().and_then(IsolationLevel::parse);
        Ok(parsed.unwrap_or_else(|| {
            log_warn!("unknown transaction isolation {level:?}, assuming READ COMMITTED");
            IsolationLevel::ReadCommitted
        }))
    }

    pub(crate) fn names(&self) -> &NameGenerator {
        &self.inner.names
    }

    pub(crate) fn canceller(&self) -> crate::cancel::Canceller<E::Cancel> {
        crate::cancel::Canceller::new(self.inner.cancel_sender.clone(), self.inner.cancel_lock.clone())
    }

    pub(crate) fn borrow_query(&self, key: CacheKey) -> Result<QueryHandle> {
        span!("borrow_query", session = self.inner.id, sql = key.sql());
        let cx = self.inner.cx;
        self.inner.cache.borrow(key, |key| QueryHandle::parse(key, cx))
    }

    pub(crate) fn release_query(&self, handle: QueryHandle) {
        self.inner.cache.release(handle);
    }

    pub(crate) fn close_statement_later(&self, name: StatementName) {
        self.inner.pending.statement(name);
    }

    pub(crate) fn close_portal_later(&self, name: PortalName) {
        self.inner.pending.portal(name);
    }

    /// Lock the executor for a round trip, after closing what is pending.
    pub(crate) async fn lock(&self) -> Result<MutexGuard<'_, E>> {
        let mut exec = self.inner.executor.lock().await;
        let pending = &self.inner.pending;

        let mut statements = pending.take_statements().into_iter();
        while let Some(name) = statements.next() {
            verbose!(%name, "close statement");
            if let Err(err) = exec.close_statement(&name).await {
                pending.statement(name);
                statements.for_each(|name| pending.statement(name));
                return Err(err);
            }
        }

        let mut portals = pending.take_portals().into_iter();
        while let Some(name) = portals.next() {
            verbose!(%name, "close portal");
            if let Err(err) = exec.close_portal(&name).await {
                pending.portal(name);
                portals.for_each(|name| pending.portal(name));
                return Err(err);
            }
        }

        Ok(exec)
    }
}

impl<E: Executor> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<E: Executor> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("auto_commit", &self.auto_commit())
            .field("cache", &self.inner.cache)
            .finish()
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Parse the server text, ignoring case.
    pub fn parse(level: &str) -> Option<IsolationLevel> {
        let level = level.trim();
        [
            ("READ UNCOMMITTED", IsolationLevel::ReadUncommitted),
            ("READ COMMITTED", IsolationLevel::ReadCommitted),
            ("REPEATABLE READ", IsolationLevel::RepeatableRead),
            ("SERIALIZABLE", IsolationLevel::Serializable),
        ]
        .into_iter()
        .find_map(|(name, value)| name.eq_ignore_ascii_case(level).then_some(value))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockExecutor, Script};

    #[test]
    fn factory_hands_out_ids() {
        let factory = SessionFactory::default();
        let a = factory.open(MockExecutor::new());
        let b = factory.open(MockExecutor::new());
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(a.clone().id(), 1);
        assert!(a.auto_commit());
        a.set_auto_commit(false);
        assert!(!a.auto_commit());
        assert!(b.auto_commit());
    }

    #[tokio::test]
    async fn isolation_level_is_lenient() {
        let factory = SessionFactory::default();
        let mock = MockExecutor::new()
            .script(Script::rows("SHOW TRANSACTION ISOLATION LEVEL", &["transaction_isolation"], &[&["serializable"]]));
        let session = factory.open(mock);
        assert_eq!(session.transaction_isolation().await.unwrap(), IsolationLevel::Serializable);

        let mock = MockExecutor::new()
            .script(Script::rows("SHOW TRANSACTION ISOLATION LEVEL", &["transaction_isolation"], &[&["snapshot"]]));
        let session = factory.open(mock);
        assert_eq!(session.transaction_isolation().await.unwrap(), IsolationLevel::ReadCommitted);

        let mock = MockExecutor::new()
            .script(Script::rows("SHOW TRANSACTION ISOLATION LEVEL", &["transaction_isolation"], &[]));
        let session = factory.open(mock);
        assert_eq!(session.transaction_isolation().await.unwrap(), IsolationLevel::ReadCommitted);
    }

    #[test]
    fn parse_isolation() {
        assert_eq!(IsolationLevel::parse(" repeatable read"), Some(IsolationLevel::RepeatableRead));
        assert_eq!(IsolationLevel::parse("nope"), None);
        assert_eq!(IsolationLevel::Serializable.as_str(), "SERIALIZABLE");
    }
}
