use crate::driver::Driver;
use crate::{Connection, DatabaseConfig, Dialect, Error, Query, QueryResult, TransactionResult};
use sqlx::pool::{Pool, PoolOptions};
use sqlx::Connection as _;
use tokio::sync::Mutex;

/// Mode of a SqlConnection, fixed when it's constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Statements run on connections acquired from a pool.
    Pooled,
    /// Statements run on a single dedicated connection.
    Direct,
}

// Slot is Unconnected while it holds None, and the pool or connection
// is created on first use. `end()` returns it to Unconnected.
enum Slot<DB: sqlx::Database> {
    Pooled(Mutex<Option<Pool<DB>>>),
    // The connection is held locked for the whole of a statement or
    // transaction, so callers sharing it are serialized.
    Direct(Mutex<Option<DB::Connection>>),
}

enum State {
    MySql(Slot<sqlx::MySql>),
    Postgres(Slot<sqlx::Postgres>),
    Sqlite(Slot<sqlx::Sqlite>),
}

/// SqlConnection implements Connection over any supported dialect.
pub struct SqlConnection {
    config: DatabaseConfig,
    close_pool: bool,
    state: State,
}

impl std::fmt::Debug for SqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlConnection")
            .field("config", &self.config)
            .field("mode", &self.mode())
            .finish()
    }
}

impl SqlConnection {
    pub fn new(config: DatabaseConfig, mode: Mode) -> Self {
        let state = match config.dialect {
            Dialect::MySql => State::MySql(Slot::new(mode)),
            Dialect::Postgres => State::Postgres(Slot::new(mode)),
            Dialect::Sqlite => State::Sqlite(Slot::new(mode)),
        };
        Self {
            close_pool: config.closes_pool_on_end(),
            config,
            state,
        }
    }

    pub fn mode(&self) -> Mode {
        match &self.state {
            State::MySql(slot) => slot.mode(),
            State::Postgres(slot) => slot.mode(),
            State::Sqlite(slot) => slot.mode(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Connection for SqlConnection {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error> {
        log(&self.config, query);

        match &self.state {
            State::MySql(slot) => slot.execute(&self.config, query).await,
            State::Postgres(slot) => slot.execute(&self.config, query).await,
            State::Sqlite(slot) => slot.execute(&self.config, query).await,
        }
    }

    async fn execute_transaction(&self, queries: &[Query]) -> Result<TransactionResult, Error> {
        match &self.state {
            State::MySql(slot) => slot.execute_transaction(&self.config, queries).await?,
            State::Postgres(slot) => slot.execute_transaction(&self.config, queries).await?,
            State::Sqlite(slot) => slot.execute_transaction(&self.config, queries).await?,
        }
        Ok(TransactionResult::success())
    }

    async fn end(&self) -> Result<(), Error> {
        match &self.state {
            State::MySql(slot) => slot.end(&self.config, self.close_pool).await,
            State::Postgres(slot) => slot.end(&self.config, self.close_pool).await,
            State::Sqlite(slot) => slot.end(&self.config, self.close_pool).await,
        }
    }
}

impl<DB: Driver> Slot<DB> {
    fn new(mode: Mode) -> Self {
        match mode {
            Mode::Pooled => Slot::Pooled(Mutex::new(None)),
            Mode::Direct => Slot::Direct(Mutex::new(None)),
        }
    }

    fn mode(&self) -> Mode {
        match self {
            Slot::Pooled(_) => Mode::Pooled,
            Slot::Direct(_) => Mode::Direct,
        }
    }

    async fn execute(&self, config: &DatabaseConfig, query: &Query) -> Result<QueryResult, Error> {
        match self {
            Slot::Pooled(slot) => {
                let pool = pool(config, slot).await?;
                let mut conn = pool.acquire().await.map_err(Error::Query)?;
                DB::run(&mut *conn, query).await.map_err(Error::Query)
            }
            Slot::Direct(slot) => {
                let mut slot = slot.lock().await;
                let conn = direct::<DB>(config, &mut *slot).await?;
                DB::run(conn, query).await.map_err(Error::Query)
            }
        }
    }

    async fn execute_transaction(
        &self,
        config: &DatabaseConfig,
        queries: &[Query],
    ) -> Result<(), Error> {
        match self {
            Slot::Pooled(slot) => {
                let pool = pool(config, slot).await.map_err(Error::into_transaction)?;
                // The transaction holds its pooled connection exclusively until it completes.
                let txn = pool.begin().await.map_err(Error::Transaction)?;
                run_transaction(config, txn, queries).await
            }
            Slot::Direct(slot) => {
                let mut slot = slot.lock().await;
                let conn = direct::<DB>(config, &mut *slot)
                    .await
                    .map_err(Error::into_transaction)?;
                let txn = conn.begin().await.map_err(Error::Transaction)?;
                run_transaction(config, txn, queries).await
            }
        }
    }

    async fn end(&self, config: &DatabaseConfig, close_pool: bool) -> Result<(), Error> {
        match self {
            Slot::Direct(slot) => {
                let conn = slot.lock().await.take();

                if let Some(conn) = conn {
                    conn.close().await.map_err(Error::Query)?;
                    tracing::debug!(dialect = ?config.dialect, "closed direct connection");
                }
            }
            Slot::Pooled(slot) if close_pool => {
                let pool = slot.lock().await.take();

                if let Some(pool) = pool {
                    pool.close().await;
                    tracing::debug!(dialect = ?config.dialect, "closed connection pool");
                }
            }
            Slot::Pooled(_) => (),
        }
        Ok(())
    }
}

fn log(config: &DatabaseConfig, query: &Query) {
    if config.logging {
        tracing::info!(
            statement = %query.statement,
            inputs = ?query.inputs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "executing SQL"
        );
    }
}

// Returns the pool, creating it if this is its first use.
async fn pool<DB: Driver>(
    config: &DatabaseConfig,
    slot: &Mutex<Option<Pool<DB>>>,
) -> Result<Pool<DB>, Error> {
    let mut slot = slot.lock().await;

    if let Some(pool) = slot.as_ref() {
        return Ok(pool.clone());
    }
    let url = config.connect_url()?;

    // Connections are established as statements demand them.
    let pool = PoolOptions::<DB>::new()
        .max_connections(config.connections_limit)
        .connect_lazy(&url)
        .map_err(Error::Query)?;

    tracing::debug!(
        dialect = ?config.dialect,
        limit = config.connections_limit,
        "created connection pool"
    );
    Ok(slot.insert(pool).clone())
}

// Returns the direct connection, establishing it if this is its first use.
async fn direct<'s, DB: Driver>(
    config: &DatabaseConfig,
    slot: &'s mut Option<DB::Connection>,
) -> Result<&'s mut DB::Connection, Error> {
    let conn = match slot.take() {
        Some(conn) => conn,
        None => {
            let url = config.connect_url()?;
            let conn = <DB::Connection as sqlx::Connection>::connect(&url)
                .await
                .map_err(Error::Query)?;

            tracing::debug!(dialect = ?config.dialect, "established direct connection");
            conn
        }
    };
    Ok(slot.insert(conn))
}

async fn run_transaction<DB: Driver>(
    config: &DatabaseConfig,
    mut txn: sqlx::Transaction<'_, DB>,
    queries: &[Query],
) -> Result<(), Error> {
    for (index, query) in queries.iter().enumerate() {
        log(config, query);

        if let Err(err) = DB::run(&mut *txn, query).await {
            tracing::debug!(index, error = %err, "transaction statement failed; rolling back");

            if let Err(rollback) = txn.rollback().await {
                tracing::warn!(error = %rollback, "failed to roll back transaction");
            }
            return Err(Error::Transaction(err));
        }
    }
    txn.commit().await.map_err(Error::Transaction)
}
