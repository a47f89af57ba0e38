use crate::{
    ConfigError, Connection, DatabaseConfig, Error, Mode, Query, QueryResult, SqlConnection,
    TransactionResult,
};

/// Mysql is the MySQL database component, configured from `MYSQL_*` variables.
#[derive(Debug)]
pub struct Mysql(SqlConnection);

/// Postgres is the Postgres database component, configured from `POSTGRES_*` variables.
#[derive(Debug)]
pub struct Postgres(SqlConnection);

impl Mysql {
    /// Build a pooled Mysql from the environment.
    /// No connection is made until the first statement executes.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_mode(Mode::Pooled)
    }

    pub fn from_env_with_mode(mode: Mode) -> Result<Self, ConfigError> {
        Ok(Self::new(DatabaseConfig::mysql_from_env()?, mode))
    }

    pub fn new(config: DatabaseConfig, mode: Mode) -> Self {
        Self(SqlConnection::new(config, mode))
    }
}

impl Postgres {
    /// Build a pooled Postgres from the environment.
    /// No connection is made until the first statement executes.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_mode(Mode::Pooled)
    }

    pub fn from_env_with_mode(mode: Mode) -> Result<Self, ConfigError> {
        Ok(Self::new(DatabaseConfig::postgres_from_env()?, mode))
    }

    pub fn new(config: DatabaseConfig, mode: Mode) -> Self {
        Self(SqlConnection::new(config, mode))
    }
}

impl std::ops::Deref for Mysql {
    type Target = SqlConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::Deref for Postgres {
    type Target = SqlConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait::async_trait]
impl Connection for Mysql {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error> {
        self.0.execute(query).await
    }
    async fn execute_transaction(&self, queries: &[Query]) -> Result<TransactionResult, Error> {
        self.0.execute_transaction(queries).await
    }
    async fn end(&self) -> Result<(), Error> {
        self.0.end().await
    }
}

#[async_trait::async_trait]
impl Connection for Postgres {
    async fn execute(&self, query: &Query) -> Result<QueryResult, Error> {
        self.0.execute(query).await
    }
    async fn execute_transaction(&self, queries: &[Query]) -> Result<TransactionResult, Error> {
        self.0.execute_transaction(queries).await
    }
    async fn end(&self) -> Result<(), Error> {
        self.0.end().await
    }
}
