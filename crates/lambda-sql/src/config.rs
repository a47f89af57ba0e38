use derivative::Derivative;

/// Dialect of a relational database.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Prefix of the environment variables which configure this dialect.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Dialect::MySql => "MYSQL",
            Dialect::Postgres => "POSTGRES",
            Dialect::Sqlite => "SQLITE",
        }
    }
}

/// Environment in which the function is deployed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Environment {
    Development,
    Test,
    #[default]
    Production,
}

/// PoolTeardown controls whether `Connection::end` also closes a pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PoolTeardown {
    /// Close the pool only when running with `LAMBDA_ENV=test`.
    /// Otherwise the pool outlives the invocation within a warm process.
    #[default]
    TestOnly,
    /// Close the pool at the end of every invocation.
    Always,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing database configuration: {0} is not set")]
    Missing(String),
    #[error("invalid database configuration")]
    Invalid(#[from] clap::Error),
    #[error("invalid database URL")]
    Url(#[from] url::ParseError),
    #[error("{0} cannot be represented in a database URL")]
    Malformed(&'static str),
}

/// Connection settings of a MySQL database.
#[derive(Derivative, Clone, clap::Parser)]
#[derivative(Debug)]
pub struct MysqlArgs {
    /// Full connection URL, which overrides all other connection settings.
    #[derivative(Debug = "ignore")]
    #[clap(long = "mysql-url", env = "MYSQL_URL")]
    pub url: Option<String>,
    #[clap(long = "mysql-host", env = "MYSQL_HOST")]
    pub host: Option<String>,
    #[clap(long = "mysql-port", env = "MYSQL_PORT")]
    pub port: Option<u16>,
    #[clap(long = "mysql-db", env = "MYSQL_DB")]
    pub database: Option<String>,
    #[clap(long = "mysql-user", env = "MYSQL_USER")]
    pub user: Option<String>,
    #[derivative(Debug = "ignore")]
    #[clap(long = "mysql-pass", env = "MYSQL_PASS")]
    pub password: Option<String>,
    /// Maximum number of pooled connections.
    #[clap(
        long = "mysql-connections-limit",
        env = "MYSQL_CONNECTIONS_LIMIT",
        default_value = "10"
    )]
    pub connections_limit: u32,
    #[clap(
        long = "mysql-pool-teardown",
        env = "MYSQL_POOL_TEARDOWN",
        value_enum,
        default_value = "test-only"
    )]
    pub pool_teardown: PoolTeardown,
    /// Log every executed statement with its inputs.
    #[clap(
        long = "sql-logging",
        env = "SQL_LOGGING",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub logging: bool,
    #[clap(
        long = "environment",
        env = "LAMBDA_ENV",
        value_enum,
        default_value = "production"
    )]
    pub environment: Environment,
}

/// Connection settings of a Postgres database.
#[derive(Derivative, Clone, clap::Parser)]
#[derivative(Debug)]
pub struct PostgresArgs {
    /// Full connection URL, which overrides all other connection settings.
    #[derivative(Debug = "ignore")]
    #[clap(long = "postgres-url", env = "POSTGRES_URL")]
    pub url: Option<String>,
    #[clap(long = "postgres-host", env = "POSTGRES_HOST")]
    pub host: Option<String>,
    #[clap(long = "postgres-port", env = "POSTGRES_PORT")]
    pub port: Option<u16>,
    #[clap(long = "postgres-db", env = "POSTGRES_DB")]
    pub database: Option<String>,
    #[clap(long = "postgres-user", env = "POSTGRES_USER")]
    pub user: Option<String>,
    #[derivative(Debug = "ignore")]
    #[clap(long = "postgres-pass", env = "POSTGRES_PASS")]
    pub password: Option<String>,
    /// Maximum number of pooled connections.
    #[clap(
        long = "postgres-connections-limit",
        env = "POSTGRES_CONNECTIONS_LIMIT",
        default_value = "10"
    )]
    pub connections_limit: u32,
    #[clap(
        long = "postgres-pool-teardown",
        env = "POSTGRES_POOL_TEARDOWN",
        value_enum,
        default_value = "test-only"
    )]
    pub pool_teardown: PoolTeardown,
    /// Log every executed statement with its inputs.
    #[clap(
        long = "sql-logging",
        env = "SQL_LOGGING",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub logging: bool,
    #[clap(
        long = "environment",
        env = "LAMBDA_ENV",
        value_enum,
        default_value = "production"
    )]
    pub environment: Environment,
}

/// DatabaseConfig is the resolved configuration of a SqlConnection.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    #[derivative(Debug = "ignore")]
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    #[derivative(Debug = "ignore")]
    pub password: Option<String>,
    pub connections_limit: u32,
    pub pool_teardown: PoolTeardown,
    pub logging: bool,
    pub environment: Environment,
}

impl DatabaseConfig {
    /// Build a DatabaseConfig of a complete connection URL, with default settings.
    pub fn from_url(dialect: Dialect, url: impl Into<String>) -> Self {
        Self {
            dialect,
            url: Some(url.into()),
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            connections_limit: 10,
            pool_teardown: PoolTeardown::default(),
            logging: false,
            environment: Environment::default(),
        }
    }

    /// Read the MySQL configuration from `MYSQL_*` environment variables.
    pub fn mysql_from_env() -> Result<Self, ConfigError> {
        Ok(<MysqlArgs as clap::Parser>::try_parse_from(["lambda-sql"])?.into())
    }

    /// Read the Postgres configuration from `POSTGRES_*` environment variables.
    pub fn postgres_from_env() -> Result<Self, ConfigError> {
        Ok(<PostgresArgs as clap::Parser>::try_parse_from(["lambda-sql"])?.into())
    }

    /// Whether `Connection::end` should close a pool.
    pub fn closes_pool_on_end(&self) -> bool {
        match self.pool_teardown {
            PoolTeardown::Always => true,
            PoolTeardown::TestOnly => self.environment == Environment::Test,
        }
    }

    /// Connection URL of this configuration.
    /// A missing host is reported here, at first use, rather than at construction.
    pub fn connect_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let Some(host) = self.host.as_deref() else {
            return Err(ConfigError::Missing(format!(
                "{}_HOST",
                self.dialect.env_prefix()
            )));
        };

        let mut url = url::Url::parse(&format!("{}://localhost", self.dialect.scheme()))?;
        url.set_host(Some(host))?;
        url.set_port(self.port)
            .map_err(|()| ConfigError::Malformed("port"))?;

        if let Some(user) = &self.user {
            url.set_username(user)
                .map_err(|()| ConfigError::Malformed("user"))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|()| ConfigError::Malformed("password"))?;
        }
        if let Some(database) = &self.database {
            url.set_path(&format!("/{database}"));
        }
        Ok(url.to_string())
    }
}

impl From<MysqlArgs> for DatabaseConfig {
    fn from(args: MysqlArgs) -> Self {
        let MysqlArgs {
            url,
            host,
            port,
            database,
            user,
            password,
            connections_limit,
            pool_teardown,
            logging,
            environment,
        } = args;

        Self {
            dialect: Dialect::MySql,
            url,
            host,
            port,
            database,
            user,
            password,
            connections_limit,
            pool_teardown,
            logging,
            environment,
        }
    }
}

impl From<PostgresArgs> for DatabaseConfig {
    fn from(args: PostgresArgs) -> Self {
        let PostgresArgs {
            url,
            host,
            port,
            database,
            user,
            password,
            connections_limit,
            pool_teardown,
            logging,
            environment,
        } = args;

        Self {
            dialect: Dialect::Postgres,
            url,
            host,
            port,
            database,
            user,
            password,
            connections_limit,
            pool_teardown,
            logging,
            environment,
        }
    }
}
