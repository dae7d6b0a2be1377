//! PostgreSQL boundary source.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::config::SslMode;
use tokio_postgres::{Config as PgConfig, NoTls, SimpleQueryMessage};
use tracing::{debug, info};

use super::{BoundarySource, TableRef};
use crate::config::DatabaseConfig;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::key::{KeySchema, KeyTuple};
use crate::error::{PartitionError, Result};
use crate::partition::estimator::{MaterializedRows, RowProbe};

/// PostgreSQL connection pool used for boundary queries, probes and counts.
pub struct PgSource {
    pool: Pool,
}

impl PgSource {
    /// Connect to the database described by `config`.
    pub async fn new(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        if config.is_mssql() {
            return Err(PartitionError::Config(format!(
                "cannot connect to '{}' database {}: only postgres connections are supported",
                config.r#type, config.database
            )));
        }

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port());
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.ssl_mode(match config.ssl_mode.to_lowercase().as_str() {
            "prefer" => SslMode::Prefer,
            _ => SslMode::Disable,
        });

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| PartitionError::pool(e, "creating PostgreSQL pool"))?;

        let source = Self { pool };
        source.ping().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host,
            config.port(),
            config.database
        );

        Ok(source)
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| PartitionError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Count rows matching an already-rendered filter.
    pub async fn count_rows(&self, table: &TableRef, filter: Option<&str>) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| PartitionError::pool(e, "getting connection for count_rows"))?;

        let mut query = format!(
            "SELECT COUNT(*)::int8 FROM {}",
            qualify_pg(&table.schema, &table.name)?
        );
        if let Some(f) = filter {
            query.push_str(" WHERE ");
            query.push_str(f);
        }

        let row = client.query_one(&query, &[]).await?;
        Ok(row.get::<_, i64>(0).max(0) as u64)
    }

    /// Row probe over `table` in key order.
    pub fn probe<'a>(
        &'a self,
        table: &'a TableRef,
        schema: &'a KeySchema,
        filter: Option<&'a str>,
    ) -> PgProbe<'a> {
        PgProbe {
            source: self,
            table,
            schema,
            filter,
        }
    }
}

fn order_by(schema: &KeySchema) -> Result<String> {
    let cols = schema
        .columns()
        .iter()
        .map(|c| quote_pg(&c.name))
        .collect::<Result<Vec<_>>>()?;
    Ok(cols.join(", "))
}

/// Boundary query: rank rows by key (ties by physical position) and keep the
/// first row of each partition, `ceil(rn * N / total)` changing at `rn`.
fn boundary_query(table: &TableRef, schema: &KeySchema, n: usize) -> Result<String> {
    let select_keys = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| Ok(format!("{}::text AS k{}", quote_pg(&c.name)?, i)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let key_aliases = (0..schema.len())
        .map(|i| format!("k{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        r#"
        WITH numbered AS (
            SELECT {select_keys},
                   ROW_NUMBER() OVER (ORDER BY {order}, ctid) AS rn,
                   COUNT(*) OVER () AS total
            FROM {table}
        )
        SELECT {key_aliases}
        FROM numbered
        WHERE (rn * {n} + total - 1) / total > ((rn - 1) * {n} + total - 1) / total
        ORDER BY rn
        "#,
        order = order_by(schema)?,
        table = qualify_pg(&table.schema, &table.name)?,
    ))
}

#[async_trait]
impl BoundarySource for PgSource {
    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        self.count_rows(table, None).await
    }

    async fn fetch_boundaries(
        &self,
        table: &TableRef,
        schema: &KeySchema,
        n: usize,
    ) -> Result<Vec<KeyTuple>> {
        if n == 0 {
            return Err(PartitionError::InvalidPartitionCount(n));
        }
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| PartitionError::pool(e, "getting connection for fetch_boundaries"))?;

        let query = boundary_query(table, schema, n)?;
        debug!("Boundary query for {}: {}", table, query.trim());
        let rows = client.query(query.as_str(), &[]).await?;

        rows.iter()
            .map(|row| {
                let texts = (0..schema.len())
                    .map(|i| {
                        row.try_get::<_, Option<String>>(i)?.ok_or_else(|| {
                            PartitionError::Validation(format!(
                                "NULL in key column {} of {}",
                                schema.columns()[i].name,
                                table
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                schema.parse_tuple(&texts)
            })
            .collect()
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}

/// Materializes the first rows of a table in key order.
pub struct PgProbe<'a> {
    source: &'a PgSource,
    table: &'a TableRef,
    schema: &'a KeySchema,
    filter: Option<&'a str>,
}

#[async_trait]
impl RowProbe for PgProbe<'_> {
    async fn materialize(&self, limit: usize) -> Result<MaterializedRows> {
        let client =
            self.source.pool.get().await.map_err(|e| {
                PartitionError::pool(e, "getting connection for memory probe")
            })?;

        let mut query = format!(
            "SELECT * FROM {}",
            qualify_pg(&self.table.schema, &self.table.name)?
        );
        if let Some(f) = self.filter {
            query.push_str(" WHERE ");
            query.push_str(f);
        }
        query.push_str(&format!(
            " ORDER BY {} LIMIT {}",
            order_by(self.schema)?,
            limit
        ));

        // Simple protocol returns every column as text regardless of type
        let messages = client.simple_query(&query).await?;
        let rows: Vec<Vec<Option<String>>> = messages
            .into_iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .collect();

        Ok(MaterializedRows { rows })
    }
}
