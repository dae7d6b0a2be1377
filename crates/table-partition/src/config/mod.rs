//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::expr::Expr;
use crate::core::key::{KeyColumn, KeySchema};
use crate::dialect::{common_key_types, Dialect, DialectImpl};
use crate::error::Result;
use crate::partition::assembler::base_filter;
use crate::source::TableRef;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration.
    ///
    /// Written into every partition config so a runner can tell which
    /// configuration generated it.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn source_dialect(&self) -> Result<DialectImpl> {
        DialectImpl::from_name(&self.source.r#type)
    }

    pub fn target_dialect(&self) -> Result<DialectImpl> {
        DialectImpl::from_name(&self.target.r#type)
    }

    /// Key schema from the declared primary keys.
    ///
    /// Each column's type must be renderable by both the source and the
    /// target dialect.
    pub fn key_schema(&self) -> Result<KeySchema> {
        let source = self.source_dialect()?;
        let target = self.target_dialect()?;
        let dialects: [&dyn Dialect; 2] = [&source, &target];
        let supported = common_key_types(&dialects);

        let columns = self
            .partition
            .primary_keys
            .iter()
            .map(|pk| KeyColumn::from_declared(&pk.name, &pk.r#type, &supported))
            .collect::<Result<Vec<_>>>()?;
        KeySchema::new(columns)
    }

    /// Configured base filter as an opaque expression.
    pub fn base_filter(&self) -> Result<Option<Expr>> {
        base_filter(self.partition.filter.as_deref())
    }

    pub fn source_table(&self) -> TableRef {
        TableRef::new(self.source.schema(), self.partition.source_table())
    }

    pub fn target_table(&self) -> TableRef {
        TableRef::new(self.target.schema(), self.partition.target_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::KeyType;
    use crate::error::PartitionError;

    const YAML: &str = r#"
source:
  type: mssql
  host: src.example.com
  database: sales
  user: reader
  password: secret
target:
  host: dst.example.com
  database: warehouse
  user: loader
  password: secret2
  schema: staging
partition:
  table: orders
  target_table: orders_copy
  primary_keys:
    - { name: region, type: "varchar(20)" }
    - { name: id, type: bigint }
  filter: "status <> 'void'"
  partition_count: 8
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();

        assert_eq!(config.source.port(), 1433);
        assert_eq!(config.source.schema(), "dbo");
        assert_eq!(config.target.r#type, "postgres");
        assert_eq!(config.target.port(), 5432);
        assert_eq!(config.target.schema(), "staging");
        assert_eq!(config.target.ssl_mode, "disable");

        assert_eq!(config.partition.probe_rows, 10_000);
        assert_eq!(config.partition.output_dir, Path::new("partitions"));
        assert!(!config.partition.check_coverage);

        assert_eq!(config.source_table().to_string(), "dbo.orders");
        assert_eq!(config.target_table().to_string(), "staging.orders_copy");
    }

    #[test]
    fn test_key_schema_from_declared_types() {
        let config = Config::from_yaml(YAML).unwrap();
        let schema = config.key_schema().unwrap();
        assert_eq!(schema.names(), vec!["region", "id"]);
        assert_eq!(schema.columns()[0].key_type, KeyType::String);
        assert_eq!(schema.columns()[1].key_type, KeyType::Integer);
    }

    #[test]
    fn test_key_schema_rejects_unrenderable_type() {
        let yaml = YAML.replace("type: bigint", "type: date");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, PartitionError::UnsupportedKeyType { .. }));
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Config::from_yaml(YAML).unwrap();
        let b = Config::from_yaml(YAML).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let c = Config::from_yaml(&YAML.replace("partition_count: 8", "partition_count: 9"))
            .unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.partition.table, "orders");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_yaml(YAML).unwrap();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("secret"));
    }
}
