use std::collections::BTreeSet;
use std::time::Duration;

/// Column naming conventions used to infer `description` and `active` roles.
///
/// The first column (in table order) whose name matches one of the listed
/// names, case-insensitively, gets the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConventions {
    /// Candidate names for the human readable description column.
    pub description: Vec<String>,
    /// Candidate names for the active/enabled flag column.
    pub active: Vec<String>,
}

impl Default for RoleConventions {
    fn default() -> Self {
        Self {
            description: vec!["description".into(), "name".into(), "title".into()],
            active: vec!["active".into(), "is_active".into(), "enabled".into()],
        }
    }
}

impl RoleConventions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the description candidates.
    pub fn description<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the active-flag candidates.
    pub fn active<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active = names.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn is_description(&self, column: &str) -> bool {
        self.description.iter().any(|n| n.eq_ignore_ascii_case(column))
    }

    pub(crate) fn is_active(&self, column: &str) -> bool {
        self.active.iter().any(|n| n.eq_ignore_ascii_case(column))
    }
}

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Emit a `tracing` debug event for each statement.
    pub log_statements: bool,
    /// Truncate SQL in log events and errors shown to monitors (bytes).
    pub max_sql_length: Option<usize>,
    /// Slow statement threshold; slower statements trigger `on_slow_query`.
    pub slow_query_threshold: Option<Duration>,
    /// Query `INFORMATION_SCHEMA` for foreign keys while fetching metadata.
    pub foreign_keys: bool,
    /// Run the children of a tree query concurrently when the driver allows it.
    pub concurrent_children: bool,
    /// Match text correlation values case-insensitively, ignoring trailing
    /// spaces, as MySQL's default collations do. Disable for binary or
    /// case-sensitive key columns.
    pub case_insensitive_keys: bool,
    /// Naming conventions for inferred column roles.
    pub role_conventions: RoleConventions,
    /// Tables declared to be junction tables.
    pub junction_tables: BTreeSet<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            log_statements: true,
            max_sql_length: Some(500),
            slow_query_threshold: None,
            foreign_keys: true,
            concurrent_children: false,
            case_insensitive_keys: true,
            role_conventions: RoleConventions::default(),
            junction_tables: BTreeSet::new(),
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable per-statement debug events.
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Set maximum SQL length shown in log events.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation in log events.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Set slow query threshold.
    pub fn slow_threshold(mut self, duration: Duration) -> Self {
        self.slow_query_threshold = Some(duration);
        self
    }

    /// Skip the foreign-key catalog query (no junction inference).
    pub fn without_foreign_keys(mut self) -> Self {
        self.foreign_keys = false;
        self
    }

    /// Run tree children concurrently when the driver supports it.
    pub fn concurrent_children(mut self, enabled: bool) -> Self {
        self.concurrent_children = enabled;
        self
    }

    /// Fold text correlation values like a case-insensitive collation.
    pub fn case_insensitive_keys(mut self, enabled: bool) -> Self {
        self.case_insensitive_keys = enabled;
        self
    }

    /// Set role naming conventions.
    pub fn role_conventions(mut self, conventions: RoleConventions) -> Self {
        self.role_conventions = conventions;
        self
    }

    /// Declare a table as a junction table.
    ///
    /// A declared junction table whose parent key can't be resolved is
    /// downgraded to a plain table with a warning.
    pub fn junction_table(mut self, table: impl Into<String>) -> Self {
        self.junction_tables.insert(table.into());
        self
    }
}
