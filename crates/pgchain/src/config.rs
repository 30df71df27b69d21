//! Executor and relation-resolution configuration.

/// How embedded relations are guessed when no foreign key is declared.
#[derive(Debug, Clone)]
pub struct RelationConfig {
    /// Primary-key column name used on every table.
    pub primary_key: String,
    /// Suffix appended to a table name to form a foreign-key guess.
    pub fk_suffix: String,
    /// Extra forward guesses tried on the base row after the naming
    /// convention ones.
    pub extra_forward_guesses: Vec<String>,
    /// Columns probed on the related table after the naming convention
    /// reverse guesses.
    pub reverse_fallbacks: Vec<String>,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            fk_suffix: "_id".to_string(),
            extra_forward_guesses: Vec::new(),
            reverse_fallbacks: vec!["user_id".to_string()],
        }
    }
}

impl RelationConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary-key column name.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Set the foreign-key suffix.
    pub fn fk_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.fk_suffix = suffix.into();
        self
    }

    /// Add a forward guess.
    pub fn forward_guess(mut self, column: impl Into<String>) -> Self {
        self.extra_forward_guesses.push(column.into());
        self
    }

    /// Replace the reverse fallbacks.
    pub fn reverse_fallbacks<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reverse_fallbacks = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Configuration for [`Executor`](crate::Executor).
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Relation guessing.
    pub relations: RelationConfig,
    /// Log a warning for UPDATE/DELETE without filters.
    pub warn_unscoped_writes: bool,
    /// Tag passed to [`GenericClient::query_tagged`](crate::GenericClient::query_tagged).
    pub tag: Option<String>,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_log_length: Option<usize>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            relations: RelationConfig::default(),
            warn_unscoped_writes: true,
            tag: None,
            max_sql_log_length: Some(200),
        }
    }
}

impl ExecConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set relation guessing.
    pub fn relations(mut self, relations: RelationConfig) -> Self {
        self.relations = relations;
        self
    }

    /// Enable or disable the unscoped UPDATE/DELETE warning.
    pub fn warn_unscoped_writes(mut self, enabled: bool) -> Self {
        self.warn_unscoped_writes = enabled;
        self
    }

    /// Tag every statement.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_log_length = None;
        self
    }
}
