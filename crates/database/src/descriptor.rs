//! Static per-model metadata: table naming and the ordered column layout.
//!
//! Column order is significant. Rows are mapped to records positionally, and
//! bulk inserts bind one value group per record in the same order, so every
//! list produced here preserves declaration order.

use chrono::{DateTime, NaiveDateTime, Utc};
use core_types::{Record, Role, Value};
use std::fmt::Write as _;

use crate::error::DbError;

/// Maximum identifier length accepted by both backends (PostgreSQL truncates at 63 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Rejects anything that is not a plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
///
/// Table and column names are interpolated into SQL text, so they are only ever
/// accepted through this check.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::InvalidDescriptor(format!(
            "`{name}` is not a valid SQL identifier"
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::InvalidDescriptor(format!(
            "identifier `{name}` exceeds {MAX_IDENTIFIER_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Double-quotes an identifier that already passed [`validate_identifier`].
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// Value family of a column, inferred from the leading word of its SQL type fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Untyped,
}

impl ColumnKind {
    fn from_fragment(fragment: &str) -> Self {
        let type_word = fragment
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match type_word.as_str() {
            "INTEGER" | "INT" | "INT2" | "INT4" | "INT8" | "BIGINT" | "SMALLINT" | "SERIAL"
            | "BIGSERIAL" | "SMALLSERIAL" => ColumnKind::Integer,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "NUMERIC" | "DECIMAL" => {
                ColumnKind::Real
            }
            "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" | "CLOB" | "DATE" => ColumnKind::Text,
            "BOOLEAN" | "BOOL" => ColumnKind::Boolean,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" => ColumnKind::Timestamp,
            _ => ColumnKind::Untyped,
        }
    }

    /// Normalizes a value read from (or about to be written to) a column of this kind.
    ///
    /// SQLite has no boolean or timestamp storage class, and serialized models carry
    /// timestamps as RFC 3339 text; both are folded back into the typed variants here.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (ColumnKind::Boolean, Value::Integer(v)) => Value::Bool(v != 0),
            (ColumnKind::Real, Value::Integer(v)) => Value::Real(v as f64),
            (ColumnKind::Timestamp, Value::Text(text)) => match parse_timestamp(&text) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(text),
            },
            (_, value) => value,
        }
    }
}

/// Parses the timestamp spellings produced by sqlx, chrono and SQLite's own `CURRENT_TIMESTAMP`.
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// One entry of a model's column list: a bare name, or a name followed by an
/// inline type/constraint fragment such as `id INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    fragment: Option<String>,
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Result<Self, DbError> {
        let spec = spec.trim();
        let (name, fragment) = match spec.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim())),
            None => (spec, None),
        };
        validate_identifier(name)?;
        if let Some(fragment) = fragment {
            if fragment.contains(';') || fragment.contains("--") || fragment.contains("/*") {
                return Err(DbError::InvalidDescriptor(format!(
                    "column `{name}` has a fragment with statement separators or comments"
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    /// Builds a spec from parts known to be valid.
    fn trusted(name: &str, fragment: &str) -> Self {
        Self {
            name: name.to_string(),
            fragment: Some(fragment.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn kind(&self) -> ColumnKind {
        self.fragment
            .as_deref()
            .map(ColumnKind::from_fragment)
            .unwrap_or(ColumnKind::Untyped)
    }

    pub fn is_primary_key(&self) -> bool {
        self.upper_fragment().contains("PRIMARY KEY")
    }

    /// True when the backend assigns the value; such columns never appear in INSERT lists.
    ///
    /// Only `INTEGER PRIMARY KEY` aliases the SQLite rowid. Other key types (`INT`,
    /// `BIGINT`, `TEXT`) are written like any other column.
    pub fn is_generated(&self) -> bool {
        let fragment = self.upper_fragment();
        let rowid_alias = fragment.starts_with("INTEGER ") && fragment.contains("PRIMARY KEY");
        rowid_alias
            || fragment.contains("AUTOINCREMENT")
            || fragment.contains("GENERATED")
            || ["SERIAL", "BIGSERIAL", "SMALLSERIAL"]
                .iter()
                .any(|serial| fragment.starts_with(serial))
    }

    /// Column definition as it appears inside `CREATE TABLE (...)`.
    pub fn definition(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{} {}", quote_ident(&self.name), fragment),
            None => quote_ident(&self.name),
        }
    }

    fn upper_fragment(&self) -> String {
        self.fragment
            .as_deref()
            .unwrap_or_default()
            .to_ascii_uppercase()
    }
}

fn target_base_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::trusted("id", "SERIAL PRIMARY KEY"),
        ColumnSpec::trusted("is_active", "BOOLEAN DEFAULT TRUE"),
        ColumnSpec::trusted("created_at", "TIMESTAMPTZ DEFAULT NOW()"),
        ColumnSpec::trusted("updated_at", "TIMESTAMPTZ DEFAULT NOW()"),
    ]
}

/// A concrete table: its name in one role's schema and its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self, DbError> {
        let name = name.into();
        validate_identifier(&name)?;
        if columns.is_empty() {
            return Err(DbError::InvalidDescriptor(format!("table `{name}` has no columns")));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::InvalidDescriptor(format!(
                    "column `{}` is declared twice on `{name}`",
                    column.name
                )));
            }
        }
        Ok(Self { name, columns })
    }

    /// The fixed layout of every table in the target role. It does not follow the
    /// model's descriptor.
    pub fn target_base(name: impl Into<String>) -> Result<Self, DbError> {
        Self::new(name, target_base_columns())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(ColumnSpec::name)
    }

    /// Columns listed by INSERT: everything the backend does not generate.
    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| !c.is_generated())
    }

    /// The column records are addressed by: the declared primary key, else `id`.
    pub fn key_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.is_primary_key())
            .map(ColumnSpec::name)
            .unwrap_or("id")
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(ColumnSpec::is_primary_key)
    }

    /// Zips a positional row against the column list.
    pub(crate) fn record_from_row(&self, row: Vec<Value>) -> Record {
        self.columns
            .iter()
            .zip(row)
            .map(|(column, value)| (column.name.clone(), column.kind().coerce(value)))
            .collect()
    }

    /// Applies column kinds to the values of a record; unknown keys pass through untouched.
    pub(crate) fn coerce(&self, record: &Record) -> Record {
        record
            .iter()
            .map(|(name, value)| {
                let value = match self.column(name) {
                    Some(column) => column.kind().coerce(value.clone()),
                    None => value.clone(),
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

/// Per-model metadata: type name, app table name, ordered columns and a sample payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    type_name: String,
    table_name: String,
    columns: Vec<ColumnSpec>,
    sample: Record,
}

impl Descriptor {
    pub fn builder(type_name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            type_name: type_name.into(),
            table_name: None,
            columns: Vec::new(),
            inherited: Vec::new(),
            sample: Record::new(),
            inherited_sample: Record::new(),
        }
    }

    /// The shared base model every entity extends: an active flag and two timestamps.
    pub fn base() -> Descriptor {
        Descriptor {
            type_name: "Base".to_string(),
            table_name: "base".to_string(),
            columns: vec![
                ColumnSpec::trusted("is_active", "BOOLEAN DEFAULT 1"),
                ColumnSpec::trusted("created_at", "TIMESTAMP"),
                ColumnSpec::trusted("updated_at", "TIMESTAMP"),
            ],
            sample: Record::new()
                .with("is_active", true)
                .with("created_at", "2023-01-01T00:00:00")
                .with("updated_at", "2023-01-01T00:00:00"),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// App-role table name, verbatim.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn sample(&self) -> &Record {
        &self.sample
    }

    /// Source-role table name: `{lowercased type name}_s`.
    pub fn table_s(&self) -> String {
        format!("{}_s", self.type_name.to_ascii_lowercase())
    }

    /// Target-role table name: `{lowercased type name}_t`.
    pub fn table_t(&self) -> String {
        format!("{}_t", self.type_name.to_ascii_lowercase())
    }

    pub fn table_for(&self, role: Role) -> String {
        match role {
            Role::App => self.table_name.clone(),
            Role::Source => self.table_s(),
            Role::Target => self.table_t(),
        }
    }

    /// The table this model maps to in `role`'s schema.
    pub fn schema_for(&self, role: Role) -> TableSchema {
        match role {
            Role::App | Role::Source => TableSchema {
                name: self.table_for(role),
                columns: self.columns.clone(),
            },
            Role::Target => TableSchema {
                name: self.table_t(),
                columns: target_base_columns(),
            },
        }
    }

    /// Human-readable summary of the derived names, columns and sample.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Model:        {}", self.type_name);
        let _ = writeln!(out, "App table:    {}", self.table_name);
        let _ = writeln!(out, "Source table: {}", self.table_s());
        let _ = writeln!(out, "Target table: {}", self.table_t());
        let _ = writeln!(out, "Columns:");
        for column in &self.columns {
            let _ = writeln!(
                out,
                "  - {}{}",
                column.name,
                column.fragment().map(|f| format!(" {f}")).unwrap_or_default()
            );
        }
        let _ = write!(out, "Sample:       {}", self.sample.to_json());
        out
    }
}

/// Collects a descriptor's parts; [`DescriptorBuilder::build`] validates them together.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    type_name: String,
    table_name: Option<String>,
    columns: Vec<String>,
    inherited: Vec<ColumnSpec>,
    sample: Record,
    inherited_sample: Record,
}

impl DescriptorBuilder {
    /// App-role table name. Defaults to the lowercased type name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn column(mut self, spec: impl Into<String>) -> Self {
        self.columns.push(spec.into());
        self
    }

    pub fn columns<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Appends `base`'s columns after this model's own and merges its sample.
    pub fn inherit(mut self, base: &Descriptor) -> Self {
        self.inherited.extend(base.columns.iter().cloned());
        for (column, value) in base.sample.iter() {
            if !self.inherited_sample.contains(column) {
                self.inherited_sample.insert(column, value.clone());
            }
        }
        self
    }

    pub fn sample(mut self, sample: Record) -> Self {
        self.sample = sample;
        self
    }

    pub fn build(self) -> Result<Descriptor, DbError> {
        let lowered = self.type_name.to_ascii_lowercase();
        validate_identifier(&lowered)?;
        // Derived `_s`/`_t` names must stay within the identifier limit too.
        validate_identifier(&format!("{lowered}_s"))?;

        let table_name = self.table_name.unwrap_or_else(|| lowered.clone());
        let mut columns = self
            .columns
            .iter()
            .map(|spec| ColumnSpec::parse(spec))
            .collect::<Result<Vec<_>, _>>()?;
        columns.extend(self.inherited);

        let schema = TableSchema::new(table_name, columns)?;

        let mut sample = self.sample;
        for (column, value) in self.inherited_sample {
            if !sample.contains(&column) {
                sample.insert(column, value);
            }
        }

        Ok(Descriptor {
            type_name: self.type_name,
            table_name: schema.name,
            columns: schema.columns,
            sample,
        })
    }
}
