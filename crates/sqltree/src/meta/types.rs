use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Normalized column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Double,
    Decimal,
    String,
    Blob,
    Date,
    Time,
    DateTime,
    Year,
    Boolean,
    Enum,
    Set,
    Bit,
    Geometry,
    Unknown,
}

impl FieldType {
    /// Map a MySQL type name (size prefix already stripped) to its normalized type.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "smallint" | "serial" => Self::Integer,
            "float" | "double" | "real" | "double precision" => Self::Double,
            "decimal" | "dec" | "numeric" | "fixed" => Self::Decimal,
            "char" | "varchar" | "text" | "string" | "json" => Self::String,
            "blob" | "binary" | "varbinary" => Self::Blob,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" | "timestamp" => Self::DateTime,
            "year" => Self::Year,
            "bool" | "boolean" => Self::Boolean,
            "enum" => Self::Enum,
            "set" => Self::Set,
            "bit" => Self::Bit,
            "geometry" | "point" | "linestring" | "polygon" | "multipoint" | "multilinestring"
            | "multipolygon" | "geometrycollection" => Self::Geometry,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Blob => "blob",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Year => "year",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Set => "set",
            Self::Bit => "bit",
            Self::Geometry => "geometry",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Double | Self::Decimal | Self::Boolean | Self::Bit)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Id,
    ParentKey,
    Description,
    Active,
}

impl FieldRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ParentKey => "parentkey",
            Self::Description => "description",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "parentkey" => Ok(Self::ParentKey),
            "description" => Ok(Self::Description),
            "active" => Ok(Self::Active),
            other => Err(format!("Unknown field role '{other}'")),
        }
    }
}

/// Structural role of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    #[default]
    None,
    /// Many-to-many link table, owned by `parent`.
    Junction,
}

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetadata {
    pub name: String,
    pub table: String,
    /// Type as reported by the server, e.g. `int(10) unsigned`.
    pub native_type: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// NOT NULL and not auto-increment: a value must be supplied on insert.
    pub required: bool,
    pub is_primary: bool,
    pub auto_increment: bool,
    pub default: Option<String>,
    pub roles: BTreeSet<FieldRole>,
    pub maxlength: Option<u32>,
    pub decimals: Option<u32>,
    /// Members of an `enum` or `set` column.
    pub values: Vec<String>,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
}

impl FieldMetadata {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            native_type: String::new(),
            field_type: FieldType::Unknown,
            nullable: true,
            required: false,
            is_primary: false,
            auto_increment: false,
            default: None,
            roles: BTreeSet::new(),
            maxlength: None,
            decimals: None,
            values: Vec::new(),
            foreign_table: None,
            foreign_column: None,
        }
    }

    pub fn has_role(&self, role: FieldRole) -> bool {
        self.roles.contains(&role)
    }

    /// The column appears in the foreign-key catalog.
    pub fn has_foreign_key(&self) -> bool {
        self.foreign_table.is_some() || self.foreign_column.is_some()
    }
}

/// Metadata of one table and its columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMetadata {
    pub table: String,
    pub engine: Option<String>,
    pub row_format: Option<String>,
    pub collation: Option<String>,
    pub max_data_length: Option<u64>,
    pub create_time: Option<String>,
    /// Columns in table order.
    pub fields: Vec<FieldMetadata>,
    pub role: TableRole,
    /// Owning table of a junction table.
    pub parent: Option<String>,
    pub view: String,
    pub overview: Option<String>,
    pub descview: Option<String>,
    /// Inconsistencies recovered while inferring roles.
    pub warnings: Vec<String>,
}

impl TableMetadata {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            engine: None,
            row_format: None,
            collation: None,
            max_data_length: None,
            create_time: None,
            fields: Vec::new(),
            role: TableRole::None,
            parent: None,
            view: "*".to_string(),
            overview: None,
            descview: None,
            warnings: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldMetadata> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// The first column carrying `role`.
    pub fn field_by_role(&self, role: FieldRole) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.has_role(role))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Primary key columns in table order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_primary)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn is_junction(&self) -> bool {
        self.role == TableRole::Junction
    }
}
