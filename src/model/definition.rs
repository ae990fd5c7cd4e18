//! Table definitions: fields, kinds and the definition builder.

use serde_json::Value;

use super::Model;

/// Storage kind of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Auto-incrementing integer primary key.
    PrimaryKey,
    /// 64-bit integer.
    Integer,
    /// Double precision float.
    Real,
    /// Bounded string.
    Char {
        /// Maximum number of characters.
        max_length: u32,
    },
    /// Unbounded string.
    Text,
    /// Boolean flag.
    Boolean,
}

/// A single column of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Storage kind.
    pub kind: FieldKind,
    /// Whether `NULL` is accepted.
    pub nullable: bool,
    /// Value used when an insert omits the field.
    pub default: Option<Value>,
}

impl Field {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
        }
    }

    /// Auto-incrementing primary key.
    #[must_use]
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::PrimaryKey)
    }

    /// 64-bit integer column.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Floating point column.
    #[must_use]
    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Real)
    }

    /// `VARCHAR(255)` column.
    #[must_use]
    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Char { max_length: 255 })
    }

    /// Unbounded text column.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Boolean column.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Changes the maximum length of a char column. No-op for other kinds.
    #[must_use]
    pub fn max_length(mut self, max_length: u32) -> Self {
        if let FieldKind::Char { .. } = self.kind {
            self.kind = FieldKind::Char { max_length };
        }
        self
    }

    /// Accepts `NULL`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Default used when an insert leaves the field out.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// `true` for the primary key column.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.kind == FieldKind::PrimaryKey
    }
}

/// Schema of one model: table name, owning module and fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    name: String,
    module: String,
    table: String,
    fields: Vec<Field>,
    is_abstract: bool,
}

impl ModelDefinition {
    /// Starts a definition for model `name` owned by `module`
    /// (e.g. `"Puppy"` in `"puppies.models"`).
    #[must_use]
    pub fn builder(name: impl Into<String>, module: impl Into<String>) -> ModelDefinitionBuilder {
        ModelDefinitionBuilder {
            name: name.into(),
            module: module.into(),
            table: None,
            fields: Vec::new(),
            is_abstract: false,
        }
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning module path.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// `module.Name`, the registry key.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in declaration order, primary key first.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary key column.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_primary_key())
    }

    /// Abstract definitions only carry fields for subclasses and are never
    /// registered.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}

/// Builder returned by [`ModelDefinition::builder`].
#[derive(Debug, Clone)]
pub struct ModelDefinitionBuilder {
    name: String,
    module: String,
    table: Option<String>,
    fields: Vec<Field>,
    is_abstract: bool,
}

impl ModelDefinitionBuilder {
    /// Adds a column. A column with the same name replaces the earlier one.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
        self
    }

    /// Overrides the table name (defaults to the snake-cased model name).
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Marks the definition abstract.
    #[must_use]
    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Inherits the columns of `parent`; columns added later override them.
    #[must_use]
    pub fn extends(mut self, parent: &Model) -> Self {
        let inherited = parent.definition().fields().to_vec();
        let own = std::mem::take(&mut self.fields);
        self.fields = inherited;
        for field in own {
            self = self.field(field);
        }
        self
    }

    /// Finishes the definition. An `id` primary key is prepended when no
    /// primary key was declared.
    #[must_use]
    pub fn build(self) -> ModelDefinition {
        let mut fields = self.fields;
        if let Some(pos) = fields.iter().position(Field::is_primary_key) {
            let pk = fields.remove(pos);
            fields.insert(0, pk);
        } else {
            fields.insert(0, Field::primary_key("id"));
        }
        let table = self.table.unwrap_or_else(|| snake_case(&self.name));
        ModelDefinition {
            name: self.name,
            module: self.module,
            table,
            fields,
            is_abstract: self.is_abstract,
        }
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prepends_implicit_id() {
        let def = ModelDefinition::builder("PuppyModel", "tests.models")
            .field(Field::char("name"))
            .build();
        assert_eq!(def.table(), "puppy_model");
        assert_eq!(def.qualified_name(), "tests.models.PuppyModel");
        let names: Vec<&str> = def.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "name"]);
        assert!(def.primary_key().is_some_and(|pk| pk.name == "id"));
    }

    #[test]
    fn declared_primary_key_moves_first() {
        let def = ModelDefinition::builder("Kennel", "tests.models")
            .field(Field::text("address"))
            .field(Field::primary_key("kennel_id"))
            .table("kennels")
            .build();
        assert_eq!(def.table(), "kennels");
        assert_eq!(def.fields().first().map(|f| f.name.as_str()), Some("kennel_id"));
        assert_eq!(def.fields().len(), 2);
    }

    #[test]
    fn field_modifiers() {
        let field = Field::char("nick").max_length(16).nullable().default("rex");
        assert_eq!(field.kind, FieldKind::Char { max_length: 16 });
        assert!(field.nullable);
        assert_eq!(field.default, Some(Value::from("rex")));

        let field = Field::integer("age").max_length(16);
        assert_eq!(field.kind, FieldKind::Integer);
    }

    #[test]
    fn same_name_field_replaces() {
        let def = ModelDefinition::builder("Puppy", "tests.models")
            .field(Field::char("name"))
            .field(Field::text("name"))
            .build();
        assert_eq!(def.field("name").map(|f| f.kind), Some(FieldKind::Text));
    }
}
