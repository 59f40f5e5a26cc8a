//! Route schema descriptions
//!
//! A route module declares its argument/result shapes with a small
//! structural type language that the generator renders as TypeScript.
//! Which shape a module uses is an explicit tag, matched exhaustively.

use std::collections::BTreeMap;

/// Structural description of a JSON value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSchema {
    String,
    Number,
    Boolean,
    Null,
    Unknown,
    Literal(String),
    Array(Box<TypeSchema>),
    Record(Box<TypeSchema>),
    Object(Vec<Field>),
    Union(Vec<TypeSchema>),
    Nullable(Box<TypeSchema>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub schema: TypeSchema,
    pub optional: bool,
}

impl Field {
    pub fn required(name: &str, schema: TypeSchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            optional: false,
        }
    }

    pub fn optional(name: &str, schema: TypeSchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            optional: true,
        }
    }
}

impl TypeSchema {
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn array(item: TypeSchema) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn record(value: TypeSchema) -> Self {
        Self::Record(Box::new(value))
    }

    pub fn nullable(inner: TypeSchema) -> Self {
        Self::Nullable(Box::new(inner))
    }

    pub fn literal(value: &str) -> Self {
        Self::Literal(value.to_string())
    }

    pub fn one_of(variants: impl IntoIterator<Item = TypeSchema>) -> Self {
        Self::Union(variants.into_iter().collect())
    }

    /// Render as a TypeScript type expression
    pub fn to_typescript(&self) -> String {
        match self {
            TypeSchema::String => "string".to_string(),
            TypeSchema::Number => "number".to_string(),
            TypeSchema::Boolean => "boolean".to_string(),
            TypeSchema::Null => "null".to_string(),
            TypeSchema::Unknown => "unknown".to_string(),
            TypeSchema::Literal(value) => quote(value),
            TypeSchema::Array(item) => format!("Array<{}>", item.to_typescript()),
            TypeSchema::Record(value) => format!("Record<string, {}>", value.to_typescript()),
            TypeSchema::Object(fields) if fields.is_empty() => "Record<string, never>".to_string(),
            TypeSchema::Object(fields) => {
                let members = fields
                    .iter()
                    .map(|field| {
                        format!(
                            "{}{}: {}",
                            property_key(&field.name),
                            if field.optional { "?" } else { "" },
                            field.schema.to_typescript()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("{{ {} }}", members)
            }
            TypeSchema::Union(variants) if variants.is_empty() => "never".to_string(),
            TypeSchema::Union(variants) => variants
                .iter()
                .map(|v| v.to_typescript())
                .collect::<Vec<_>>()
                .join(" | "),
            TypeSchema::Nullable(inner) => format!("{} | null", inner.to_typescript()),
        }
    }
}

/// Argument and result shape of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPair {
    pub args: TypeSchema,
    pub result: TypeSchema,
}

impl SchemaPair {
    pub fn new(args: TypeSchema, result: TypeSchema) -> Self {
        Self { args, result }
    }
}

/// Schema declaration of a whole route module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModuleSchema {
    /// One schema pair per operation name
    PerOperation(BTreeMap<String, SchemaPair>),
    /// One schema pair shared by every operation of the module
    Single(SchemaPair),
    #[default]
    None,
}

/// How one operation's types resolve against its module schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaResolution<'a> {
    Operation(&'a SchemaPair),
    Shared(&'a SchemaPair),
    Unconstrained,
}

impl ModuleSchema {
    pub fn per_operation<'a>(ops: impl IntoIterator<Item = (&'a str, SchemaPair)>) -> Self {
        Self::PerOperation(
            ops.into_iter()
                .map(|(name, pair)| (name.to_string(), pair))
                .collect(),
        )
    }

    pub fn resolve(&self, operation: &str) -> SchemaResolution<'_> {
        match self {
            ModuleSchema::PerOperation(ops) => ops
                .get(operation)
                .map(SchemaResolution::Operation)
                .unwrap_or(SchemaResolution::Unconstrained),
            ModuleSchema::Single(pair) => SchemaResolution::Shared(pair),
            ModuleSchema::None => SchemaResolution::Unconstrained,
        }
    }
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

pub(crate) fn property_key(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };

    if is_identifier {
        name.to_string()
    } else {
        quote(name)
    }
}
