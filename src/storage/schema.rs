use crate::error::MiniError;

/// Longest storable string. Strings are serialized as a length prefix
/// followed by the content padded with zero bytes to this size.
pub const MAX_STRING_LEN: usize = 128;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Size of a cell of this type on disk, in bytes.
    pub fn get_disk_size(&self) -> usize {
        match self {
            Type::Int => 4,
            // 4-byte length prefix + padded content
            Type::Str => 4 + MAX_STRING_LEN,
        }
    }

    /// Parse the type name used by catalog schema files.
    pub fn parse(name: &str) -> Result<Self, MiniError> {
        match name {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::Str),
            _ => Err(MiniError::Internal(format!("unknown type: {}", name))),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
    pub name: String,
    pub field_type: Type,
    pub is_primary: bool,
}

impl Field {
    pub fn new(name: &str, field_type: Type, is_primary: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            is_primary,
        }
    }
}

/// Ordered schema of a tuple.
#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        debug_assert!(!fields.is_empty(), "schema must have at least one field");
        Self { fields }
    }

    /// A schema of `width` int columns, used all over the tests.
    pub fn small_int_schema(width: usize, name_prefix: &str) -> Self {
        let mut fields = Vec::new();
        for i in 0..width {
            let field = Field::new(
                &format!("{}int-column-{}", name_prefix, i),
                Type::Int,
                i == 0,
            );
            fields.push(field);
        }
        Self::new(fields)
    }

    /// Tuple size on disk, in bytes.
    pub fn get_tuple_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.get_disk_size()).sum()
    }

    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn get_field_pos(&self, field_name: &str) -> Result<usize, MiniError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name == field_name {
                return Ok(i);
            }
        }
        Err(MiniError::NoSuchElement(format!(
            "field {} not in schema",
            field_name
        )))
    }

    /// Concatenate two schemas, fields of `a` first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut fields = a.fields.clone();
        fields.extend(b.fields.iter().cloned());
        Schema::new(fields)
    }
}

/// Two schemas are equal when they have the same arity and the same
/// types in the same order. Field names are ignored.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        let matching = self
            .fields
            .iter()
            .zip(&other.fields)
            .filter(|(a, b)| a.field_type == b.field_type)
            .count();
        self.fields.len() == other.fields.len() && matching == self.fields.len()
    }
}

impl Eq for Schema {}
