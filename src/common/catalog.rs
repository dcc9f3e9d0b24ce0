use std::{collections::HashMap, path::Path, sync::Arc};

use log::info;

use crate::{
    error::MiniError,
    storage::{Field, HeapFile, Schema, Type},
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

struct TableMeta {
    name: String,
    primary_key: String,
}

/// Registry of the tables of one database.
pub struct Catalog {
    tables: HashMap<u32, Pod<HeapFile>>,
    metas: HashMap<u32, TableMeta>,
    name_to_id: HashMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            metas: HashMap::new(),
            name_to_id: HashMap::new(),
        }
    }

    /// Register a table. An existing table with the same id or the same
    /// name is replaced.
    pub fn add_table(&mut self, table: Pod<HeapFile>, name: &str, primary_key: &str) {
        let table_id = table.rl().get_id();

        if let Some(old_id) = self.name_to_id.remove(name) {
            self.tables.remove(&old_id);
            self.metas.remove(&old_id);
        }
        if let Some(old_meta) = self.metas.remove(&table_id) {
            self.name_to_id.remove(&old_meta.name);
        }

        self.tables.insert(table_id, table);
        self.metas.insert(
            table_id,
            TableMeta {
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
        self.name_to_id.insert(name.to_string(), table_id);
    }

    pub fn get_table(&self, table_id: &u32) -> ResultPod<HeapFile> {
        self.tables
            .get(table_id)
            .map(Arc::clone)
            .ok_or_else(|| MiniError::NoSuchElement(format!("table {} not in catalog", table_id)))
    }

    pub fn get_table_id(&self, name: &str) -> Result<u32, MiniError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| MiniError::NoSuchElement(format!("table {} not in catalog", name)))
    }

    pub fn get_schema(&self, table_id: &u32) -> Result<Arc<Schema>, MiniError> {
        Ok(self.get_table(table_id)?.rl().get_schema())
    }

    pub fn get_table_name(&self, table_id: &u32) -> Result<String, MiniError> {
        self.metas
            .get(table_id)
            .map(|m| m.name.clone())
            .ok_or_else(|| MiniError::NoSuchElement(format!("table {} not in catalog", table_id)))
    }

    pub fn get_primary_key(&self, table_id: &u32) -> Result<String, MiniError> {
        self.metas
            .get(table_id)
            .map(|m| m.primary_key.clone())
            .ok_or_else(|| MiniError::NoSuchElement(format!("table {} not in catalog", table_id)))
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.metas.clear();
        self.name_to_id.clear();
    }

    /// Load table definitions from a line-oriented schema file. Each
    /// line reads `tableName (fieldName type [pk], ...)` with
    /// `type ∈ {int, string}`; the backing heap files are created under
    /// `data_dir` as `<tableName>.dat`.
    pub fn load_schema(
        &mut self,
        schema_file: impl AsRef<Path>,
        data_dir: impl AsRef<Path>,
    ) -> Result<Vec<u32>, MiniError> {
        let content = std::fs::read_to_string(schema_file.as_ref())?;
        let mut created = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let open = line.find('(').ok_or_else(|| {
                MiniError::Internal(format!("malformed schema line: {}", line))
            })?;
            let close = line.rfind(')').ok_or_else(|| {
                MiniError::Internal(format!("malformed schema line: {}", line))
            })?;

            let table_name = line[..open].trim();
            let mut fields = Vec::new();
            let mut primary_key = String::new();

            for item in line[open + 1..close].split(',') {
                let tokens: Vec<&str> = item.split_whitespace().collect();
                if tokens.len() < 2 {
                    return Err(MiniError::Internal(format!(
                        "malformed field declaration: {}",
                        item
                    )));
                }

                let field_name = tokens[0];
                let field_type = Type::parse(tokens[1])?;
                let is_primary = tokens.get(2) == Some(&"pk");
                if is_primary {
                    primary_key = field_name.to_string();
                }
                fields.push(Field::new(field_name, field_type, is_primary));
            }

            let file_path = data_dir.as_ref().join(format!("{}.dat", table_name));
            let table = HeapFile::new(&file_path, Schema::new(fields))?;
            let table_id = table.get_id();

            info!("loaded table {} ({})", table_name, table_id);
            self.add_table(
                Arc::new(std::sync::RwLock::new(table)),
                table_name,
                &primary_key,
            );
            created.push(table_id);
        }

        Ok(created)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
