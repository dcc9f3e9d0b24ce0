#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use rand::Rng;
use tempfile::TempDir;

use mini_db::{
    utils, utils::HandyRwLock, BufferPool, Cell, Database, HeapFile, Schema, Transaction, Tuple,
};

/// Build a fresh database context over a throwaway directory. The
/// returned guard keeps the directory alive for the duration of the
/// test.
pub fn setup() -> (Arc<Database>, TempDir) {
    utils::init_log();
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::new(dir.path().join("data")));
    (db, dir)
}

pub fn int_tuple(schema: &Arc<Schema>, values: &[i32]) -> Tuple {
    Tuple::new(
        Arc::clone(schema),
        values.iter().map(|v| Cell::Int(*v)).collect(),
    )
}

/// Create an empty heap table and register it in the catalog.
pub fn new_empty_table(db: &Arc<Database>, name: &str, columns: usize) -> u32 {
    let path = db.get_dir().join(format!("{}.dat", name));
    let table = HeapFile::new(&path, Schema::small_int_schema(columns, "")).unwrap();
    let table_id = table.get_id();
    db.mut_catalog()
        .add_table(Arc::new(RwLock::new(table)), name, "");
    table_id
}

/// Create a table filled with `rows` random int rows, committed under
/// one transaction. The inserted values are appended to `cells` in
/// insertion order.
pub fn create_random_table(
    db: &Arc<Database>,
    name: &str,
    columns: usize,
    rows: usize,
    cells: &mut Vec<Vec<i32>>,
) -> u32 {
    let table_id = new_empty_table(db, name, columns);
    let schema = db.catalog().get_schema(&table_id).unwrap();

    let mut rng = rand::thread_rng();
    let tx = Transaction::new();
    for _ in 0..rows {
        let row: Vec<i32> = (0..columns).map(|_| rng.gen_range(-10000..10000)).collect();
        let mut tuple = int_tuple(&schema, &row);
        BufferPool::insert_tuple(db, &tx, table_id, &mut tuple).unwrap();
        cells.push(row);
    }
    tx.commit(db).unwrap();

    table_id
}

/// Insert the given rows into an existing table and commit.
pub fn insert_rows(db: &Arc<Database>, table_id: u32, rows: &[&[i32]]) {
    let schema = db.catalog().get_schema(&table_id).unwrap();
    let tx = Transaction::new();
    for row in rows {
        let mut tuple = int_tuple(&schema, row);
        BufferPool::insert_tuple(db, &tx, table_id, &mut tuple).unwrap();
    }
    tx.commit(db).unwrap();
}

/// All rows of the table as plain ints, scanned under a fresh
/// committed transaction.
pub fn scan_rows(db: &Arc<Database>, table_id: u32) -> Vec<Vec<i32>> {
    let tx = Transaction::new();
    let table_rc = db.catalog().get_table(&table_id).unwrap();
    let columns = table_rc.rl().get_schema().field_count();

    let mut iter = table_rc.rl().iter(db, &tx);
    iter.open().unwrap();

    let mut rows = Vec::new();
    while let Some(tuple) = iter.next().unwrap() {
        rows.push(
            (0..columns)
                .map(|i| tuple.get_cell(i).get_int().unwrap())
                .collect(),
        );
    }
    iter.close();
    tx.commit(db).unwrap();
    rows
}
