mod common;

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{insert_rows, int_tuple, new_empty_table, scan_rows, setup};

use mini_db::{
    utils::HandyRwLock, BufferPool, Database, HeapFile, HeapPageID, MiniError, Permission, Schema,
    Transaction,
};

#[test]
fn test_commit_is_visible_to_other_transactions() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);

    let t1 = Transaction::new();
    let schema = db.catalog().get_schema(&table_id).unwrap();
    let mut tuple = int_tuple(&schema, &[1, 2]);
    BufferPool::insert_tuple(&db, &t1, table_id, &mut tuple).unwrap();
    t1.commit(&db).unwrap();

    assert_eq!(scan_rows(&db, table_id), vec![vec![1, 2]]);
}

// A committed tuple survives a restart: a second context built over
// the same directory and the same heap file sees it.
#[test]
fn test_commit_durability_across_restart() {
    let (db, dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);
    insert_rows(&db, table_id, &[&[1, 2]]);
    drop(db);

    let db2 = Arc::new(Database::new(dir.path().join("data")));
    let table = HeapFile::new(
        db2.get_dir().join("t.dat"),
        Schema::small_int_schema(2, ""),
    )
    .unwrap();
    // the table id is a stable hash of the path
    assert_eq!(table.get_id(), table_id);
    db2.mut_catalog()
        .add_table(Arc::new(std::sync::RwLock::new(table)), "t", "");

    assert_eq!(scan_rows(&db2, table_id), vec![vec![1, 2]]);
}

#[test]
fn test_abort_reverts_changes() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);
    insert_rows(&db, table_id, &[&[1, 2]]);

    let tx = Transaction::new();
    let schema = db.catalog().get_schema(&table_id).unwrap();
    let mut tuple = int_tuple(&schema, &[9, 9]);
    BufferPool::insert_tuple(&db, &tx, table_id, &mut tuple).unwrap();
    tx.abort(&db).unwrap();

    // the aborted insert is gone, the committed row is not
    assert_eq!(scan_rows(&db, table_id), vec![vec![1, 2]]);
}

#[test]
fn test_lock_timeout_aborts_requester() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);
    insert_rows(&db, table_id, &[&[1, 2]]);

    let pid = HeapPageID::new(table_id, 0);
    let t1 = Transaction::new();
    BufferPool::get_page(&db, &t1, Permission::ReadWrite, &pid).unwrap();

    let t2 = Transaction::new();
    let start = Instant::now();
    let result = BufferPool::get_page(&db, &t2, Permission::ReadWrite, &pid);
    assert!(matches!(result, Err(MiniError::TransactionAborted)));
    assert!(start.elapsed() <= Duration::from_secs(1));
    t2.abort(&db).unwrap();

    // t1 is unaffected and the page is unchanged
    t1.commit(&db).unwrap();
    assert_eq!(scan_rows(&db, table_id), vec![vec![1, 2]]);
}

#[test]
fn test_upgrade_excludes_other_readers() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);
    insert_rows(&db, table_id, &[&[1, 2]]);

    let pid = HeapPageID::new(table_id, 0);
    let t1 = Transaction::new();
    BufferPool::get_page(&db, &t1, Permission::ReadOnly, &pid).unwrap();
    // sole shared holder, so the upgrade goes through
    BufferPool::get_page(&db, &t1, Permission::ReadWrite, &pid).unwrap();

    let t2 = Transaction::new();
    let result = BufferPool::get_page(&db, &t2, Permission::ReadOnly, &pid);
    assert!(matches!(result, Err(MiniError::TransactionAborted)));
    t2.abort(&db).unwrap();

    t1.commit(&db).unwrap();
    let t3 = Transaction::new();
    assert!(BufferPool::get_page(&db, &t3, Permission::ReadOnly, &pid).is_ok());
    t3.commit(&db).unwrap();
}

#[test]
fn test_concurrent_committed_inserts() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);

    let (sender, receiver) = crossbeam::channel::unbounded();
    let mut handles = Vec::new();
    for worker in 0..4 {
        let db = Arc::clone(&db);
        let sender = sender.clone();
        handles.push(std::thread::spawn(move || {
            let schema = db.catalog().get_schema(&table_id).unwrap();
            for i in 0..25 {
                let value = worker * 100 + i;
                let tx = Transaction::new();
                let mut tuple = int_tuple(&schema, &[value, -value]);
                BufferPool::insert_tuple(&db, &tx, table_id, &mut tuple).unwrap();
                tx.commit(&db).unwrap();
                sender.send(value).unwrap();
            }
        }));
    }
    drop(sender);
    for handle in handles {
        handle.join().unwrap();
    }

    let sent: HashSet<i32> = receiver.iter().collect();
    let rows = scan_rows(&db, table_id);
    assert_eq!(rows.len(), 100);
    let seen: HashSet<i32> = rows.iter().map(|r| r[0]).collect();
    assert_eq!(seen, sent);
}

// NO-STEAL: with every cached page dirty, pulling another page in must
// fail instead of evicting somebody's uncommitted work.
#[test]
fn test_cache_full_of_dirty_pages() {
    let (db, _dir) = setup();
    let mut cells = Vec::new();
    // three full pages of single-int tuples
    let table_id = common::create_random_table(&db, "t", 1, 992 * 3, &mut cells);

    *db.mut_buffer_pool() = BufferPool::with_capacity(2);

    let tx = Transaction::new();
    let table_rc = db.catalog().get_table(&table_id).unwrap();
    let mut iter = table_rc.rl().iter(&db, &tx);
    iter.open().unwrap();

    let mut from_page_0 = None;
    let mut from_page_1 = None;
    while let Some(tuple) = iter.next().unwrap() {
        match tuple.get_record_id().unwrap().page_id.page_index {
            0 if from_page_0.is_none() => from_page_0 = Some(tuple),
            1 if from_page_1.is_none() => from_page_1 = Some(tuple),
            _ => {}
        }
        if from_page_0.is_some() && from_page_1.is_some() {
            break;
        }
    }
    iter.close();

    BufferPool::delete_tuple(&db, &tx, &from_page_0.unwrap()).unwrap();
    BufferPool::delete_tuple(&db, &tx, &from_page_1.unwrap()).unwrap();

    // both cache slots hold dirty pages now
    let pid = HeapPageID::new(table_id, 2);
    let result = BufferPool::get_page(&db, &tx, Permission::ReadOnly, &pid);
    assert!(matches!(result, Err(MiniError::CacheFull)));

    // committing flushes the dirty pages and unblocks the cache
    tx.commit(&db).unwrap();
    let t2 = Transaction::new();
    assert!(BufferPool::get_page(&db, &t2, Permission::ReadOnly, &pid).is_ok());
    t2.commit(&db).unwrap();

    assert_eq!(scan_rows(&db, table_id).len(), 992 * 3 - 2);
}

#[test]
fn test_commit_writes_log_records() {
    let (db, _dir) = setup();
    let table_id = new_empty_table(&db, "t", 2);

    let before = db.log_manager().records_count();
    insert_rows(&db, table_id, &[&[1, 2]]);

    // at least one update record plus the commit marker
    assert!(db.log_manager().records_count() >= before + 2);
    assert!(db.log_manager().get_size().unwrap() > 0);
}
