//! End-to-end tests for the B+-tree page format hosted on buffer pool frames

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use vellum::buffer::BufferPoolManager;
use vellum::catalog::Catalog;
use vellum::storage::disk::DiskManager;
use vellum::storage::page::{BTreeInternalPage, BTreeLeafPage, SlottedPageRef, LEAF_TUPLE_SIZE};
use vellum::{FileId, PageId, Rid};

fn create_bpm(capacity: usize) -> (BufferPoolManager, FileId, TempDir) {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::new(dir.path()).unwrap());
    let file_id = catalog.create_index("tree").unwrap();
    let dm = Arc::new(DiskManager::new(catalog));
    (BufferPoolManager::new(capacity, dm), file_id, dir)
}

#[test]
fn test_leaf_page_survives_eviction_and_reopen() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::new(dir.path()).unwrap());
    let file_id = catalog.create_index("tree").unwrap();
    let page_id = PageId::new(file_id, 0);

    let mut rng = StdRng::seed_from_u64(0xB7EE);
    let mut keys: Vec<i64> = (0..64).map(|_| rng.gen_range(-10_000..10_000)).collect();
    keys.sort_unstable();
    keys.dedup();

    {
        let dm = Arc::new(DiskManager::new(Arc::clone(&catalog)));
        let bpm = BufferPoolManager::new(4, dm);

        let mut guard = bpm.read_page(page_id).unwrap();
        let mut leaf = BTreeLeafPage::new(guard.data_mut());
        leaf.init();

        // Insert in shuffled order; slots must come out sorted
        let mut shuffled = keys.clone();
        for i in (1..shuffled.len()).rev() {
            shuffled.swap(i, rng.gen_range(0..=i));
        }
        for (i, &key) in shuffled.iter().enumerate() {
            leaf.insert(key, Rid::new(7, i as u16)).unwrap();
        }
        drop(guard);
        bpm.flush_all().unwrap();
    }

    // A fresh pool reads the same bytes back from disk
    {
        let dm = Arc::new(DiskManager::new(catalog));
        let bpm = BufferPoolManager::new(4, dm);

        let mut guard = bpm.read_page(page_id).unwrap();
        let leaf = BTreeLeafPage::new(guard.data_mut());

        assert!(leaf.is_leaf());
        assert_eq!(leaf.entry_count(), keys.len());
        let stored: Vec<i64> = (0..leaf.entry_count())
            .map(|i| leaf.key_at(i).unwrap())
            .collect();
        assert_eq!(stored, keys);
    }
}

#[test]
fn test_leaf_lookup_via_find_key_index() {
    let (bpm, file_id, _dir) = create_bpm(2);
    let page_id = PageId::new(file_id, 0);

    let mut guard = bpm.read_page(page_id).unwrap();
    let mut leaf = BTreeLeafPage::new(guard.data_mut());
    leaf.init();

    for key in [10i64, 20, 30, 40] {
        leaf.insert(key, Rid::new(key as u32, 0)).unwrap();
    }

    // Present key: lower bound lands on it
    let idx = leaf.find_key_index(30);
    assert_eq!(leaf.key_at(idx).unwrap(), 30);
    assert_eq!(leaf.rid_at(idx).unwrap(), Rid::new(30, 0));

    // Absent key: lower bound is the insertion point
    assert_eq!(leaf.find_key_index(25), 2);
    assert_eq!(leaf.find_key_index(45), 4);
}

#[test]
fn test_leaf_chain_links_across_pages() {
    let (bpm, file_id, _dir) = create_bpm(4);

    // Two sibling leaves linked through the special footer
    {
        let mut guard = bpm.read_page(PageId::new(file_id, 0)).unwrap();
        let mut leaf = BTreeLeafPage::new(guard.data_mut());
        leaf.init();
        leaf.insert(1, Rid::new(0, 0)).unwrap();
        leaf.set_next_page(Some(1));
    }
    {
        let mut guard = bpm.read_page(PageId::new(file_id, 1)).unwrap();
        let mut leaf = BTreeLeafPage::new(guard.data_mut());
        leaf.init();
        leaf.insert(2, Rid::new(0, 1)).unwrap();
        leaf.set_prev_page(Some(0));
    }

    let mut guard = bpm.read_page(PageId::new(file_id, 0)).unwrap();
    let leaf = BTreeLeafPage::new(guard.data_mut());
    let next = leaf.next_page().unwrap();
    drop(guard);

    let mut guard = bpm.read_page(PageId::new(file_id, next)).unwrap();
    let leaf = BTreeLeafPage::new(guard.data_mut());
    assert_eq!(leaf.prev_page(), Some(0));
    assert_eq!(leaf.key_at(0).unwrap(), 2);
}

#[test]
fn test_internal_page_separator_layout() {
    let (bpm, file_id, _dir) = create_bpm(2);
    let page_id = PageId::new(file_id, 0);

    let mut guard = bpm.read_page(page_id).unwrap();
    let mut node = BTreeInternalPage::new(guard.data_mut());
    node.init(1, 100);

    node.insert(10, 101).unwrap();
    node.insert(20, 102).unwrap();
    node.insert(30, 103).unwrap();

    assert_eq!(node.level(), 1);
    assert!(!node.is_leaf());
    assert_eq!(node.leftmost_child(), 100);
    assert_eq!(node.entry_count(), 3);

    // Separators are sorted; each child sits right of its key
    assert_eq!(node.key_at(1).unwrap(), 20);
    assert_eq!(node.right_child_at(1).unwrap(), 102);
    assert_eq!(node.find_key_index(15), 1);
}

#[test]
fn test_leaf_fills_until_page_full() {
    let (bpm, file_id, _dir) = create_bpm(2);
    let page_id = PageId::new(file_id, 0);

    let mut guard = bpm.read_page(page_id).unwrap();
    let mut leaf = BTreeLeafPage::new(guard.data_mut());
    leaf.init();

    let mut inserted = 0i64;
    while leaf.has_free_space() {
        leaf.insert(inserted, Rid::new(0, 0)).unwrap();
        inserted += 1;
    }

    // Entries plus slots account for the whole usable area
    let usable = 8192 - 7 - 10;
    assert!(inserted as usize >= usable / (LEAF_TUPLE_SIZE + 2) - 1);
    assert!(leaf.insert(inserted, Rid::new(0, 0)).is_err());

    // The raw view agrees on the slot count
    drop(guard);
    let guard = bpm.read_page(page_id).unwrap();
    let raw = SlottedPageRef::new(guard.data());
    assert_eq!(raw.slot_count() as i64, inserted);
    assert!(!raw.has_free_space());
}
