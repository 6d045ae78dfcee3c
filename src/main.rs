use std::sync::Arc;

use vellum::buffer::BufferPoolManager;
use vellum::catalog::Catalog;
use vellum::storage::disk::DiskManager;
use vellum::storage::page::{BTreeLeafPage, SlottedPageRef};
use vellum::{PageId, Rid};

fn main() {
    tracing_subscriber::fmt::init();

    println!("Vellum - disk-oriented storage core");
    println!("===================================\n");

    let catalog = Arc::new(Catalog::new("data").expect("failed to create data directory"));
    let file_id = catalog
        .create_index("demo_index")
        .expect("failed to register file");
    println!("Registered backing file: {}", file_id);

    let disk_manager = Arc::new(DiskManager::new(catalog));
    let bpm = BufferPoolManager::new(16, disk_manager);
    println!("Created buffer pool with {} frames\n", bpm.capacity());

    let page_id = PageId::new(file_id, 0);

    // Pin the page and format it as a B+-tree leaf
    {
        let mut guard = bpm.read_page(page_id).expect("failed to pin page");
        let mut leaf = BTreeLeafPage::new(guard.data_mut());
        leaf.init();

        for (i, key) in [42i64, 7, 19, -3].iter().enumerate() {
            leaf.insert(*key, Rid::new(0, i as u16))
                .expect("failed to insert entry");
        }

        println!("Leaf page stats:");
        println!("  - entries: {}", leaf.entry_count());
        println!("  - keys in slot order:");
        for i in 0..leaf.entry_count() {
            println!("      {}", leaf.key_at(i).expect("missing key"));
        }
    }

    bpm.flush_page(page_id).expect("failed to flush page");
    println!("\nFlushed page to disk");

    // Read it back through the raw slotted view
    {
        let guard = bpm.read_page(page_id).expect("failed to pin page");
        let page = SlottedPageRef::new(guard.data());
        println!("Re-read page: {} slots", page.slot_count());
    }

    println!(
        "\nPool: {}/{} frames free",
        bpm.free_frame_count(),
        bpm.capacity()
    );
}
