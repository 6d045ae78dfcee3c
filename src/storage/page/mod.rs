mod btree_page;
mod slotted_page;

pub use btree_page::*;
pub use slotted_page::*;
