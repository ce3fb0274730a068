//! Redb table definitions for persistent chapter storage.

use redb::TableDefinition;

// Key: chapter id (UUID string), Value: bincode-encoded ChapterRecord
pub const CHAPTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("chapters");
// Key: natural key "subject\x00chapter\x00class\x00unit", Value: chapter id
pub const CHAPTER_KEYS: TableDefinition<&str, &str> = TableDefinition::new("chapter_keys");
