//! redb table layout.
//!
//! One table per namespace, `&str` keys and `&[u8]` values. Clearing a
//! namespace drops and recreates its table, leaving other namespaces alone.

use redb::TableDefinition;

/// Table holding every key of `namespace`.
pub fn namespace_table(namespace: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(namespace)
}
