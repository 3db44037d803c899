//! Group/level bitmask resolution

use crate::schema::Schema;

/// Bitwise OR of the levels of every changed parameter
///
/// Unknown names contribute nothing. The result does not depend on order or
/// on repeated names.
pub fn compute_level<'a, I>(changed: I, schema: &Schema) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    changed
        .into_iter()
        .filter_map(|name| schema.level_of(name))
        .fold(0, |acc, level| acc | level)
}
