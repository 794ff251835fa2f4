//! Section population: write resolved pairs into one section's field slots.
//!
//! A single analysis result holds pairs for every section of the form, so
//! each call filters to the keys of the named section and drops the rest.
//! Matching is exact (case, spacing and trailing punctuation included) and a
//! later pair for the same key replaces the earlier value wholesale.

use crate::pipeline::resolve::ResolvedPair;
use crate::schema::SectionTemplate;
use tracing::debug;

/// Populate `section` of an owned template and hand it back.
///
/// Unknown sections leave the template unchanged.
pub fn populate(
    mut template: SectionTemplate,
    pairs: &[ResolvedPair],
    section: &str,
) -> SectionTemplate {
    populate_in_place(&mut template, pairs, section);
    template
}

/// Populate `section` through an exclusive borrow; returns the number of
/// field writes performed (overwrites included).
pub fn populate_in_place(
    template: &mut SectionTemplate,
    pairs: &[ResolvedPair],
    section: &str,
) -> usize {
    if !template.contains_section(section) {
        debug!("Section {:?} not in template; nothing populated", section);
        return 0;
    }

    let mut writes = 0;
    for pair in pairs.iter().filter(|p| !p.key.is_empty()) {
        if template.set_value(section, &pair.key, pair.value.as_str()) {
            writes += 1;
        }
    }
    debug!("Section {:?}: {} field writes", section, writes);
    writes
}
