use super::{with_attached_links, ActionOutcome};
use crate::{
    collation::report::{ActionLog, AffectedElements},
    error::CollationError,
    properties::{ElementKind, ElementRef},
    store::{ReplaceOptions, TopologyStore},
};

/// Replace every element sharing `element`'s GRENML ID with the newest of them.
///
/// Topologies are always unioned into the survivor, owners too for Nodes and Links. With a
/// single copy left this changes nothing, so running it twice is the same as running it once.
pub(super) fn apply(
    store: &mut TopologyStore,
    element: ElementRef,
    log: &mut ActionLog,
) -> Result<ActionOutcome, CollationError> {
    let grenml_id = store.require(element)?.grenml_id.clone();
    let mut duplicates = store.with_grenml_id(element.kind, &grenml_id);
    duplicates.sort_by(|a, b| b.cmp(a));
    let Some((newest, older)) = duplicates.split_first() else {
        return Err(CollationError::NotFound(store.log_str(element)));
    };
    let newest = ElementRef::new(element.kind, *newest);
    let newest_log = store.log_str(newest);
    let options = ReplaceOptions::new(true, element.kind != ElementKind::Institution);

    let mut messages = Vec::new();
    let mut affected = AffectedElements::default();
    for duplicate in older.iter().map(|key| ElementRef::new(element.kind, *key)) {
        messages.push(format!(
            "Delete {} {} in favour of newest {}.",
            element.kind,
            store.log_str(duplicate),
            newest_log
        ));
        affected.extend(with_attached_links(store, duplicate));
        let outcome = store.replace(duplicate, newest.key, options)?;
        for (link, message) in outcome.conflicting_links {
            affected.insert(ElementRef::link(link));
            messages.push(message);
        }
    }
    affected.insert(newest);
    if messages.is_empty() {
        messages.push(format!("{} {} is already the newest.", element.kind, newest_log));
    }
    log.result(messages.join("\n"), affected);
    Ok(ActionOutcome::Continue(newest.key))
}
