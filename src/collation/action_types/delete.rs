use super::{with_attached_links, ActionOutcome, StopReason};
use crate::{
    collation::report::{ActionLog, AffectedElements},
    error::CollationError,
    properties::{ElementKind, ElementRef},
    store::TopologyStore,
};

/// Delete the element outright. Deleting a Node takes its Links with it; deleting an Institution
/// leaves the elements it owned in place, minus the ownership.
pub(super) fn apply(
    store: &mut TopologyStore,
    element: ElementRef,
    log: &mut ActionLog,
) -> Result<ActionOutcome, CollationError> {
    let message = format!("Delete {} {}.", element.kind, store.log_str(element));
    let mut affected = AffectedElements::default();
    affected.extend(with_attached_links(store, element));
    if element.kind == ElementKind::Institution {
        let (nodes, links) = store.owned_elements(element.key);
        affected.extend(nodes.into_iter().map(ElementRef::node));
        affected.extend(links.into_iter().map(ElementRef::link));
    }
    store.delete_element(element)?;
    log.result(message, affected);
    Ok(ActionOutcome::Stopped(StopReason::Deleted))
}
