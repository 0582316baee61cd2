use super::{ActionOutcome, PROPERTY_NAME_KEY, PROPERTY_VALUE_KEY};
use crate::{
    collation::{
        model::{info_value, require_info, Info},
        report::{ActionLog, AffectedElements},
    },
    error::CollationError,
    properties::{ElementRef, TAG_PROPERTY},
    store::TopologyStore,
};

/// Remove properties by name (and optional value), or, with `tag_only`, `tag` properties
/// carrying the given value. The element itself stays, so the chain continues with it.
pub(super) fn apply(
    store: &mut TopologyStore,
    element: ElementRef,
    infos: &[Info],
    tag_only: bool,
    log: &mut ActionLog,
) -> Result<ActionOutcome, CollationError> {
    let (name, value) = if tag_only {
        (
            TAG_PROPERTY.to_string(),
            Some(require_info(infos, PROPERTY_VALUE_KEY)?),
        )
    } else {
        (
            require_info(infos, PROPERTY_NAME_KEY)?.to_lowercase(),
            info_value(infos, PROPERTY_VALUE_KEY),
        )
    };
    let criteria = match value {
        Some(value) => format!("with Name={name} and with Value={value}"),
        None => format!("with Name={name}"),
    };
    let kind = element.kind.to_string().to_lowercase();
    let element_log = store.log_str(element);

    let removed = store.remove_properties(element, &name, value)?;
    let mut affected = AffectedElements::default();
    let message = if removed > 0 {
        affected.insert(element);
        format!("Delete property {criteria} at {kind} {element_log}.")
    } else {
        format!("The given property {criteria} was not found at {kind} {element_log}.")
    };
    log.result(message, affected);
    Ok(ActionOutcome::Continue(element.key))
}
