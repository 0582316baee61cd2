use super::{with_attached_links, ActionOutcome, StopReason, ID_KEY, TOPOLOGY_ID_KEY};
use crate::{
    collation::{
        model::{info_value, require_info, Info},
        report::{ActionLog, AffectedElements},
    },
    error::CollationError,
    properties::{Element, ElementKind, ElementRef, SeqKey},
    store::{ReplaceOptions, TopologyStore},
};
use std::collections::BTreeSet;

/// Find the single element of `source.kind` with GRENML ID `target_id`, optionally restricted
/// to members of the Topology with GRENML ID `topology_id`.
///
/// Fails with [CollationError::NoSubstitute], [CollationError::MultipleSubstitutes] or
/// [CollationError::SourceIsTarget] when no distinct target can be identified.
pub fn resolve_target(
    store: &TopologyStore,
    source: ElementRef,
    target_id: &str,
    topology_id: Option<&str>,
) -> Result<SeqKey, CollationError> {
    let mut candidates = store.with_grenml_id(source.kind, target_id);
    if let Some(topology_id) = topology_id {
        let topology = store
            .topology_by_grenml_id(topology_id)
            .ok_or(CollationError::NoSubstitute(source.kind))?
            .key;
        candidates.retain(|key| {
            store
                .element(ElementRef::new(source.kind, *key))
                .is_some_and(|base| base.topologies.contains(&topology))
        });
    }
    match candidates.as_slice() {
        [] => Err(CollationError::NoSubstitute(source.kind)),
        [target] if *target == source.key => Err(CollationError::SourceIsTarget {
            kind: source.kind,
            name: store
                .element(source)
                .map(|base| base.name.clone())
                .unwrap_or_default(),
        }),
        [target] => Ok(*target),
        _ => Err(CollationError::MultipleSubstitutes(source.kind)),
    }
}

/// Resolve the target named by an Action's parameters, aborting `log` on a resolution error.
fn identify_target(
    store: &TopologyStore,
    source: ElementRef,
    infos: &[Info],
    log: &mut ActionLog,
) -> Result<Option<ElementRef>, CollationError> {
    let target_id = require_info(infos, ID_KEY)?;
    let topology_id = info_value(infos, TOPOLOGY_ID_KEY);
    match resolve_target(store, source, target_id, topology_id) {
        Ok(key) => Ok(Some(ElementRef::new(source.kind, key))),
        Err(e) if e.is_resolution() => {
            log.abort(e.to_string());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Move `source`'s properties onto `target`.
///
/// A property whose name is new to the target is copied. An identical (name, value) pair is
/// never duplicated. A differing value for an existing name is dropped, except for `tag`, where
/// values accumulate. Returns how many properties were copied.
pub fn merge_properties(
    store: &mut TopologyStore,
    source: ElementRef,
    target: ElementRef,
) -> Result<usize, CollationError> {
    let source_properties = store.require(source)?.properties.clone();
    let target_names: BTreeSet<String> = store
        .require(target)?
        .properties
        .iter()
        .map(|p| p.name.clone())
        .collect();
    let mut copied = 0;
    for property in source_properties {
        let target_base = store.require(target)?;
        if target_base.has_property(&property.name, &property.value) {
            continue;
        }
        if !target_names.contains(&property.name) || property.is_tag() {
            store.add_property(target, property)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy every optional model field that is empty on `target` from `source`.
fn merge_model_fields(
    store: &mut TopologyStore,
    source: ElementRef,
    target: ElementRef,
) -> Result<(), CollationError> {
    let missing = || CollationError::NotFound(format!("{source} or {target}"));
    match source.kind {
        ElementKind::Institution => {
            let from = store.institution(source.key).cloned().ok_or_else(missing)?;
            store
                .institution_mut(target.key)
                .ok_or_else(missing)?
                .fill_empty_from(&from);
        }
        ElementKind::Node => {
            let from = store.node(source.key).cloned().ok_or_else(missing)?;
            store
                .node_mut(target.key)
                .ok_or_else(missing)?
                .fill_empty_from(&from);
        }
        ElementKind::Link => {
            let from = store.link(source.key).cloned().ok_or_else(missing)?;
            store
                .link_mut(target.key)
                .ok_or_else(missing)?
                .fill_empty_from(&from);
        }
    }
    Ok(())
}

fn record_conflicts(
    conflicting_links: Vec<(SeqKey, String)>,
    message: &mut String,
    affected: &mut AffectedElements,
) {
    for (link, conflict) in conflicting_links {
        affected.insert(ElementRef::link(link));
        message.push('\n');
        message.push_str(&conflict);
    }
}

/// Fold `source` into the resolved target: empty fields and properties are filled from the
/// source, Topologies and owners are unioned, then the source is replaced.
pub(super) fn merge(
    store: &mut TopologyStore,
    source: ElementRef,
    infos: &[Info],
    log: &mut ActionLog,
) -> Result<ActionOutcome, CollationError> {
    let Some(target) = identify_target(store, source, infos, log)? else {
        return Ok(ActionOutcome::Stopped(StopReason::Aborted(log.message.clone())));
    };
    let mut message = format!(
        "Merge {} {} into {}.",
        source.kind,
        store.log_str(source),
        store.log_str(target)
    );
    let mut affected = AffectedElements::default();
    affected.extend(with_attached_links(store, source));
    affected.insert(target);

    merge_model_fields(store, source, target)?;
    merge_properties(store, source, target)?;
    let outcome = store.replace(source, target.key, ReplaceOptions::union_all())?;
    record_conflicts(outcome.conflicting_links, &mut message, &mut affected);
    log.result(message, affected);
    Ok(ActionOutcome::Continue(target.key))
}

/// Discard `source` in favour of the resolved target. Fields and properties of the source are
/// lost; its Topologies are unioned into the target. Links must share both endpoints.
pub(super) fn replace(
    store: &mut TopologyStore,
    source: ElementRef,
    infos: &[Info],
    log: &mut ActionLog,
) -> Result<ActionOutcome, CollationError> {
    let Some(target) = identify_target(store, source, infos, log)? else {
        return Ok(ActionOutcome::Stopped(StopReason::Aborted(log.message.clone())));
    };
    if source.kind == ElementKind::Link {
        let source_ends = store.link(source.key).map(|l| l.endpoints());
        let target_ends = store.link(target.key).map(|l| l.endpoints());
        if source_ends != target_ends {
            log.abort(
                CollationError::DifferentEndpoints {
                    target: store.log_str(source),
                    replacement: store.log_str(target),
                }
                .to_string(),
            );
            return Ok(ActionOutcome::Stopped(StopReason::Aborted(log.message.clone())));
        }
    }
    let mut message = format!(
        "Delete {} {} and replace with {}.",
        source.kind,
        store.log_str(source),
        store.log_str(target)
    );
    let mut affected = AffectedElements::default();
    affected.extend(with_attached_links(store, source));
    affected.insert(target);

    let outcome = store.replace(source, target.key, ReplaceOptions::new(true, false))?;
    record_conflicts(outcome.conflicting_links, &mut message, &mut affected);
    log.result(message, affected);
    Ok(ActionOutcome::Continue(target.key))
}
