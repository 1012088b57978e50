// This module implements the overload grouper. All descriptors sharing a base name on one
// surface are clustered by their parser signature with out parameters elided, so a plain
// operator and its `_out` twin collapse into a single logical overload that the dispatch
// code splits at run time on whether `out` was passed. The first plain descriptor seen
// for a key is the base, the first out descriptor is the out member, and the group shows
// the out member's richer signature when there is one. Groups are ordered plain-only
// first, then out-bearing, each block keeping first-seen order. That order is the
// overload resolution priority and the parser's overload index. An out member without a
// plain base is a descriptor-table defect: fatal by default, a logged fallback on request.

//! Overload grouping.

use crate::core::{GenError, GenResult, GenerationSession, MissingBasePolicy};
use crate::descriptor::Function;
use crate::filter::Surface;
use crate::signature::{generate_signature, OutParams, Signature};

/// Descriptors sharing one out-elided signature.
#[derive(Debug, Clone)]
pub struct OverloadGroup<'f> {
    /// Signature with out parameters elided.
    pub key: String,
    /// Signature handed to the argument parser.
    pub signature: Signature,
    pub base: Option<&'f Function>,
    pub out: Option<&'f Function>,
}

impl<'f> OverloadGroup<'f> {
    /// The descriptor dispatched when `out` is omitted.
    ///
    /// Falls back to the out member when the group has no plain base.
    pub fn primary(&self) -> &'f Function {
        match (self.base, self.out) {
            (Some(base), _) => base,
            (None, Some(out)) => out,
            (None, None) => unreachable!("overload group without members"),
        }
    }

    /// Both a plain and an out member, dispatched on whether `out` was supplied.
    pub fn has_out_branch(&self) -> bool {
        self.base.is_some() && self.out.is_some()
    }

    pub fn is_fallback(&self) -> bool {
        self.base.is_none()
    }
}

/// Group the descriptors of base name `name` on `surface`.
///
/// `functions` must be in table order; the result is in dispatch priority order.
pub fn group_overloads<'f>(
    name: &str,
    functions: &[&'f Function],
    surface: Surface,
    session: &GenerationSession,
) -> GenResult<Vec<OverloadGroup<'f>>> {
    let mut groups: Vec<OverloadGroup<'f>> = Vec::new();

    for &function in functions {
        let key = generate_signature(function, surface, OutParams::Elide)?;
        let index = match groups.iter().position(|g| g.key == key.text) {
            Some(index) => index,
            None => {
                groups.push(OverloadGroup {
                    key: key.text.clone(),
                    signature: key,
                    base: None,
                    out: None,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];

        if function.is_out() {
            if let Some(existing) = group.out {
                log::warn!("Ignoring {}: {} already provides out for {}", function.name, existing.name, group.key);
                continue;
            }
            group.out = Some(function);
            group.signature = generate_signature(function, surface, OutParams::Keep)?;
        } else {
            if let Some(existing) = group.base {
                log::warn!("Ignoring {}: {} already provides {}", function.name, existing.name, group.key);
                continue;
            }
            group.base = Some(function);
        }
    }

    for group in groups.iter().filter(|g| g.is_fallback()) {
        match session.config().missing_base {
            MissingBasePolicy::Error => {
                return Err(GenError::MissingBase {
                    name: group.primary().name.clone(),
                    signature: group.key.clone(),
                })
            }
            MissingBasePolicy::Warn => {
                log::warn!("Missing base: {} ({}), dispatching out variant", group.primary().name, group.key);
                session.record_fallback_base();
            }
        }
    }

    // Stable: first-seen order survives within each block.
    groups.sort_by_key(|g| g.out.is_some());
    log::debug!("{} on {}: {} overload groups", name, surface, groups.len());
    Ok(groups)
}
