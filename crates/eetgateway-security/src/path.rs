// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Element-path lookup.
//
// Paths are slash-delimited local names relative to the given root, e.g.
// `./Header/Security/Signature/SignedInfo`.  `.` and empty segments stay on
// the current element; prefixes on the tree side are ignored.  A miss is
// always reported as `SchemaError::MalformedEnvelope` with the full path and
// the root's tag, so builder and verifier produce the same diagnostics.

use eetgateway_core::error::SchemaError;

use crate::xml::Element;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

fn not_found(root: &Element, path: &str) -> SchemaError {
    SchemaError::MalformedEnvelope {
        path: path.to_owned(),
        root_tag: root.full_tag(),
    }
}

/// Locate the element at `path` below `root`.
pub fn find_element<'a>(root: &'a Element, path: &str) -> Result<&'a Element, SchemaError> {
    let mut current = root;
    for segment in segments(path) {
        current = current
            .child(segment)
            .ok_or_else(|| not_found(root, path))?;
    }
    Ok(current)
}

/// Mutable variant of [`find_element`].
pub fn find_element_mut<'a>(
    root: &'a mut Element,
    path: &str,
) -> Result<&'a mut Element, SchemaError> {
    let root_tag = root.full_tag();
    let mut current = root;
    for segment in segments(path) {
        current = match current.child_mut(segment) {
            Some(child) => child,
            None => {
                return Err(SchemaError::MalformedEnvelope {
                    path: path.to_owned(),
                    root_tag,
                });
            }
        };
    }
    Ok(current)
}
