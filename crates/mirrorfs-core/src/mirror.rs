//! Path rotation used to place the mirrored copy of a file.
//!
//! `/tag/item` is mirrored at `/item/tag`: the first component moves to
//! the end. Deeper paths rotate the same way, so `/a/b/c` maps to
//! `/b/c/a` and applying it again gives `/c/a/b`.

use crate::error::{FsError, Result};

/// Rotated counterpart of `path`.
///
/// Fails with `NotApplicable` unless `path` has at least two components.
pub fn rotate(path: &str) -> Result<String> {
    let not_applicable = || FsError::NotApplicable(path.to_string());

    let body = path.strip_prefix('/').ok_or_else(not_applicable)?;
    let split = body.find('/').ok_or_else(not_applicable)?;
    let (first, rest) = body.split_at(split);

    // rest keeps its leading separator
    if first.is_empty() || rest.len() < 2 {
        return Err(not_applicable());
    }

    let mut rotated = String::with_capacity(path.len());
    rotated.push_str(rest);
    rotated.push('/');
    rotated.push_str(first);
    Ok(rotated)
}

/// Mirror path for `path`, or `None` where rotation does not apply or
/// would land on `path` itself.
pub fn mirror_of(path: &str) -> Option<String> {
    rotate(path).ok().filter(|rotated| rotated != path)
}
