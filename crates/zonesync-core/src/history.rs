//! Commit history walk over an injected object lookup.
//!
//! The walk follows `parent` links starting at `from` until it reaches `to`
//! (a match) or runs out of history. Storage is not known here; callers pass
//! an async `lookup(oid)` that returns the framed object if it exists.

use std::collections::HashSet;
use std::future::Future;

use crate::commit::Commit;
use crate::error::CoreError;
use crate::object::Object;
use crate::types::Oid;

/// Walk commits from `from` back toward `to`.
///
/// Returns whether `to` was reached and the commits visited, newest first,
/// or oldest first when `reverse` is set. The commit equal to `to` is
/// included in the list. When both ends are zero the walk matches with an
/// empty list; a zero `from` with a non-zero `to` is an error.
pub async fn build_commit_history<F, Fut, E>(
    from: Oid,
    to: Oid,
    reverse: bool,
    mut lookup: F,
) -> Result<(bool, Vec<Commit>), E>
where
    F: FnMut(Oid) -> Fut,
    Fut: Future<Output = Result<Option<Object>, E>>,
    E: From<CoreError>,
{
    if from.is_zero() && !to.is_zero() {
        return Err(CoreError::InvalidHistoryStart(to.to_hex()).into());
    }

    let mut history = Vec::new();
    let mut visited = HashSet::new();
    let mut matched = false;
    let mut current = from;

    loop {
        if current.is_zero() {
            matched = to.is_zero();
            break;
        }
        if !visited.insert(current) {
            return Err(CoreError::InvalidCommit(format!("cycle at {current}")).into());
        }
        let Some(object) = lookup(current).await? else {
            break;
        };
        let commit = object.to_commit()?;
        let parent = commit.parent;
        history.push(commit);
        if object.oid() == to {
            matched = true;
            break;
        }
        current = parent;
    }

    if reverse {
        history.reverse();
    }
    Ok((matched, history))
}
