//! Splitting work into API-sized batches

use std::future::Future;

use futures_util::future::join_all;

/// Maximum number of items per media-item creation or album-add call
pub const CREATE_BATCH_SIZE: usize = 50;

/// Maximum number of items per add/remove call during an album merge
pub const ALBUM_EDIT_BATCH_SIZE: usize = 49;

/// Splits `items` into consecutive batches of at most `size`
pub fn split<'a, T>(items: &'a [T], size: usize) -> impl Iterator<Item = &'a [T]> {
    items.chunks(size.max(1))
}

/// Runs `f` on each batch in order, stopping at the first error
pub async fn chain<'a, T, E, F, Fut>(items: &'a [T], size: usize, mut f: F) -> Result<(), E>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for batch in split(items, size) {
        f(batch).await?;
    }
    Ok(())
}

/// Runs `f` on every batch concurrently and returns each batch's outcome
/// in batch order
///
/// Batches are disjoint mutable views of `items`, so `f` may update the
/// elements of its batch in place.
pub async fn parallel<'a, T, R, F, Fut>(items: &'a mut [T], size: usize, f: F) -> Vec<R>
where
    F: FnMut(&'a mut [T]) -> Fut,
    Fut: Future<Output = R>,
{
    join_all(items.chunks_mut(size.max(1)).map(f)).await
}
