//! Bounded backward search over any token stream.
//!
//! Both the source-text tracer (lines) and the bytecode tracer (instructions)
//! ask the same question: walking back from a position, which is the nearest
//! item satisfying some condition? The window never includes the starting
//! item itself.

/// Default lookback, in lines or instructions, when tracing a published value.
pub const TRACE_WINDOW: usize = 20;

/// Items strictly before `from`, nearest first, at most `window` of them.
/// A `window` of `None` walks back to the start of the stream.
pub fn lookback<T>(
    items: &[T],
    from: usize,
    window: Option<usize>,
) -> impl Iterator<Item = (usize, &T)> + '_ {
    let end = from.min(items.len());
    let start = match window {
        Some(window) => end.saturating_sub(window),
        None => 0,
    };
    items[start..end]
        .iter()
        .enumerate()
        .rev()
        .map(move |(offset, item)| (start + offset, item))
}

/// Index of the nearest item before `from` matching `predicate`.
pub fn find_nearest<T, P>(items: &[T], from: usize, window: Option<usize>, mut predicate: P) -> Option<usize>
where
    P: FnMut(&T) -> bool,
{
    lookback(items, from, window)
        .find(|(_, item)| predicate(item))
        .map(|(index, _)| index)
}

/// First non-`None` projection while walking back from `from`.
pub fn find_map_nearest<T, R, F>(items: &[T], from: usize, window: Option<usize>, mut project: F) -> Option<R>
where
    F: FnMut(usize, &T) -> Option<R>,
{
    lookback(items, from, window).find_map(|(index, item)| project(index, item))
}
