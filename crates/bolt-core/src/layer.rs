use crate::upstream::UpstreamResult;

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// One strategy in an ordered fallback chain.
///
/// A layer yields `Ok(Some(_))` when it resolved the value, `Ok(None)` when it
/// has nothing to offer, and `Err(_)` when an upstream call failed. Only
/// timeouts stop the chain; other failures skip to the next layer.
pub struct Layer<C: ?Sized, T> {
    pub id: &'static str,
    pub resolve: fn(&C) -> UpstreamResult<Option<T>>,
}

/// Run `layers` in order and return the first value produced.
pub fn resolve_first<C: ?Sized, T>(layers: &[Layer<C, T>], ctx: &C) -> UpstreamResult<Option<T>> {
    for layer in layers {
        match (layer.resolve)(ctx) {
            Ok(Some(value)) => {
                tracing::info!(layer = layer.id, "layer resolved");
                return Ok(Some(value));
            }
            Ok(None) => tracing::debug!(layer = layer.id, "layer empty"),
            Err(e) if e.is_timeout() => return Err(e),
            Err(e) => tracing::warn!(layer = layer.id, error = %e, "layer skipped"),
        }
    }
    Ok(None)
}
