//! Infer an existing table's vector length by probing it.
//!
//! The probe issues a nearest-neighbour query with a zero vector. The engine
//! rejects a query of the wrong length, and a successful query that returns a
//! row tells us the stored length directly.

use std::future::Future;

use crate::error::Result;

/// Widths of common embedding models, tried in order after the assumed width.
pub const COMMON_DIMENSIONS: &[usize] = &[512, 768, 1024, 1536, 2048, 3072];

/// Resolve the table's vector length.
///
/// `probe` runs a 1-NN query with the given vector and yields the length of
/// the returned row's vector, `None` when nothing comes back. The first
/// successful probe wins: the assumed width first, then [`COMMON_DIMENSIONS`].
/// When every probe fails the assumption is returned unchanged; a real
/// mismatch then surfaces on the first search or write.
///
/// A candidate the engine happens to accept while holding a different
/// length would be adopted wrongly, so stores that can read the width from
/// their schema should prefer that.
pub async fn reconcile<F, Fut>(assumed: usize, mut probe: F) -> usize
where
    F: FnMut(Vec<f32>) -> Fut,
    Fut: Future<Output = Result<Option<usize>>>,
{
    let candidates = std::iter::once(assumed)
        .chain(COMMON_DIMENSIONS.iter().copied().filter(|&d| d != assumed));

    for width in candidates {
        match probe(vec![0.0; width]).await {
            Ok(Some(actual)) => {
                if actual != assumed {
                    tracing::info!("existing table holds {actual}-dim vectors (assumed {assumed})");
                }
                return actual;
            }
            Ok(None) => tracing::debug!("probe with {width} dims returned no rows"),
            Err(e) => tracing::debug!("probe with {width} dims failed: {e}"),
        }
    }

    tracing::warn!("could not infer table dimensionality; assuming {assumed}");
    assumed
}
