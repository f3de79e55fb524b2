use std::path::Path;

use super::probe::{MediaProbe, ProbeError};
use crate::models::asset::AspectClass;

/// Determine the aspect class of the buffered video at `path`.
pub async fn classify(probe: &dyn MediaProbe, path: &Path) -> Result<AspectClass, ProbeError> {
    let dims = probe.dimensions(path).await?;
    let class = AspectClass::from_dimensions(dims.width, dims.height);
    tracing::debug!(width = dims.width, height = dims.height, %class, "classified video");
    Ok(class)
}
