pub mod analyze;
pub mod config;
pub mod info;
pub mod intensity;

use anyhow::{bail, Context, Result};
use beatflow_core::frame::Roi;

/// Parse `x,y,width,height` into a region of interest.
pub fn parse_roi(text: &str) -> Result<Roi> {
    let parts: Vec<usize> = text
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid ROI '{text}', expected x,y,width,height"))?;
    let [x, y, width, height] = parts[..] else {
        bail!("Invalid ROI '{text}', expected four values x,y,width,height");
    };
    Ok(Roi::new(x, y, width, height))
}
