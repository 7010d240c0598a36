use candle_core::Device;
use once_cell::sync::Lazy;
use tracing::{info, warn};

/// Compute device shared by every network in the process.
pub static DEVICE: Lazy<Device> = Lazy::new(|| match Device::new_cuda(0) {
    Ok(device) => {
        info!("initialized CUDA device");
        device
    }
    Err(err) => {
        warn!(error = %err, "CUDA unavailable, falling back to CPU");
        Device::Cpu
    }
});
