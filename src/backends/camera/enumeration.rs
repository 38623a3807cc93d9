// SPDX-License-Identifier: GPL-3.0-only

//! Capture device discovery
//!
//! Probes the first few `/dev/video<N>` indices with `VIDIOC_QUERYCAP` and
//! keeps the ones that advertise video capture. Metadata and output nodes
//! are skipped.

use super::types::DeviceInfo;
use crate::constants::capture::{MAX_PROBED_DEVICES, V4L2_DEVICE_PREFIX};
use tracing::{debug, info};
use v4l::capability::Flags;

/// List capture-capable devices among indices `0..MAX_PROBED_DEVICES`
///
/// Indices that fail to open are skipped silently.
pub fn enumerate_capture_devices() -> Vec<DeviceInfo> {
    let devices: Vec<DeviceInfo> = (0..MAX_PROBED_DEVICES).filter_map(probe_device).collect();
    info!(count = devices.len(), "Enumerated capture devices");
    devices
}

fn probe_device(index: usize) -> Option<DeviceInfo> {
    let path = format!("{}{}", V4L2_DEVICE_PREFIX, index);
    let device = v4l::Device::new(index).ok()?;
    let caps = match device.query_caps() {
        Ok(caps) => caps,
        Err(e) => {
            debug!(path = %path, error = %e, "QUERYCAP failed");
            return None;
        }
    };

    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path = %path, card = %caps.card, "Skipping node without video capture");
        return None;
    }

    debug!(path = %path, card = %caps.card, driver = %caps.driver, "Found capture device");
    Some(DeviceInfo {
        index: index as u32,
        path,
        card: caps.card,
        driver: caps.driver,
    })
}
