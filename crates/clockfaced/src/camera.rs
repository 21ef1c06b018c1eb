//! Camera source: live readiness plus on-demand still capture.
//!
//! The daemon only ever needs one JPEG at submission time — the continuous
//! preview and landmark tracking run upstream. `V4l2Camera` negotiates MJPG
//! where possible (the dequeued buffer is already a JPEG) and falls back to
//! YUYV with a software encode.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("camera not ready")]
    NotReady,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    UnsupportedFormat(String),
}

/// Camera as the capture pipeline sees it. `stop` takes effect immediately:
/// once called, `is_ready` is false and captures are refused, so a late
/// submit tick cannot touch a torn-down device.
#[async_trait]
pub trait CameraSource: Send + Sync {
    fn is_ready(&self) -> bool;
    fn start(&self);
    fn stop(&self);
    /// Capture one still frame as JPEG bytes.
    async fn capture_still(&self) -> Result<Vec<u8>, CameraError>;
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    /// Motion-JPEG: each buffer is a complete JPEG image.
    Mjpg,
    /// YUYV 4:2:2 packed; Y channel extracted and JPEG-encoded in software.
    Yuyv,
}

struct Inner {
    device: Mutex<Device>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    on: AtomicBool,
}

/// V4L2-backed camera.
pub struct V4l2Camera {
    inner: Arc<Inner>,
}

impl V4l2Camera {
    /// Open a V4L2 device by path (e.g., "/dev/video0") and negotiate a
    /// format. The camera starts stopped; `start` is called when a capture
    /// attempt begins.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::UnsupportedFormat(
                "device does not support video capture".to_string(),
            ));
        }

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::UnsupportedFormat(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"MJPG");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::UnsupportedFormat(format!("failed to set format: {e}")))?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"MJPG") {
            PixelFormat::Mjpg
        } else if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(CameraError::UnsupportedFormat(format!(
                "unsupported pixel format: {:?} (need MJPG or YUYV)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                device: Mutex::new(device),
                width: negotiated.width,
                height: negotiated.height,
                pixel_format,
                on: AtomicBool::new(false),
            }),
        })
    }
}

#[async_trait]
impl CameraSource for V4l2Camera {
    fn is_ready(&self) -> bool {
        self.inner.on.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.inner.on.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.inner.on.store(false, Ordering::SeqCst);
    }

    async fn capture_still(&self) -> Result<Vec<u8>, CameraError> {
        if !self.is_ready() {
            return Err(CameraError::NotReady);
        }

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || capture_jpeg(&inner))
            .await
            .map_err(|e| CameraError::CaptureFailed(format!("capture task failed: {e}")))?
    }
}

fn capture_jpeg(inner: &Inner) -> Result<Vec<u8>, CameraError> {
    let device = inner
        .device
        .lock()
        .map_err(|_| CameraError::CaptureFailed("device lock poisoned".to_string()))?;

    let mut stream = MmapStream::with_buffers(&device, BufType::VideoCapture, 4)
        .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

    let (buf, _meta) = stream
        .next()
        .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

    match inner.pixel_format {
        PixelFormat::Mjpg => Ok(buf.to_vec()),
        PixelFormat::Yuyv => yuyv_to_jpeg(buf, inner.width, inner.height),
    }
}

/// Extract the Y channel from a YUYV buffer and encode it as grayscale JPEG.
fn yuyv_to_jpeg(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
    let pixels = (width * height) as usize;
    if buf.len() < pixels * 2 {
        return Err(CameraError::CaptureFailed(format!(
            "YUYV buffer too short: expected {}, got {}",
            pixels * 2,
            buf.len()
        )));
    }

    // YUYV packs [Y0 U Y1 V]; luma sits at every even byte.
    let mut gray = Vec::with_capacity(pixels);
    for idx in 0..pixels {
        gray.push(buf[idx * 2]);
    }

    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 85);
    encoder
        .encode(&gray, width, height, image::ExtendedColorType::L8)
        .map_err(|e| CameraError::CaptureFailed(format!("JPEG encode failed: {e}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_jpeg() {
        // 4x2 YUYV frame, mid-gray luma.
        let buf: Vec<u8> = (0..16)
            .map(|i| if i % 2 == 0 { 128 } else { 64 })
            .collect();
        let jpeg = yuyv_to_jpeg(&buf, 4, 2).unwrap();
        // JPEG SOI marker.
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn yuyv_conversion_rejects_short_buffer() {
        let err = yuyv_to_jpeg(&[0u8; 8], 4, 2).unwrap_err();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
    }
}
