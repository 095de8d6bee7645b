use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use facegate_config::CameraDefaults;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GrayImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::object::{ContentType, ImageBlob};

pub mod device;

pub use device::{CaptureDevice, CaptureDeviceFactory, V4lCaptureDevice};

pub const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLocator {
    Index(u32),
    Path(PathBuf),
}

impl DeviceLocator {
    pub fn from_option(device: Option<String>) -> Self {
        match device {
            Some(text) => {
                if let Ok(index) = text.parse::<u32>() {
                    DeviceLocator::Index(index)
                } else {
                    DeviceLocator::Path(PathBuf::from(text))
                }
            }
            None => DeviceLocator::Index(0),
        }
    }

    pub fn display(&self) -> String {
        match self {
            DeviceLocator::Index(i) => format!("/dev/video{i}"),
            DeviceLocator::Path(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub device: DeviceLocator,
    pub pixel_format: String,
    pub warmup_frames: u32,
}

impl CameraConfig {
    /// Command-line override first, then configured defaults.
    pub fn resolve(device_override: Option<String>, defaults: &CameraDefaults) -> Self {
        let device = device_override.unwrap_or_else(|| defaults.video_device.clone());
        Self {
            device: DeviceLocator::from_option(Some(device)),
            pixel_format: defaults.pixel_format.clone(),
            warmup_frames: defaults.warmup_frames,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameFormat {
    pub pixel_format: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub path: String,
}

/// Exclusively owned camera handle. `start` is idempotent and `stop` is safe
/// to call when nothing is running; dropping a started camera releases it.
pub struct Camera {
    config: CameraConfig,
    factory: Box<CaptureDeviceFactory>,
    device: Option<Box<dyn CaptureDevice>>,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self::with_factory(config, |config: &CameraConfig| {
            V4lCaptureDevice::open(config).map(|device| Box::new(device) as Box<dyn CaptureDevice>)
        })
    }

    pub fn with_factory(
        config: CameraConfig,
        factory: impl Fn(&CameraConfig) -> AppResult<Box<dyn CaptureDevice>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            device: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.device.is_some()
    }

    pub fn start(&mut self) -> AppResult<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = (self.factory)(&self.config)?;
        let format = device.format();
        let summary = device.summary();
        info!(
            target: "camera",
            device = %summary.path,
            driver = %summary.driver,
            card = %summary.card,
            bus = %summary.bus_info,
            pixel_format = %format.pixel_format,
            width = format.width,
            height = format.height,
            "camera started"
        );
        self.device = Some(device);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(device) = self.device.take() {
            drop(device);
            info!(target: "camera", device = %self.config.device.display(), "camera stopped");
        }
    }

    /// Grab one frame and encode it as JPEG.
    pub fn capture_jpeg(&mut self) -> AppResult<ImageBlob> {
        let warmup = self.config.warmup_frames;
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| AppError::InputMissing("camera is not started".into()))?;
        let frame = device.grab(warmup)?;
        let format = device.format();
        debug!(target: "camera", bytes = frame.len(), "frame captured");
        let bytes = frame_to_jpeg(&frame, &format)?;
        Ok(ImageBlob::new(bytes, ContentType::jpeg()))
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Where a run's image comes from.
pub enum CaptureSource<'a> {
    File(PathBuf),
    Camera(&'a mut Camera),
}

impl CaptureSource<'_> {
    pub fn acquire(self) -> AppResult<ImageBlob> {
        match self {
            CaptureSource::File(path) => read_image_file(&path),
            CaptureSource::Camera(camera) => camera.capture_jpeg(),
        }
    }
}

pub fn read_image_file(path: &Path) -> AppResult<ImageBlob> {
    let content_type = ContentType::from_path(path)?;
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::InputMissing(format!(
                "image file {} not found",
                path.display()
            )))
        }
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        return Err(AppError::InputMissing(format!(
            "image file {} is empty",
            path.display()
        )));
    }
    Ok(ImageBlob::new(bytes, content_type))
}

/// Write the blob for preview, independent of how the run ends.
pub fn write_preview(blob: &ImageBlob, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &blob.bytes)?;
    Ok(())
}

pub fn frame_to_jpeg(data: &[u8], format: &FrameFormat) -> AppResult<Vec<u8>> {
    if matches!(format.pixel_format.as_str(), "MJPG" | "JPEG") {
        return Ok(data.to_vec());
    }
    let image = luma_frame(data, format)?;
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::L8)?;
    }
    Ok(out)
}

/// Bytes per pixel and the offset of the luma byte inside each pixel.
fn luma_layout(pixel_format: &str) -> Option<(usize, usize)> {
    match pixel_format {
        "GREY" | "Y08" => Some((1, 0)),
        // Little-endian; the high byte carries the visible range.
        "Y16" => Some((2, 1)),
        // Y0 U Y1 V
        "YUYV" => Some((2, 0)),
        _ => None,
    }
}

/// Reduce a raw camera frame to its luma plane so it can be JPEG-encoded.
pub fn luma_frame(data: &[u8], format: &FrameFormat) -> AppResult<GrayImage> {
    let (stride, offset) = luma_layout(&format.pixel_format).ok_or_else(|| {
        AppError::FrameProcessing(format!(
            "cannot encode {} camera frames as JPEG",
            format.pixel_format
        ))
    })?;
    let needed = format.width as usize * format.height as usize * stride;
    if data.len() < needed {
        return Err(AppError::FrameProcessing(format!(
            "{} frame of {}x{} needs {} bytes, camera delivered {}",
            format.pixel_format,
            format.width,
            format.height,
            needed,
            data.len()
        )));
    }
    let luma = data[offset..needed].iter().step_by(stride).copied().collect();
    GrayImage::from_vec(format.width, format.height, luma)
        .ok_or_else(|| AppError::FrameProcessing("luma plane does not fit the frame size".into()))
}
