use v4l::buffer::Type;
use v4l::capability::{Capabilities, Flags as CapabilityFlags};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

use crate::errors::{AppError, AppResult};

use super::{CameraConfig, DeviceLocator, DeviceSummary, FrameFormat};

const STREAM_BUFFERS: u32 = 4;

pub trait CaptureDevice {
    fn summary(&self) -> DeviceSummary;
    fn format(&self) -> FrameFormat;
    /// Discard `warmup_frames` frames, then return the next one.
    fn grab(&mut self, warmup_frames: u32) -> AppResult<Vec<u8>>;
}

pub type CaptureDeviceFactory =
    dyn Fn(&CameraConfig) -> AppResult<Box<dyn CaptureDevice>> + Send + Sync;

pub struct V4lCaptureDevice {
    inner: v4l::Device,
    format: FrameFormat,
    summary: DeviceSummary,
}

impl V4lCaptureDevice {
    pub fn open(config: &CameraConfig) -> AppResult<Self> {
        let inner = open_locator(&config.device)?;
        let caps = inner.query_caps()?;
        ensure_capabilities(&caps)?;
        let summary = DeviceSummary {
            driver: caps.driver.clone(),
            card: caps.card.clone(),
            bus_info: caps.bus.clone(),
            path: config.device.display(),
        };

        let requested = fourcc_from_name(&config.pixel_format)
            .ok_or_else(|| AppError::UnsupportedFormat(config.pixel_format.clone()))?;
        let formats = inner.enum_formats()?;
        if !formats.iter().any(|format| format.fourcc == requested) {
            return Err(AppError::UnsupportedFormat(config.pixel_format.clone()));
        }

        let mut format = inner.format()?;
        format.fourcc = requested;
        let negotiated = inner.set_format(&format)?;

        Ok(Self {
            inner,
            format: FrameFormat {
                pixel_format: fourcc_name(negotiated.fourcc),
                width: negotiated.width,
                height: negotiated.height,
            },
            summary,
        })
    }
}

impl CaptureDevice for V4lCaptureDevice {
    fn summary(&self) -> DeviceSummary {
        self.summary.clone()
    }

    fn format(&self) -> FrameFormat {
        self.format.clone()
    }

    fn grab(&mut self, warmup_frames: u32) -> AppResult<Vec<u8>> {
        let mut stream = Stream::with_buffers(&self.inner, Type::VideoCapture, STREAM_BUFFERS)?;
        for idx in 0..warmup_frames {
            stream.next().map_err(|err| {
                AppError::FrameProcessing(format!(
                    "failed to read warm-up frame {}: {}",
                    idx + 1,
                    err
                ))
            })?;
        }
        let (data, meta) = stream.next()?;
        let used = (meta.bytesused as usize).min(data.len());
        let used = if used == 0 { data.len() } else { used };
        Ok(data[..used].to_vec())
    }
}

fn open_locator(locator: &DeviceLocator) -> AppResult<v4l::Device> {
    let opened = match locator {
        DeviceLocator::Index(index) => v4l::Device::new(*index as usize),
        DeviceLocator::Path(path) => v4l::Device::with_path(path),
    };
    opened.map_err(|err| AppError::DeviceOpen {
        device: locator.display(),
        source: err,
    })
}

/// The camera must stream frames into mmap buffers.
fn ensure_capabilities(caps: &Capabilities) -> AppResult<()> {
    let required = [
        (CapabilityFlags::VIDEO_CAPTURE, "video capture"),
        (CapabilityFlags::STREAMING, "streaming I/O"),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(flag, _)| !caps.capabilities.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::Capability(format!(
        "{} ({}) lacks {}",
        caps.card,
        caps.driver,
        missing.join(" and ")
    )))
}

/// Config names such as `Y16` are padded with spaces to a fourcc.
fn fourcc_from_name(name: &str) -> Option<FourCC> {
    let bytes = name.as_bytes();
    if !(1..=4).contains(&bytes.len()) {
        return None;
    }
    let mut repr = *b"    ";
    repr[..bytes.len()].copy_from_slice(bytes);
    Some(FourCC::new(&repr))
}

fn fourcc_name(fourcc: FourCC) -> String {
    fourcc
        .repr
        .iter()
        .map(|&byte| char::from(byte))
        .filter(|c| *c != '\0')
        .collect::<String>()
        .trim_end()
        .to_string()
}
