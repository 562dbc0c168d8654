use std::{fmt, io::Cursor, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageError, ImageReader, codecs::jpeg::JpegEncoder};
use serde::{Deserialize, Serialize};

/// 裁剪结果的 JPEG 质量
const JPEG_QUALITY: u8 = 92;
/// 最小缩放倍数
pub const MIN_ZOOM: f64 = 1.0;
/// 最大缩放倍数
pub const MAX_ZOOM: f64 = 3.0;

/// 裁剪相关错误
///
/// 只影响封面图这一步，不会使表单其余部分失效。
#[derive(Debug, Clone, thiserror::Error)]
pub enum CropError {
    #[error("failed to decode source image: {0}")]
    Decode(Arc<ImageError>),

    #[error("failed to encode cropped image: {0}")]
    Encode(Arc<ImageError>),

    #[error("crop region has zero area")]
    EmptyRegion,

    #[error("crop region {rect} exceeds image bounds {width}x{height}")]
    OutOfBounds {
        rect: CropRect,
        width: u32,
        height: u32,
    },

    #[error("no crop region selected")]
    NothingSelected,

    #[error("crop materialization aborted")]
    Aborted,
}

/// 源图上的像素矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// 是否完全落在 `width` x `height` 的图片内
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// 裁剪框宽高比
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// 封面图使用的 16:9
    pub const HERO: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::HERO
    }
}

/// 当前裁剪选择：像素矩形和缩放倍数，只存在于客户端
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSelection {
    pub rect: CropRect,
    pub zoom: f64,
}

/// 待裁剪的源图
///
/// 构造时只读取图片头获取尺寸，完整解码推迟到 [`CropSource::materialize`]。
#[derive(Clone)]
pub struct CropSource {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl fmt::Debug for CropSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CropSource")
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl CropSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Result<Self, CropError> {
        let bytes = bytes.into();
        let (width, height) = ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(|e| CropError::Decode(Arc::new(ImageError::IoError(e))))?
            .into_dimensions()
            .map_err(|e| CropError::Decode(Arc::new(e)))?;

        if width == 0 || height == 0 {
            return Err(CropError::EmptyRegion);
        }

        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 检查矩形非空且不越界
    pub fn check(&self, rect: CropRect) -> Result<(), CropError> {
        if rect.is_empty() {
            return Err(CropError::EmptyRegion);
        }
        if !rect.fits_within(self.width, self.height) {
            return Err(CropError::OutOfBounds {
                rect,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// 解码源图，裁出 `rect` 并编码为 JPEG
    ///
    /// 解码失败时返回错误，不会产出空白图片。
    pub fn materialize(&self, rect: CropRect) -> Result<CroppedImage, CropError> {
        self.check(rect)?;

        let image = image::load_from_memory(&self.bytes).map_err(|e| CropError::Decode(Arc::new(e)))?;
        if !rect.fits_within(image.width(), image.height()) {
            return Err(CropError::OutOfBounds {
                rect,
                width: image.width(),
                height: image.height(),
            });
        }

        let cropped = image
            .crop_imm(rect.x, rect.y, rect.width, rect.height)
            .to_rgb8();

        let mut jpeg = Vec::new();
        cropped
            .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))
            .map_err(|e| CropError::Encode(Arc::new(e)))?;

        Ok(CroppedImage {
            rect,
            jpeg: jpeg.into(),
        })
    }
}

/// 裁剪后的 JPEG 图片
///
/// 预览和上传内容来自同一份字节，始终对应同一个裁剪区域。
#[derive(Clone, PartialEq, Eq)]
pub struct CroppedImage {
    rect: CropRect,
    jpeg: Arc<[u8]>,
}

impl fmt::Debug for CroppedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CroppedImage")
            .field("rect", &self.rect)
            .field("len", &self.jpeg.len())
            .finish()
    }
}

impl CroppedImage {
    pub const MIME: &'static str = "image/jpeg";

    /// 对应的裁剪区域
    pub fn rect(&self) -> CropRect {
        self.rect
    }

    /// JPEG 字节
    pub fn bytes(&self) -> &[u8] {
        &self.jpeg
    }

    /// 用于展示的 `data:` URL
    pub fn preview(&self) -> String {
        format!("data:{};base64,{}", Self::MIME, STANDARD.encode(&self.jpeg))
    }
}

/// 交互式裁剪器
///
/// 维护缩放倍数和裁剪框中心，每次调整后返回新的像素矩形。
/// 裁剪框是源图内符合宽高比的最大矩形按缩放倍数缩小后的结果。
#[derive(Debug, Clone)]
pub struct ImageCropper {
    source: CropSource,
    aspect: AspectRatio,
    zoom: f64,
    center: (f64, f64),
}

impl ImageCropper {
    /// 打开源图，裁剪框初始居中、不缩放
    pub fn open(bytes: impl Into<Arc<[u8]>>, aspect: AspectRatio) -> Result<Self, CropError> {
        let source = CropSource::new(bytes)?;
        let center = (
            f64::from(source.width) / 2.0,
            f64::from(source.height) / 2.0,
        );
        Ok(Self {
            source,
            aspect,
            zoom: MIN_ZOOM,
            center,
        })
    }

    pub fn source(&self) -> &CropSource {
        &self.source
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn selection(&self) -> CropSelection {
        CropSelection {
            rect: self.rect(),
            zoom: self.zoom,
        }
    }

    /// 设置缩放倍数，限制在 [`MIN_ZOOM`, `MAX_ZOOM`] 内
    pub fn set_zoom(&mut self, zoom: f64) -> CropRect {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
        self.settle()
    }

    /// 将裁剪框中心移动到源图坐标 `(x, y)`
    pub fn set_position(&mut self, x: f64, y: f64) -> CropRect {
        if x.is_finite() && y.is_finite() {
            self.center = (x, y);
        }
        self.settle()
    }

    /// 按像素平移裁剪框
    pub fn pan(&mut self, dx: f64, dy: f64) -> CropRect {
        let (x, y) = self.center;
        self.set_position(x + dx, y + dy)
    }

    /// 当前像素矩形
    pub fn rect(&self) -> CropRect {
        let width = f64::from(self.source.width);
        let height = f64::from(self.source.height);
        let ratio = self.aspect.ratio();

        let (base_w, base_h) = if width / height > ratio {
            (height * ratio, height)
        } else {
            (width, width / ratio)
        };

        let crop_w = (base_w / self.zoom).round().clamp(1.0, width);
        let crop_h = (base_h / self.zoom).round().clamp(1.0, height);

        let cx = self.center.0.clamp(crop_w / 2.0, width - crop_w / 2.0);
        let cy = self.center.1.clamp(crop_h / 2.0, height - crop_h / 2.0);

        let x = (cx - crop_w / 2.0).round().clamp(0.0, width - crop_w);
        let y = (cy - crop_h / 2.0).round().clamp(0.0, height - crop_h);

        CropRect::new(x as u32, y as u32, crop_w as u32, crop_h as u32)
    }

    /// 把中心收回到裁剪框实际所在位置，避免拖出边界后累积偏移
    fn settle(&mut self) -> CropRect {
        let rect = self.rect();
        self.center = (
            f64::from(rect.x) + f64::from(rect.width) / 2.0,
            f64::from(rect.y) + f64::from(rect.height) / 2.0,
        );
        rect
    }
}
