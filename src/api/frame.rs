use super::*;
use crate::com::*;

use num_traits::*;

use std::cmp;
use std::fmt;
use std::fmt::{Debug, Display};

////////////////////////////////////////////////////////////////////////////////////////////////////
pub trait CastFromPrimitive<T>: Copy + 'static {
    fn cast_from(v: T) -> Self;
}

macro_rules! impl_cast_from_primitive {
  ( $T:ty => $U:ty ) => {
    impl CastFromPrimitive<$U> for $T {
      #[inline(always)]
      fn cast_from(v: $U) -> Self { v as Self }
    }
  };
  ( $T:ty => { $( $U:ty ),* } ) => {
    $( impl_cast_from_primitive!($T => $U); )*
  };
}

// casts to { u8, u16 } are implemented separately using Pixel, so that the
// compiler understands that CastFromPrimitive<T: Pixel> is always implemented
impl_cast_from_primitive!(u8 => { u32, u64, usize });
impl_cast_from_primitive!(u8 => { i8, i16, i32, i64, isize });
impl_cast_from_primitive!(u16 => { u32, u64, usize });
impl_cast_from_primitive!(u16 => { i8, i16, i32, i64, isize });
impl_cast_from_primitive!(i32 => { u32, u64, usize });
impl_cast_from_primitive!(i32 => { i8, i16, i32, i64, isize });

pub trait Pixel:
    PrimInt
    + Into<u32>
    + Into<i32>
    + AsPrimitive<u8>
    + AsPrimitive<i16>
    + AsPrimitive<u16>
    + AsPrimitive<i32>
    + AsPrimitive<u32>
    + AsPrimitive<usize>
    + CastFromPrimitive<u8>
    + CastFromPrimitive<i16>
    + CastFromPrimitive<u16>
    + CastFromPrimitive<i32>
    + CastFromPrimitive<u32>
    + CastFromPrimitive<usize>
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

impl Pixel for u8 {}
impl Pixel for u16 {}

macro_rules! impl_cast_from_pixel_to_primitive {
    ( $T:ty ) => {
        impl<T: Pixel> CastFromPrimitive<T> for $T {
            #[inline(always)]
            fn cast_from(v: T) -> Self {
                v.as_()
            }
        }
    };
}

impl_cast_from_pixel_to_primitive!(u8);
impl_cast_from_pixel_to_primitive!(i16);
impl_cast_from_pixel_to_primitive!(u16);
impl_cast_from_pixel_to_primitive!(i32);
impl_cast_from_pixel_to_primitive!(u32);

#[inline(always)]
pub fn clip<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneConfig {
    // Data stride in samples.
    pub stride: usize,
    // Visible width in samples.
    pub width: usize,
    // Visible height in samples.
    pub height: usize,
    // log2 horizontal decimation relative to luma.
    pub xdec: usize,
    // log2 vertical decimation relative to luma.
    pub ydec: usize,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Plane<T: Pixel> {
    pub data: Vec<T>,
    pub cfg: PlaneConfig,
}

impl<T: Pixel> Debug for Plane<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plane {{ data: [{}; {}], cfg: {:?} }}",
            std::any::type_name::<T>(),
            self.data.len(),
            self.cfg
        )
    }
}

impl<T: Pixel> Plane<T> {
    pub fn new(width: usize, height: usize, xdec: usize, ydec: usize) -> Self {
        Plane {
            data: vec![T::zero(); width * height],
            cfg: PlaneConfig {
                stride: width,
                width,
                height,
                xdec,
                ydec,
            },
        }
    }

    #[inline]
    pub fn p(&self, x: usize, y: usize) -> T {
        self.data[y * self.cfg.stride + x]
    }

    /// Sample at `(x, y)` with the coordinates clamped to the plane.
    #[inline]
    pub fn clamped(&self, x: isize, y: isize) -> T {
        let x = clip(x, 0, self.cfg.width as isize - 1) as usize;
        let y = clip(y, 0, self.cfg.height as isize - 1) as usize;
        self.p(x, y)
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.cfg.stride;
        &self.data[start..start + self.cfg.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let start = y * self.cfg.stride;
        let width = self.cfg.width;
        &mut self.data[start..start + width]
    }

    pub fn copy_from_raw_u8(
        &mut self,
        source: &[u8],
        source_stride: usize,
        source_bytewidth: usize,
    ) {
        let stride = self.cfg.stride;
        let width = self.cfg.width;
        if stride == 0 || source_stride == 0 {
            return;
        }
        for (self_row, source_row) in self
            .data
            .chunks_mut(stride)
            .zip(source.chunks(source_stride))
        {
            if source_bytewidth == 1 {
                for (s, v) in self_row.iter_mut().take(width).zip(source_row) {
                    *s = T::cast_from(*v);
                }
            } else {
                for (s, v) in self_row
                    .iter_mut()
                    .take(width)
                    .zip(source_row.chunks(2))
                {
                    if v.len() == 2 {
                        *s = T::cast_from(u16::from_le_bytes([v[0], v[1]]));
                    }
                }
            }
        }
    }

    /// Doubles the resolution of the plane. Even samples are copied, odd
    /// samples are the rounded average of their neighbours.
    pub fn upsample(&self) -> Plane<T> {
        let w = self.cfg.width;
        let h = self.cfg.height;
        let mut up = Plane::new(w << 1, h << 1, self.cfg.xdec, self.cfg.ydec);
        if w == 0 || h == 0 {
            return up;
        }
        let ustride = up.cfg.stride;
        for y in 0..h {
            let r0 = self.row(y);
            let r1 = self.row(cmp::min(y + 1, h - 1));
            for x in 0..w {
                let x1 = cmp::min(x + 1, w - 1);
                let a: u32 = r0[x].into();
                let b: u32 = r0[x1].into();
                let c: u32 = r1[x].into();
                let d: u32 = r1[x1].into();
                let o = (y << 1) * ustride + (x << 1);
                up.data[o] = r0[x];
                up.data[o + 1] = T::cast_from((a + b + 1) >> 1);
                up.data[o + ustride] = T::cast_from((a + c + 1) >> 1);
                up.data[o + ustride + 1] = T::cast_from((a + b + c + d + 2) >> 2);
            }
        }
        up
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<T: Pixel> {
    pub planes: [Plane<T>; N_C],
    pub chroma_sampling: ChromaSampling,
}

impl<T: Pixel> Frame<T> {
    pub fn new(width: usize, height: usize, chroma_sampling: ChromaSampling) -> Self {
        let (xdec, ydec) = chroma_sampling.decimation();
        let (cw, ch) = if chroma_sampling == ChromaSampling::Cs400 {
            (0, 0)
        } else {
            (
                (width + (1 << xdec) - 1) >> xdec,
                (height + (1 << ydec) - 1) >> ydec,
            )
        };
        Frame {
            planes: [
                Plane::new(width, height, 0, 0),
                Plane::new(cw, ch, xdec, ydec),
                Plane::new(cw, ch, xdec, ydec),
            ],
            chroma_sampling,
        }
    }

    pub fn width(&self) -> usize {
        self.planes[Y_C].cfg.width
    }

    pub fn height(&self) -> usize {
        self.planes[Y_C].cfg.height
    }

    /// Number of planes carrying samples.
    pub fn nplanes(&self) -> usize {
        if self.chroma_sampling == ChromaSampling::Cs400 {
            1
        } else {
            N_C
        }
    }

    /// Builds the 2x upsampled frame the estimator uses as a reference.
    pub fn upsample(&self) -> Frame<T> {
        Frame {
            planes: [
                self.planes[Y_C].upsample(),
                self.planes[U_C].upsample(),
                self.planes[V_C].upsample(),
            ],
            chroma_sampling: self.chroma_sampling,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plane_upsample_keeps_even_samples() {
        let mut p: Plane<u8> = Plane::new(3, 2, 0, 0);
        p.data.copy_from_slice(&[10, 20, 30, 40, 50, 60]);
        let up = p.upsample();
        assert_eq!(up.cfg.width, 6);
        assert_eq!(up.cfg.height, 4);
        assert_eq!(up.row(0), &[10, 15, 20, 25, 30, 30][..]);
        assert_eq!(up.row(1), &[25, 30, 35, 40, 45, 45][..]);
        assert_eq!(up.row(2), &[40, 45, 50, 55, 60, 60][..]);
        assert_eq!(up.row(3), &[40, 45, 50, 55, 60, 60][..]);
    }

    #[test]
    fn clamped_reads_edges() {
        let mut p: Plane<u16> = Plane::new(2, 2, 0, 0);
        p.data.copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(p.clamped(-5, -5), 1);
        assert_eq!(p.clamped(7, 0), 2);
        assert_eq!(p.clamped(1, 9), 4);
    }

    #[test]
    fn frame_chroma_geometry() {
        let f: Frame<u8> = Frame::new(33, 17, ChromaSampling::Cs420);
        assert_eq!(f.planes[U_C].cfg.width, 17);
        assert_eq!(f.planes[U_C].cfg.height, 9);
        assert_eq!(f.nplanes(), 3);
        let m: Frame<u8> = Frame::new(16, 16, ChromaSampling::Cs400);
        assert_eq!(m.nplanes(), 1);
        assert_eq!(m.planes[V_C].data.len(), 0);
    }

    #[test]
    fn copy_from_raw_u8_high_depth() {
        let mut p: Plane<u16> = Plane::new(2, 1, 0, 0);
        p.copy_from_raw_u8(&[0x01, 0x02, 0xff, 0x03], 4, 2);
        assert_eq!(p.data, vec![0x0201, 0x03ff]);
    }
}
