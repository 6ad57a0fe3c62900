//! Bounds-checked accessor reads.
//!
//! Every read goes through [`Accessor::read_bytes`], which validates the
//! accessor range against its buffer view and the view against its buffer
//! before handing out a slice.

use std::borrow::Cow;

use glam::Vec3;

use super::{Accessor, ComponentType, ElementFormat};
use crate::errors::{MorphError, Result};

impl Accessor {
    /// Byte distance between consecutive elements.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.view
            .and_then(|v| v.byte_stride)
            .unwrap_or_else(|| self.format.size())
    }

    /// Absolute byte offset of the first element inside its buffer.
    #[must_use]
    pub fn binding_offset(&self) -> Option<usize> {
        self.view?.byte_offset.checked_add(self.byte_offset)
    }

    /// Bytes spanned by the accessor inside its view, stride included.
    /// `None` when the span does not fit in `usize`.
    #[must_use]
    pub fn binding_size(&self) -> Option<usize> {
        match self.count {
            0 => Some(0),
            n => self
                .stride()
                .checked_mul(n as usize - 1)?
                .checked_add(self.format.size()),
        }
    }

    /// Size of the elements once compacted (no stride padding).
    #[inline]
    #[must_use]
    pub fn packed_size(&self) -> usize {
        self.format.size() * self.count as usize
    }

    /// Reads the accessor's elements as tightly packed bytes.
    ///
    /// Returns `Ok(None)` when the accessor has no buffer view. A tightly
    /// packed range is borrowed from the buffer, a strided one is compacted.
    pub fn read_bytes<'a>(&self, buffers: &'a [Vec<u8>]) -> Result<Option<Cow<'a, [u8]>>> {
        let Some(view) = self.view else {
            return Ok(None);
        };

        let buffer = buffers
            .get(view.buffer)
            .ok_or(MorphError::MissingBuffer { index: view.buffer })?;

        let view_end = view.byte_offset.checked_add(view.byte_length);
        let Some(view_end) = view_end.filter(|&end| end <= buffer.len()) else {
            return Err(MorphError::AccessorOutOfBounds {
                context: "buffer",
                offset: view.byte_offset,
                end: view_end.unwrap_or(usize::MAX),
                len: buffer.len(),
            });
        };

        let span_end = self
            .binding_size()
            .and_then(|span| self.byte_offset.checked_add(span));
        let Some(span_end) = span_end.filter(|&end| end <= view.byte_length) else {
            return Err(MorphError::AccessorOutOfBounds {
                context: "buffer view",
                offset: self.byte_offset,
                end: span_end.unwrap_or(usize::MAX),
                len: view.byte_length,
            });
        };

        // Both ranges are in bounds, so neither sum can overflow past here.
        let start = view.byte_offset + self.byte_offset;
        let span = span_end - self.byte_offset;
        debug_assert!(start + span <= view_end);
        let element = self.format.size();
        let stride = self.stride();

        if stride == element {
            return Ok(Some(Cow::Borrowed(&buffer[start..start + span])));
        }

        let mut packed = Vec::with_capacity(self.packed_size());
        for i in 0..self.count as usize {
            let at = start + i * stride;
            packed.extend_from_slice(&buffer[at..at + element]);
        }
        Ok(Some(Cow::Owned(packed)))
    }

    /// Reads the accessor as `Vec3` values.
    ///
    /// Returns `Ok(None)` when the accessor has no buffer view or its format
    /// cannot be expanded to three floats.
    pub fn read_vec3(&self, buffers: &[Vec<u8>]) -> Result<Option<Vec<Vec3>>> {
        let Some(bytes) = self.read_bytes(buffers)? else {
            return Ok(None);
        };
        Ok(decode_vec3(&bytes, self.format))
    }
}

/// Expands tightly packed elements to `Vec3`, following glTF normalization rules.
#[must_use]
pub fn decode_vec3(bytes: &[u8], format: ElementFormat) -> Option<Vec<Vec3>> {
    if !format.is_vec3_decodable() {
        return None;
    }

    let size = format.component_type.size();
    let read = |c: &[u8]| -> f32 {
        match format.component_type {
            ComponentType::F32 => bytemuck::pod_read_unaligned::<f32>(c),
            ComponentType::I8 => {
                let v = c[0] as i8;
                if format.normalized { (f32::from(v) / 127.0).max(-1.0) } else { f32::from(v) }
            }
            ComponentType::U8 => {
                if format.normalized { f32::from(c[0]) / 255.0 } else { f32::from(c[0]) }
            }
            ComponentType::I16 => {
                let v = bytemuck::pod_read_unaligned::<i16>(c);
                if format.normalized { (f32::from(v) / 32767.0).max(-1.0) } else { f32::from(v) }
            }
            ComponentType::U16 => {
                let v = bytemuck::pod_read_unaligned::<u16>(c);
                if format.normalized { f32::from(v) / 65535.0 } else { f32::from(v) }
            }
            ComponentType::U32 => unreachable!("rejected by is_vec3_decodable"),
        }
    };

    Some(
        bytes
            .chunks_exact(format.size())
            .map(|e| Vec3::new(read(&e[..size]), read(&e[size..2 * size]), read(&e[2 * size..])))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AccessorType, BufferView};

    fn view(byte_length: usize, byte_stride: Option<usize>) -> BufferView {
        BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length,
            byte_stride,
        }
    }

    #[test]
    fn packed_accessor_is_borrowed() {
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let buffers = vec![bytemuck::cast_slice(&data).to_vec()];
        let accessor = Accessor::packed(ElementFormat::FLOAT3, 2, view(24, None));

        let bytes = accessor.read_bytes(&buffers).unwrap().unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn strided_accessor_is_compacted() {
        // position xyz + one padding float per element
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0, 9.0];
        let buffers = vec![bytemuck::cast_slice(&data).to_vec()];
        let accessor = Accessor::packed(ElementFormat::FLOAT3, 2, view(32, Some(16)));

        assert_eq!(accessor.binding_size(), Some(28));
        assert_eq!(accessor.binding_offset(), Some(0));
        let values = accessor.read_vec3(&buffers).unwrap().unwrap();
        assert_eq!(values, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
    }

    #[test]
    fn out_of_bounds_view_is_rejected() {
        let buffers = vec![vec![0u8; 16]];
        let accessor = Accessor::packed(ElementFormat::FLOAT3, 2, view(24, None));
        assert!(matches!(
            accessor.read_bytes(&buffers),
            Err(MorphError::AccessorOutOfBounds { context: "buffer", .. })
        ));

        let accessor = Accessor::packed(ElementFormat::FLOAT3, 3, view(16, None));
        assert!(matches!(
            accessor.read_bytes(&buffers),
            Err(MorphError::AccessorOutOfBounds { context: "buffer view", .. })
        ));
    }

    #[test]
    fn overflowing_ranges_are_rejected() {
        let buffers = vec![vec![0u8; 16]];

        let mut far_view = view(8, None);
        far_view.byte_offset = usize::MAX - 4;
        let accessor = Accessor::packed(ElementFormat::FLOAT3, 1, far_view);
        assert!(matches!(
            accessor.read_bytes(&buffers),
            Err(MorphError::AccessorOutOfBounds { context: "buffer", end: usize::MAX, .. })
        ));

        let mut far_accessor = Accessor::packed(ElementFormat::FLOAT3, 1, view(16, None));
        far_accessor.byte_offset = usize::MAX - 4;
        assert_eq!(far_accessor.binding_offset(), None);
        assert!(matches!(
            far_accessor.read_bytes(&buffers),
            Err(MorphError::AccessorOutOfBounds { context: "buffer view", end: usize::MAX, .. })
        ));

        let huge_stride = Accessor::packed(ElementFormat::FLOAT3, u32::MAX, view(16, Some(usize::MAX / 2)));
        assert_eq!(huge_stride.binding_size(), None);
        assert!(matches!(
            huge_stride.read_bytes(&buffers),
            Err(MorphError::AccessorOutOfBounds { context: "buffer view", .. })
        ));
    }

    #[test]
    fn missing_view_reads_nothing() {
        let accessor = Accessor {
            format: ElementFormat::FLOAT3,
            count: 4,
            byte_offset: 0,
            view: None,
        };
        assert!(accessor.read_bytes(&[]).unwrap().is_none());
    }

    #[test]
    fn normalized_shorts_decode_to_unit_range() {
        let raw: [i16; 3] = [32767, -32768, 0];
        let format = ElementFormat {
            component_type: ComponentType::I16,
            accessor_type: AccessorType::Vec3,
            normalized: true,
        };
        let values = decode_vec3(bytemuck::cast_slice(&raw), format).unwrap();
        assert_eq!(values, vec![Vec3::new(1.0, -1.0, 0.0)]);
    }
}
