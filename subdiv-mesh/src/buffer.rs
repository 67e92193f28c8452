//! Typed, bounds-checked views over caller-owned buffers.
//!
//! A [`BufferView`] never owns the memory it reads. The application keeps its
//! arrays and hands the mesh a view that describes where the elements live:
//! a byte offset, a stride and an element count. The geometry of the view is
//! validated once, in [`BufferView::new()`], after which every read is a
//! plain unaligned [`bytemuck`] read.
//!
//! ## Example
//! ```
//! # use subdiv_mesh::BufferView;
//! // Positions padded to 16 bytes per vertex, as SIMD-friendly layouts do.
//! let padded: [f32; 8] = [0.0, 1.0, 2.0, 0.0, 3.0, 4.0, 5.0, 0.0];
//! let bytes = bytemuck::cast_slice(&padded);
//!
//! let positions = BufferView::<[f32; 3]>::new(bytes, 0, 16, 2).unwrap();
//! assert_eq!(positions.get(1), Some([3.0, 4.0, 5.0]));
//! assert_eq!(positions.get(2), None);
//! ```
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem::size_of;

use crate::{Error, Result};

/// A read-only view of `len` elements of type `T` spaced `stride` bytes apart,
/// starting `offset` bytes into a caller-owned byte slice.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a, T> {
    bytes: &'a [u8],
    offset: usize,
    stride: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod> BufferView<'a, T> {
    /// Creates a view and checks that every element lies inside `bytes`.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The memory the elements are read from.
    /// * `offset` - Byte offset of the first element.
    /// * `stride` - Distance in bytes between two consecutive elements. Must
    ///   be at least `size_of::<T>()`.
    /// * `len` - Number of elements.
    pub fn new(bytes: &'a [u8], offset: usize, stride: usize, len: usize) -> Result<Self> {
        let size = size_of::<T>();
        if stride < size {
            return Err(Error::InvalidBufferView(format!(
                "stride {} is smaller than the element size {}",
                stride, size
            )));
        }

        if 0 < len {
            let end = (len - 1)
                .checked_mul(stride)
                .and_then(|last| last.checked_add(offset))
                .and_then(|last| last.checked_add(size));
            match end {
                Some(end) if end <= bytes.len() => {}
                _ => {
                    return Err(Error::InvalidBufferView(format!(
                        "{} elements with stride {} at offset {} do not fit into {} bytes",
                        len,
                        stride,
                        offset,
                        bytes.len()
                    )))
                }
            }
        }

        Ok(Self {
            bytes,
            offset,
            stride,
            len,
            _marker: PhantomData,
        })
    }

    /// Creates a tightly packed view over a typed slice.
    pub fn from_slice(slice: &'a [T]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(slice),
            offset: 0,
            stride: size_of::<T>(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        0 == self.len
    }

    /// Returns the distance between two elements in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the byte offset of the first element.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the element at `index` or `None` if it is out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        if self.len <= index {
            return None;
        }
        let start = self.offset + index * self.stride;
        Some(bytemuck::pod_read_unaligned(
            &self.bytes[start..start + size_of::<T>()],
        ))
    }

    /// Returns an iterator over all elements of the view.
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let view = *self;
        (0..view.len).filter_map(move |index| view.get(index))
    }

    /// Returns the number of interpolation slots needed to cover one record
    /// of this view with an evaluation engine of `width` float lanes.
    #[inline]
    pub fn slot_count(&self, width: usize) -> usize {
        slot_count(self.stride, width)
    }

    /// Returns a source for the float lanes of interpolation slot `slot`.
    pub fn slot_source(&self, slot: usize, width: usize) -> Result<SlotSource<'a>> {
        let slots = self.slot_count(width);
        if slots <= slot {
            return Err(Error::SlotOutOfRange { slot, slots });
        }

        let first_lane = slot * width;
        let lane_count = (self.stride / 4).saturating_sub(first_lane).min(width);

        Ok(SlotSource {
            bytes: self.bytes,
            offset: self.offset,
            stride: self.stride,
            len: self.len,
            first_lane,
            lane_count,
        })
    }
}

/// Number of slots of `width` float lanes needed to cover `stride` bytes.
#[inline]
pub fn slot_count(stride: usize, width: usize) -> usize {
    stride.div_ceil(4 * width)
}

/// The float lanes one interpolation slot covers in every record of a
/// buffer.
///
/// Lanes that lie past the end of the underlying memory (the padding of the
/// last record) read as zero.
#[derive(Debug, Clone, Copy)]
pub struct SlotSource<'a> {
    bytes: &'a [u8],
    offset: usize,
    stride: usize,
    len: usize,
    first_lane: usize,
    lane_count: usize,
}

impl<'a> SlotSource<'a> {
    /// Returns the number of records (vertices) in the source.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        0 == self.len
    }

    /// Returns the index of the first float lane of the slot.
    #[inline]
    pub fn first_lane(&self) -> usize {
        self.first_lane
    }

    /// Returns the number of float lanes carrying data in this slot.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Reads the slot lanes of record `vertex` into `out`.
    ///
    /// `out` must hold at least [`lane_count()`](Self::lane_count) floats;
    /// entries past that are set to zero.
    pub fn read(&self, vertex: usize, out: &mut [f32]) -> Result<()> {
        Error::check_index(vertex, self.len)?;
        if out.len() < self.lane_count {
            return Err(Error::InvalidBufferSize {
                expected: self.lane_count,
                actual: out.len(),
            });
        }

        let record = self.offset + vertex * self.stride;
        for (lane, value) in out.iter_mut().enumerate() {
            *value = if lane < self.lane_count {
                let start = record + 4 * (self.first_lane + lane);
                self.bytes
                    .get(start..start + 4)
                    .map(bytemuck::pod_read_unaligned::<f32>)
                    .unwrap_or(0.0)
            } else {
                0.0
            };
        }
        Ok(())
    }
}
