//! Dense fixed-width integer tensors
//!
//! A [`Tensor`] has a compile-time rank and runtime extents, validated once at
//! construction. Storage is a single row-major `Vec<T>`; the last axis is
//! contiguous.
//!
//! Out-of-bounds indexing through `Index`/`IndexMut` is a caller contract
//! violation and panics immediately. Use [`Tensor::get`] for a checked read.

use crate::error::{Result, TileError};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Fixed-width two's-complement integer stored in a tensor
pub trait Element:
    Copy + Default + PartialEq + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Bit width of the hardware word
    const BITS: u32;

    /// Two's-complement bit pattern, zero-extended into a `u64`
    fn to_bits(self) -> u64;

    /// Value from the low `BITS` bits of `bits`
    fn from_bits(bits: u64) -> Self;

    /// Widened signed value
    fn to_i64(self) -> i64;
}

macro_rules! impl_element {
    ($($t:ty => $u:ty),* $(,)?) => {
        $(
            impl Element for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn to_bits(self) -> u64 {
                    u64::from(self as $u)
                }

                #[inline]
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                fn from_bits(bits: u64) -> Self {
                    bits as $u as $t
                }

                #[inline]
                fn to_i64(self) -> i64 {
                    i64::from(self)
                }
            }
        )*
    };
}

impl_element!(i8 => u8, i16 => u16, i32 => u32);

/// Input feature map: padded-Y × padded-X × input channel
pub type Ifmap = Tensor<i16, 3>;

/// Weights: filter-Y × filter-X × input channel × output channel
pub type Weights = Tensor<i16, 4>;

/// Output feature map: Y × X × output channel
pub type Ofmap = Tensor<i32, 3>;

/// Rank-`R` dense tensor of `T`
#[derive(Clone, PartialEq, Eq)]
pub struct Tensor<T, const R: usize> {
    extents: [usize; R],
    strides: [usize; R],
    data: Vec<T>,
}

impl<T: Element, const R: usize> Tensor<T, R> {
    /// Zero-filled tensor
    ///
    /// # Errors
    ///
    /// Returns error if any extent is zero or the element count overflows.
    pub fn zeros(extents: [usize; R]) -> Result<Self> {
        let len = checked_len(&extents)?;
        Ok(Self {
            extents,
            strides: row_major_strides(&extents),
            data: vec![T::default(); len],
        })
    }

    /// Tensor over existing row-major data
    ///
    /// # Errors
    ///
    /// Returns error if the extents are invalid or `data` has the wrong length.
    pub fn from_vec(extents: [usize; R], data: Vec<T>) -> Result<Self> {
        let len = checked_len(&extents)?;
        if data.len() != len {
            return Err(TileError::invalid_tensor(format!(
                "{} elements supplied for extents {:?} ({} required)",
                data.len(),
                extents,
                len
            )));
        }
        Ok(Self {
            extents,
            strides: row_major_strides(&extents),
            data,
        })
    }

    /// Tensor whose element at each index is `f(index)`
    ///
    /// # Errors
    ///
    /// Returns error if any extent is zero or the element count overflows.
    pub fn from_fn(extents: [usize; R], mut f: impl FnMut([usize; R]) -> T) -> Result<Self> {
        checked_len(&extents)?;
        let data = Indices::new(extents).map(&mut f).collect();
        Ok(Self {
            extents,
            strides: row_major_strides(&extents),
            data,
        })
    }

    /// Extent along each axis
    #[inline]
    pub const fn extents(&self) -> [usize; R] {
        self.extents
    }

    /// Total number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: extents are positive
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checked read
    #[inline]
    pub fn get(&self, index: [usize; R]) -> Option<T> {
        self.offset(index).map(|o| self.data[o])
    }

    /// Checked mutable access
    #[inline]
    pub fn get_mut(&mut self, index: [usize; R]) -> Option<&mut T> {
        self.offset(index).map(move |o| &mut self.data[o])
    }

    /// Row-major element storage
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major element storage
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Row-major iterator over every valid index
    pub fn indices(&self) -> Indices<R> {
        Indices::new(self.extents)
    }

    /// Row-major storage offset of `index`
    #[inline]
    pub(crate) fn offset(&self, index: [usize; R]) -> Option<usize> {
        let mut offset = 0;
        for axis in 0..R {
            if index[axis] >= self.extents[axis] {
                return None;
            }
            offset += index[axis] * self.strides[axis];
        }
        Some(offset)
    }

    #[cold]
    #[inline(never)]
    fn out_of_bounds(&self, index: [usize; R]) -> ! {
        panic!(
            "tensor index {index:?} out of bounds for extents {:?}",
            self.extents
        )
    }
}

impl<T: Element, const R: usize> Index<[usize; R]> for Tensor<T, R> {
    type Output = T;

    #[inline]
    fn index(&self, index: [usize; R]) -> &T {
        match self.offset(index) {
            Some(o) => &self.data[o],
            None => self.out_of_bounds(index),
        }
    }
}

impl<T: Element, const R: usize> IndexMut<[usize; R]> for Tensor<T, R> {
    #[inline]
    fn index_mut(&mut self, index: [usize; R]) -> &mut T {
        match self.offset(index) {
            Some(o) => &mut self.data[o],
            None => self.out_of_bounds(index),
        }
    }
}

impl<T: Element, const R: usize> fmt::Debug for Tensor<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("extents", &self.extents)
            .field("bits", &T::BITS)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Row-major index iterator
#[derive(Debug, Clone)]
pub struct Indices<const R: usize> {
    extents: [usize; R],
    next: Option<[usize; R]>,
}

impl<const R: usize> Indices<R> {
    /// Iterate every index inside `extents`
    pub fn new(extents: [usize; R]) -> Self {
        let next = if extents.contains(&0) {
            None
        } else {
            Some([0; R])
        };
        Self { extents, next }
    }
}

impl<const R: usize> Iterator for Indices<R> {
    type Item = [usize; R];

    fn next(&mut self) -> Option<[usize; R]> {
        let current = self.next?;
        let mut idx = current;
        let mut axis = R;
        self.next = loop {
            if axis == 0 {
                break None;
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < self.extents[axis] {
                break Some(idx);
            }
            idx[axis] = 0;
        };
        Some(current)
    }
}

fn checked_len<const R: usize>(extents: &[usize; R]) -> Result<usize> {
    if extents.contains(&0) {
        return Err(TileError::invalid_tensor(format!(
            "extents {extents:?} contain a zero axis"
        )));
    }
    extents.iter().try_fold(1usize, |acc, &e| {
        acc.checked_mul(e).ok_or_else(|| {
            TileError::invalid_tensor(format!("extents {extents:?} overflow element count"))
        })
    })
}

fn row_major_strides<const R: usize>(extents: &[usize; R]) -> [usize; R] {
    let mut strides = [1; R];
    for axis in (0..R.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * extents[axis + 1];
    }
    strides
}
