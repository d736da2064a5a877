use std::cmp::Ordering;

use candle_core::{shape::Dim, Tensor};

pub trait TensorExt {
  /// Center-crops or zero-pads `dim` to exactly `len` elements.
  ///
  /// The leading offset is `(larger - smaller) / 2`, any odd remainder goes to
  /// the trailing side.
  fn center_fit<D: Dim>(&self, dim: D, len: usize) -> Result<Self, candle_core::Error>
  where
    Self: Sized;

  /// Doubles `dim` by repeating every element (nearest upsampling).
  fn repeat_twice<D: Dim>(&self, dim: D) -> Result<Self, candle_core::Error>
  where
    Self: Sized;

  /// Doubles `dim` by linear interpolation with half-pixel centres.
  fn lerp_twice<D: Dim>(&self, dim: D) -> Result<Self, candle_core::Error>
  where
    Self: Sized;

  /// Every dimension after batch and channel.
  fn spatial_dims(&self) -> &[usize];
}

impl TensorExt for Tensor {
  fn center_fit<D: Dim>(&self, dim: D, len: usize) -> Result<Self, candle_core::Error> {
    let dim = dim.to_index(self.shape(), "center_fit")?;
    let size = self.dim(dim)?;

    match size.cmp(&len) {
      Ordering::Equal => Ok(self.clone()),
      Ordering::Greater => self.narrow(dim, (size - len) / 2, len),
      Ordering::Less => {
        let diff = len - size;
        self.pad_with_zeros(dim, diff / 2, diff - diff / 2)
      }
    }
  }

  fn repeat_twice<D: Dim>(&self, dim: D) -> Result<Self, candle_core::Error> {
    let dim = dim.to_index(self.shape(), "repeat_twice")?;
    interleave(self, self, dim)
  }

  fn lerp_twice<D: Dim>(&self, dim: D) -> Result<Self, candle_core::Error> {
    let dim = dim.to_index(self.shape(), "lerp_twice")?;
    let n = self.dim(dim)?;

    if n == 0 {
      return Err(candle_core::Error::Msg("cannot use lerp_twice on an empty dimension".to_owned()).bt());
    }

    let first = self.narrow(dim, 0, 1)?;
    let last = self.narrow(dim, n - 1, 1)?;

    let (prev, next) = if n > 1 {
      (
        Tensor::cat(&[&first, &self.narrow(dim, 0, n - 1)?], dim)?,
        Tensor::cat(&[&self.narrow(dim, 1, n - 1)?, &last], dim)?,
      )
    } else {
      (first, last)
    };

    let even = (prev.affine(0.25, 0.)? + self.affine(0.75, 0.)?)?;
    let odd = (self.affine(0.75, 0.)? + next.affine(0.25, 0.)?)?;

    interleave(&even, &odd, dim)
  }

  fn spatial_dims(&self) -> &[usize] {
    let dims = self.dims();
    &dims[dims.len().min(2)..]
  }
}

// a0 b0 a1 b1 ... along `dim`
fn interleave(a: &Tensor, b: &Tensor, dim: usize) -> Result<Tensor, candle_core::Error> {
  let mut merged = a.dims().to_vec();
  merged[dim] *= 2;

  Tensor::stack(&[a, b], dim + 1)?.reshape(merged)
}
