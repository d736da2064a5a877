//! Channel-axis joins between graph branches.
//!
//! Spatial extents are reconciled first where the topology allows it; after
//! reconciliation every non-channel dimension has to agree.

use candle_core::Tensor;

use crate::{utils::TensorExt, Error, Result};

fn ensure_joinable(site: &'static str, lhs: &Tensor, rhs: &Tensor) -> Result<()> {
  let (l, r) = (lhs.dims(), rhs.dims());

  let compatible = l.len() == r.len()
    && l.len() > 2
    && l[0] == r[0]
    && lhs.spatial_dims() == rhs.spatial_dims();

  if compatible {
    Ok(())
  } else {
    Err(mismatch(site, lhs, rhs))
  }
}

fn mismatch(site: &'static str, lhs: &Tensor, rhs: &Tensor) -> Error {
  Error::ShapeMismatch {
    site,
    lhs: lhs.dims().iter().copied().collect(),
    rhs: rhs.dims().iter().copied().collect(),
  }
}

/// Concatenates without any reconciliation.
pub fn concat_exact(site: &'static str, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
  ensure_joinable(site, lhs, rhs)?;
  Ok(Tensor::cat(&[lhs, rhs], 1)?)
}

/// Fits `skip` to the spatial extent of `x` (center crop or zero pad), then
/// concatenates `[x, skip]`.
pub fn concat_fitted(site: &'static str, x: &Tensor, skip: &Tensor) -> Result<Tensor> {
  if x.rank() != skip.rank() {
    ensure_joinable(site, x, skip)?;
  }

  let mut fitted = skip.clone();
  for (dim, &len) in x.spatial_dims().iter().enumerate() {
    fitted = fitted.center_fit(dim + 2, len)?;
  }

  concat_exact(site, x, &fitted)
}

/// Center-crops every input to the smallest extent per spatial axis, then
/// concatenates them in order.
pub fn concat_cropped(site: &'static str, xs: &[Tensor]) -> Result<Tensor> {
  let Some(first) = xs.first() else {
    return Err(Error::config(format!("{site}: nothing to concatenate")));
  };

  if let Some(odd) = xs.iter().find(|x| x.rank() != first.rank() || x.rank() < 3) {
    return Err(mismatch(site, first, odd));
  }

  let mut target = first.spatial_dims().to_vec();
  for x in &xs[1..] {
    for (t, &s) in target.iter_mut().zip(x.spatial_dims()) {
      *t = (*t).min(s);
    }
  }

  let mut cropped = Vec::with_capacity(xs.len());
  for x in xs {
    let mut z = x.clone();
    for (dim, &len) in target.iter().enumerate() {
      z = z.center_fit(dim + 2, len)?;
    }
    cropped.push(z);
  }

  for z in &cropped[1..] {
    ensure_joinable(site, &cropped[0], z)?;
  }

  Ok(Tensor::cat(&cropped, 1)?)
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device, Tensor};

  use super::{concat_cropped, concat_exact, concat_fitted};
  use crate::Error;

  fn zeros(dims: &[usize]) -> Tensor {
    Tensor::zeros(dims, DType::F32, &Device::Cpu).unwrap()
  }

  #[test]
  fn fitted_crops_larger_skip() {
    let joined = concat_fitted("up", &zeros(&[1, 4, 30, 30]), &zeros(&[1, 2, 31, 32])).unwrap();
    assert_eq!(joined.dims(), &[1, 6, 30, 30]);
  }

  #[test]
  fn fitted_pads_smaller_skip() {
    let joined = concat_fitted("up", &zeros(&[1, 4, 8, 8]), &zeros(&[1, 4, 7, 6])).unwrap();
    assert_eq!(joined.dims(), &[1, 8, 8, 8]);
  }

  #[test]
  fn cropped_uses_smallest_extent_per_axis() {
    let joined = concat_cropped(
      "level",
      &[zeros(&[1, 2, 15, 16, 15]), zeros(&[1, 3, 16, 15, 16])],
    )
    .unwrap();

    assert_eq!(joined.dims(), &[1, 5, 15, 15, 15]);
  }

  #[test]
  fn exact_rejects_spatial_mismatch() {
    let err = concat_exact("concat_x", &zeros(&[1, 4, 8, 8]), &zeros(&[1, 1, 7, 8])).unwrap_err();

    match err {
      Error::ShapeMismatch { site, lhs, rhs } => {
        assert_eq!(site, "concat_x");
        assert_eq!(lhs.as_slice(), &[1, 4, 8, 8]);
        assert_eq!(rhs.as_slice(), &[1, 1, 7, 8]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn batch_mismatch_survives_reconciliation() {
    let err = concat_fitted("up", &zeros(&[2, 4, 8, 8]), &zeros(&[1, 4, 9, 9])).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let err = concat_cropped("level", &[zeros(&[1, 1, 4, 4, 4]), zeros(&[1, 1, 4, 4])]).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
  }
}
