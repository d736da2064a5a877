use crate::{Error, Result};

/// Fractions of the scaled width given to the three cascade branches of a
/// multi-resolution block.
pub const BRANCH_FRACTIONS: [f64; 3] = [0.167, 0.333, 0.5];

/// Branch widths of a multi-resolution block.
///
/// `total` is the width actually produced by the block. It generally differs
/// from the nominal width because every branch is truncated separately, and it
/// is the only width downstream consumers may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchWidths {
  pub w1: usize,
  pub w2: usize,
  pub w3: usize,
}

impl BranchWidths {
  /// `floor(alpha * nominal * fraction)` for each branch.
  pub fn new(nominal: usize, alpha: f64) -> Self {
    let scaled = alpha * nominal as f64;
    let [w1, w2, w3] = BRANCH_FRACTIONS.map(|fraction| (scaled * fraction).floor() as usize);

    Self { w1, w2, w3 }
  }

  /// Like [`BranchWidths::new`], rejecting non-positive inputs and any
  /// configuration that would leave a branch without channels.
  pub fn checked(nominal: usize, alpha: f64) -> Result<Self> {
    if nominal == 0 {
      return Err(Error::config("nominal width must be positive"));
    }

    if !(alpha.is_finite() && alpha > 0.) {
      return Err(Error::config(format!("alpha must be positive, got {alpha}")));
    }

    let widths = Self::new(nominal, alpha);

    if widths.as_array().contains(&0) {
      return Err(Error::config(format!(
        "nominal width {nominal} with alpha {alpha} gives a zero-width branch ({}, {}, {})",
        widths.w1, widths.w2, widths.w3
      )));
    }

    Ok(widths)
  }

  pub fn total(&self) -> usize {
    self.w1 + self.w2 + self.w3
  }

  pub fn as_array(&self) -> [usize; 3] {
    [self.w1, self.w2, self.w3]
  }
}

#[cfg(test)]
mod tests {
  use super::{BranchWidths, BRANCH_FRACTIONS};
  use crate::Error;

  #[test]
  fn truncates_each_branch_separately() {
    // 1.67 * 4 = 6.68 -> 1.11, 2.22, 3.34
    let widths = BranchWidths::new(4, 1.67);
    assert_eq!(widths.as_array(), [1, 2, 3]);
    assert_eq!(widths.total(), 6);

    assert_eq!(BranchWidths::new(8, 1.67).as_array(), [2, 4, 6]);
    assert_eq!(BranchWidths::new(16, 1.67).total(), 25);
    assert_eq!(BranchWidths::new(32, 1.67).total(), 51);
    assert_eq!(BranchWidths::new(256, 1.67).as_array(), [71, 142, 213]);
  }

  #[test]
  fn computed_total_drifts_from_nominal() {
    let widths = BranchWidths::new(100, 1.0);
    assert_eq!(widths.as_array(), [16, 33, 50]);
    assert_eq!(widths.total(), 99);
  }

  #[test]
  fn every_branch_is_the_floor_of_its_fraction() {
    for nominal in 1..200 {
      for alpha in [0.5, 1.0, 1.67, 2.0, 3.3] {
        let widths = BranchWidths::new(nominal, alpha);
        let scaled = alpha * nominal as f64;

        for (w, fraction) in widths.as_array().into_iter().zip(BRANCH_FRACTIONS) {
          assert_eq!(w, (scaled * fraction) as usize);
        }
        assert_eq!(widths.total(), widths.w1 + widths.w2 + widths.w3);
      }
    }
  }

  #[test]
  fn rejects_zero_width_branch() {
    // 1.0 * 1 * 0.167 truncates to nothing
    let err = BranchWidths::checked(1, 1.0).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    assert!(BranchWidths::checked(6, 1.0).is_ok());
  }

  #[test]
  fn rejects_non_positive_parameters() {
    assert!(BranchWidths::checked(0, 1.67).is_err());
    assert!(BranchWidths::checked(16, 0.).is_err());
    assert!(BranchWidths::checked(16, -1.).is_err());
    assert!(BranchWidths::checked(16, f64::NAN).is_err());
  }
}
