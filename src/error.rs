use smallvec::SmallVec;

pub type Dims = SmallVec<[usize; 5]>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  /// Rejected while assembling a graph, before any parameter is created.
  #[error("invalid configuration: {0}")]
  Configuration(String),

  /// Two tensors met at a join with incompatible non-channel dimensions.
  #[error("shape mismatch at {site}: {lhs:?} vs {rhs:?}")]
  ShapeMismatch {
    site: &'static str,
    lhs: Dims,
    rhs: Dims,
  },

  #[error(transparent)]
  Tensor(#[from] candle_core::Error),
}

impl Error {
  pub(crate) fn config(msg: impl Into<String>) -> Self {
    Self::Configuration(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
