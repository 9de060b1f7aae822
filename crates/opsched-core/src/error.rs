use thiserror::Error;

/// Validation failures raised by the projector and the admission check.
///
/// Neither is recoverable by retrying; the caller has to supply
/// corrected inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
  #[error("unrecognized timezone id: {zone}")]
  InvalidTimezone { zone: String },

  #[error("invalid argument: {0}")]
  InvalidArgument(String)
}

impl ScheduleError {
  pub(crate) fn invalid(
    msg: impl Into<String>
  ) -> Self {
    Self::InvalidArgument(msg.into())
  }
}
