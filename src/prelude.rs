use standard_error::StandardError;

pub type Result<T, E = StandardError> = core::result::Result<T, E>;
