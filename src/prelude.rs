pub(crate) type Result<T> = std::result::Result<T, crate::Error>;
