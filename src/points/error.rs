use thiserror::Error;

///
/// All errors emitted while reading a point source.
///
/// - `FileNotFound`: When the point file does not exist
///     Parameters:
///     - `path`: The path which was missing
/// - `Io`: Any other failure to read the point source
///     Parameters:
///     - `path`: The path or name of the source
///     - `source`: The underlying io error
///
#[derive(Error, Debug)]
pub enum PointError {
    #[error("Failed to find file {}", .path)]
    FileNotFound { path: String },

    #[error("Failed to read points from {}: {}", .path, .source)]
    Io { path: String, source: std::io::Error },
}

impl PointError {
    ///
    /// Maps an io error on `path` into the matching variant, keeping "not found" distinct.
    ///
    pub fn from_io(path: &str, source: std::io::Error) -> PointError {
        match source.kind() {
            std::io::ErrorKind::NotFound => PointError::FileNotFound { path: path.to_owned() },
            _ => PointError::Io { path: path.to_owned(), source },
        }
    }
}
