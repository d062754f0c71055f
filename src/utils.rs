//! # Utility Functions Module
//!
//! Small helpers for building encoder command lines.

/// Converts any iterable of displayable items into owned argument strings.
///
/// ```rust
/// use video_batch_optimizer::utils::to_string_vec;
///
/// let crf = 23;
/// let args = to_string_vec(["-crf", crf.to_string().as_str(), "-preset", "medium"]);
/// assert_eq!(args, vec!["-crf", "23", "-preset", "medium"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds a `Vec<String>` argument list from mixed literals and values.
///
/// All items must share one type, so numbers go through `to_string()` or
/// `format!` when mixed with string literals.
///
/// ```rust
/// use video_batch_optimizer::args;
///
/// let threads = 4.to_string();
/// let args = args!["-threads", threads.as_str(), "-y"];
/// assert_eq!(args, vec!["-threads", "4", "-y"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item),*])
    };
}

/// Path as an argument string; non-UTF-8 bytes are replaced
pub fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_to_string_vec_numbers() {
        assert_eq!(to_string_vec([18, 23]), vec!["18", "23"]);
    }

    #[test]
    fn test_to_string_vec_empty() {
        let result: Vec<String> = to_string_vec(Vec::<&str>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_args_macro() {
        let crf = 25.to_string();
        let result = args!["-c:v", "libx264", "-crf", crf.as_str(),];
        assert_eq!(result, vec!["-c:v", "libx264", "-crf", "25"]);
    }

    #[test]
    fn test_path_arg() {
        assert_eq!(path_arg(Path::new("/tmp/a b.mov")), "/tmp/a b.mov");
    }
}
