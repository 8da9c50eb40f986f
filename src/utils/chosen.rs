use super::first_str;
use crate::tree::Node;

/// Path part of a `/chosen` path property, without `:options`.
fn strip_options(path: &str) -> &str {
    match path.find(':') {
        Some(pos) => &path[..pos],
        None => path,
    }
}

impl Node {
    /// Get node /chosen
    #[inline]
    pub fn chosen(&self) -> Option<&Node> {
        self.find("/chosen")
    }

    /// Get /chosen/stdin-path
    pub fn chosen_stdin_path(&self) -> Option<&str> {
        let value = self.chosen()?.get_prop("stdin-path")?.value();
        first_str(value).map(strip_options)
    }

    /// Get /chosen/stdout-path
    pub fn chosen_stdout_path(&self) -> Option<&str> {
        let value = self.chosen()?.get_prop("stdout-path")?.value();
        first_str(value).map(strip_options)
    }
}
