use std::fmt::Display;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileName {
    pub basename: String,
    pub extension: Option<String>,
}

impl FileName {
    pub fn new(basename: String, extension: Option<String>) -> FileName {
        FileName { basename, extension }
    }

    /// File name component of `path`, split into stem and extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<FileName> {
        let name = path.as_ref().file_name()?.to_string_lossy().to_string();
        Some(FileName::from(name))
    }

    pub fn with_extension(&self, extension: &str) -> FileName {
        FileName::new(self.basename.clone(), Some(extension.to_string()))
    }
}

impl<T> From<T> for FileName where T: Into<String> {
    fn from(name: T) -> Self {
        let name: String = name.into();
        match name.rsplit_once(".") {
            Some((pre, suf)) if !pre.is_empty() => FileName::new(pre.to_string(), Some(suf.to_string())),
            _ => FileName::new(name, None)
        }
    }
}

impl Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}.{}", self.basename, ext),
            None => write!(f, "{}", self.basename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FileName;

    #[test]
    fn splits_on_last_dot() {
        let name = FileName::from("44298467_ugoira600x600.zip");
        assert_eq!(name.basename, "44298467_ugoira600x600");
        assert_eq!(name.extension.as_deref(), Some("zip"));
        assert_eq!(name.with_extension("mkv").to_string(), "44298467_ugoira600x600.mkv");

        let archive = FileName::from("a.b.zip");
        assert_eq!(archive.basename, "a.b");
    }

    #[test]
    fn hidden_and_bare_names_have_no_extension() {
        assert_eq!(FileName::from(".json").extension, None);
        assert_eq!(FileName::from("frames").to_string(), "frames");
    }
}
