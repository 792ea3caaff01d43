use std::fmt::Display;
use std::path::Path;

pub struct LogUgoira<'a>(pub &'a str);

impl<'a> Display for LogUgoira<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Ugoira: {}]", self.0)
    }
}

pub struct LogArchive<'a>(pub &'a Path);

impl<'a> Display for LogArchive<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.file_name() {
            Some(name) => write!(f, "[Archive: {}]", name.to_string_lossy()),
            None => write!(f, "[Archive: {}]", self.0.to_string_lossy()),
        }
    }
}

/// Keeps the tail of an encoder diagnostic short enough for one log record
pub struct LogTail<'a>(pub &'a str, pub usize);

impl<'a> Display for LogTail<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<&str> = self.0.lines().filter(|line| !line.trim().is_empty()).collect();
        let skip = lines.len().saturating_sub(self.1);
        for (i, line) in lines.iter().skip(skip).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, " | {}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        assert_eq!(LogUgoira("44298467").to_string(), "[Ugoira: 44298467]");
        assert_eq!(LogArchive(Path::new("/tmp/a/1_ugoira600x600.zip")).to_string(), "[Archive: 1_ugoira600x600.zip]");
    }

    #[test]
    fn tail_keeps_last_lines() {
        let text = "one\n\ntwo\nthree\n";
        assert_eq!(LogTail(text, 2).to_string(), " | two\n | three");
    }
}
