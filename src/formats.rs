//! Extension predicates for archive entries and archive files.
//!
//! Both checks look only at the name: the lowercased text after the last dot
//! of the final path component. Content sniffing happens later, in the image
//! decoder, where a mislabelled file surfaces as an unreadable image.

use crate::config::FormatsConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// Decides which names are convertible images and which are archives.
#[derive(Debug, Clone)]
pub struct FormatFilter {
    convertible: BTreeSet<String>,
    archives: BTreeSet<String>,
}

impl FormatFilter {
    pub fn new(config: &FormatsConfig) -> Self {
        Self {
            convertible: config.convertible.clone(),
            archives: config.archives.clone(),
        }
    }

    /// True iff the entry's extension is in the convertible raster set.
    pub fn is_convertible(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| self.convertible.contains(&ext))
    }

    /// True iff the file's extension marks it as a zip-like archive.
    pub fn is_archive(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| self.archives.contains(&ext))
    }
}

/// Lowercased extension of the last path component, if any.
///
/// Archive entry names always use `/`, but extracted paths may use the
/// platform separator, so both are split on.
pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> FormatFilter {
        FormatFilter::new(&FormatsConfig::default())
    }

    #[test]
    fn convertible_formats_match_case_insensitively() {
        let f = filter();
        for name in ["a.png", "b.PNG", "c.WebP", "d.bmp", "e.dib", "f.tif", "g.TIFF"] {
            assert!(f.is_convertible(name), "{name} should be convertible");
        }
    }

    #[test]
    fn other_formats_are_passthrough() {
        let f = filter();
        for name in ["a.jpg", "b.jpeg", "ComicInfo.xml", "notes.txt", "c.gif"] {
            assert!(!f.is_convertible(name), "{name} should not be convertible");
        }
    }

    #[test]
    fn names_without_extension_are_not_convertible() {
        let f = filter();
        assert!(!f.is_convertible("README"));
        assert!(!f.is_convertible("chapter1/"));
        assert!(!f.is_convertible(".png"));
        assert!(!f.is_convertible(""));
    }

    #[test]
    fn nested_entry_names_use_last_component() {
        let f = filter();
        assert!(f.is_convertible("chapter.1/page01.png"));
        assert!(!f.is_convertible("images.png/readme"));
        assert!(f.is_convertible(r"dir\page.webp"));
    }

    #[test]
    fn archive_extensions() {
        let f = filter();
        assert!(f.is_archive("Vol 01.cbz"));
        assert!(f.is_archive("/library/Vol 02.ZIP"));
        assert!(!f.is_archive("Vol 03.cbr"));
        assert!(!f.is_archive("cover.png"));
    }

    #[test]
    fn custom_convertible_set() {
        let config = FormatsConfig {
            convertible: ["gif".to_string()].into_iter().collect(),
            ..FormatsConfig::default()
        };
        let f = FormatFilter::new(&config);
        assert!(f.is_convertible("a.gif"));
        assert!(!f.is_convertible("a.png"));
    }

    #[test]
    fn extension_of_handles_multiple_dots() {
        assert_eq!(extension_of("page.01.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
    }
}
