//! Content-type attribution and the `[Content_Types].xml` document.

use std::collections::HashMap;

use crate::compression::CompressionOption;
use crate::error::PackResult;
use crate::xml::XmlWriter;

pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.ms-appx.manifest+xml";
pub const BLOCK_MAP_CONTENT_TYPE: &str = "application/vnd.ms-appx.blockmap+xml";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Built-in extension table: (extension, content type, compression).
const BUILTIN_CONTENT_TYPES: &[(&str, &str, CompressionOption)] = &[
    ("atom", "application/atom+xml", CompressionOption::Normal),
    ("appx", "application/vnd.ms-appx", CompressionOption::None),
    ("b64", "application/base64", CompressionOption::Normal),
    ("cab", "application/vnd.ms-cab-compressed", CompressionOption::None),
    ("css", "text/css", CompressionOption::Normal),
    ("dll", "application/x-msdownload", CompressionOption::Normal),
    ("doc", "application/msword", CompressionOption::Normal),
    ("exe", "application/x-msdownload", CompressionOption::Normal),
    ("gif", "image/gif", CompressionOption::None),
    ("gz", "application/x-gzip-compressed", CompressionOption::None),
    ("htm", "text/html", CompressionOption::Normal),
    ("html", "text/html", CompressionOption::Normal),
    ("ico", "image/vnd.microsoft.icon", CompressionOption::Normal),
    ("jpeg", "image/jpeg", CompressionOption::None),
    ("jpg", "image/jpeg", CompressionOption::None),
    ("js", "application/x-javascript", CompressionOption::Normal),
    ("json", "application/json", CompressionOption::Normal),
    ("mp3", "audio/mpeg", CompressionOption::None),
    ("mp4", "video/mp4", CompressionOption::None),
    ("msix", "application/vnd.ms-appx", CompressionOption::None),
    ("pdf", "application/pdf", CompressionOption::Normal),
    ("png", "image/png", CompressionOption::None),
    ("pri", "application/octet-stream", CompressionOption::Normal),
    ("svg", "image/svg+xml", CompressionOption::Normal),
    ("ttf", "application/x-font-ttf", CompressionOption::Normal),
    ("txt", "text/plain", CompressionOption::Normal),
    ("wav", "audio/wav", CompressionOption::Normal),
    ("winmd", "application/octet-stream", CompressionOption::Normal),
    ("xml", "text/xml", CompressionOption::Normal),
    ("zip", "application/x-zip-compressed", CompressionOption::None),
];

/// Content type and preferred compression for an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeInfo {
    pub content_type: String,
    pub compression: CompressionOption,
}

/// Immutable extension lookup table, injected into the writer.
#[derive(Debug, Clone)]
pub struct ContentTypeTable {
    entries: HashMap<String, ContentTypeInfo>,
}

impl Default for ContentTypeTable {
    fn default() -> Self {
        Self::from_entries(
            BUILTIN_CONTENT_TYPES
                .iter()
                .map(|(ext, content_type, compression)| (*ext, *content_type, *compression)),
        )
    }
}

impl ContentTypeTable {
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str, CompressionOption)>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(ext, content_type, compression)| {
                (
                    ext.to_lowercase(),
                    ContentTypeInfo {
                        content_type: content_type.to_string(),
                        compression,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Look up by extension (without the dot). Unknown extensions map to
    /// `application/octet-stream` with normal compression.
    pub fn lookup(&self, extension: &str) -> ContentTypeInfo {
        self.entries
            .get(&extension.to_lowercase())
            .cloned()
            .unwrap_or_else(|| ContentTypeInfo {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                compression: CompressionOption::Normal,
            })
    }

    pub fn lookup_name(&self, name: &str) -> ContentTypeInfo {
        self.lookup(extension_of(name).unwrap_or_default())
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension_of(name: &str) -> Option<&str> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(pos) if pos + 1 < file_name.len() => Some(&file_name[pos + 1..]),
        _ => None,
    }
}

/// Part name used in `Override` elements: leading `/`, forward slashes.
pub fn part_name(name: &str) -> String {
    format!("/{}", name.trim_start_matches(['/', '\\']).replace('\\', "/"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeEntry {
    Default {
        extension: String,
        content_type: String,
    },
    Override {
        part_name: String,
        content_type: String,
    },
}

/// What a call to [`ContentTypeTracker::add`] changed, so it can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Covered by an existing default; nothing was added.
    Existing,
    Default(String),
    Override(String),
}

#[derive(Debug, Default)]
pub struct ContentTypeTracker {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute `content_type` to `name`. The first content type seen for an
    /// extension becomes its default; a different one for the same extension
    /// is recorded as a per-file override.
    pub fn add(&mut self, name: &str, content_type: &str) -> Registration {
        let Some(extension) = extension_of(name).map(str::to_lowercase) else {
            return self.add_override(name, content_type);
        };

        let same_type = self
            .defaults
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, existing)| existing == content_type);

        match same_type {
            Some(true) => Registration::Existing,
            Some(false) => self.add_override(name, content_type),
            None => {
                self.defaults
                    .push((extension.clone(), content_type.to_string()));
                Registration::Default(extension)
            }
        }
    }

    pub fn add_override(&mut self, name: &str, content_type: &str) -> Registration {
        let part = part_name(name);
        self.overrides.push((part.clone(), content_type.to_string()));
        Registration::Override(part)
    }

    pub fn undo(&mut self, registration: Registration) {
        match registration {
            Registration::Existing => {}
            Registration::Default(ext) => self.defaults.retain(|(e, _)| *e != ext),
            Registration::Override(part) => {
                if let Some(pos) = self.overrides.iter().rposition(|(p, _)| *p == part) {
                    self.overrides.remove(pos);
                }
            }
        }
    }

    pub fn entries(&self) -> Vec<ContentTypeEntry> {
        let defaults = self
            .defaults
            .iter()
            .map(|(extension, content_type)| ContentTypeEntry::Default {
                extension: extension.clone(),
                content_type: content_type.clone(),
            });
        let overrides = self
            .overrides
            .iter()
            .map(|(part_name, content_type)| ContentTypeEntry::Override {
                part_name: part_name.clone(),
                content_type: content_type.clone(),
            });
        defaults.chain(overrides).collect()
    }

    pub fn to_xml(&self) -> PackResult<Vec<u8>> {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("Types")?;
        xml.add_attribute("xmlns", CONTENT_TYPES_NAMESPACE)?;

        for (extension, content_type) in &self.defaults {
            xml.start_element("Default")?;
            xml.add_attribute("Extension", extension)?;
            xml.add_attribute("ContentType", content_type)?;
            xml.close_element()?;
        }
        for (part_name, content_type) in &self.overrides {
            xml.start_element("Override")?;
            xml.add_attribute("PartName", part_name)?;
            xml.add_attribute("ContentType", content_type)?;
            xml.close_element()?;
        }

        xml.close_element()?;
        xml.finish()
    }
}
