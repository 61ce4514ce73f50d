//! Reserved structural ("footprint") file names.
//!
//! Footprint files are always generated by the writer and can never be
//! supplied as payload. Matching is case-insensitive.

pub const MANIFEST_NAME: &str = "AppxManifest.xml";
pub const BLOCK_MAP_NAME: &str = "AppxBlockMap.xml";
pub const CONTENT_TYPES_NAME: &str = "[Content_Types].xml";
pub const SIGNATURE_NAME: &str = "AppxSignature.p7x";

/// Name prefixes reserved for package metadata.
const METADATA_PREFIXES: &[&str] = &["appxmetadata", "microsoft.system.package.metadata"];

/// Footprint entries appended after the payload, in container order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootprintFile {
    Manifest,
    BlockMap,
    ContentTypes,
}

impl FootprintFile {
    pub const CANONICAL_ORDER: [FootprintFile; 3] = [
        FootprintFile::Manifest,
        FootprintFile::BlockMap,
        FootprintFile::ContentTypes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FootprintFile::Manifest => MANIFEST_NAME,
            FootprintFile::BlockMap => BLOCK_MAP_NAME,
            FootprintFile::ContentTypes => CONTENT_TYPES_NAME,
        }
    }
}

/// Returns true when `name` is reserved for a footprint file.
///
/// Both `/` and `\` separators are accepted, so `AppxMetadata\CodeIntegrity.cat`
/// and `appxmetadata/x` are both reserved.
pub fn is_footprint_file(name: &str) -> bool {
    let normalized = name.trim_start_matches(['/', '\\']).to_lowercase();

    normalized == MANIFEST_NAME.to_lowercase()
        || normalized == SIGNATURE_NAME.to_lowercase()
        || normalized == CONTENT_TYPES_NAME.to_lowercase()
        || normalized == BLOCK_MAP_NAME.to_lowercase()
        || METADATA_PREFIXES
            .iter()
            .any(|prefix| normalized.starts_with(prefix))
}
