/// Extension based categorization of file names.
///
/// A [`CategoryMap`] maps lower-cased file extensions to the name of the
/// category subdirectory a file should be moved into. Extensions that are not
/// mapped, and names without an extension, fall back to the default category.
///
/// # Examples
///
/// ```
/// use autosort::file_category::CategoryMap;
///
/// let map = CategoryMap::default();
/// assert_eq!(map.classify("photo.png"), "Images");
/// assert_eq!(map.classify("PHOTO.JPG"), "Images");
/// assert_eq!(map.classify("notes.xyz"), "Misc");
/// assert_eq!(map.classify("README"), "Misc");
/// ```
use crate::config::ConfigError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Category used when an extension is not mapped.
pub const DEFAULT_CATEGORY: &str = "Misc";

/// Built-in category table.
const STANDARD_CATEGORIES: &[(&str, &[&str])] = &[
    ("Images", &["png", "jpg", "jpeg", "gif"]),
    ("Docs", &["pdf", "docx", "txt", "xlsx"]),
    ("Music", &["mp3", "wav"]),
    ("Videos", &["mp4", "mkv", "avi"]),
    ("Others", &["rar", "zip"]),
    ("Programs", &["exe", "msi"]),
    ("DiskImages", &["iso", "img"]),
];

/// Read-only lookup from file extension to category name.
///
/// Every extension key maps to exactly one category. Lookups are
/// case-insensitive and a leading dot on a configured extension is ignored.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    extension_map: HashMap<String, String>,
    default_category: String,
}

impl CategoryMap {
    /// Creates a map with the built-in categories and [`DEFAULT_CATEGORY`].
    pub fn new() -> Self {
        let mut map = Self::empty(DEFAULT_CATEGORY);
        map.populate_standard_mappings();
        map
    }

    /// Creates a map with no extensions, so everything classifies as `default_category`.
    pub fn empty(default_category: &str) -> Self {
        Self {
            extension_map: HashMap::new(),
            default_category: default_category.to_string(),
        }
    }

    fn populate_standard_mappings(&mut self) {
        for (category, extensions) in STANDARD_CATEGORIES {
            for ext in *extensions {
                self.add_mapping(ext, category);
            }
        }
    }

    /// Builds a map from a `category -> [extensions]` table, as found in the
    /// `[categories]` section of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateExtension`] when one extension is listed
    /// under two categories, and [`ConfigError::InvalidSetting`] when a
    /// category name cannot be used as a directory name.
    pub fn from_table(
        table: &BTreeMap<String, Vec<String>>,
        default_category: &str,
    ) -> Result<Self, ConfigError> {
        validate_category_name(default_category)?;

        let mut map = Self::empty(default_category);
        for (category, extensions) in table {
            validate_category_name(category)?;
            for ext in extensions {
                let key = normalize_extension(ext);
                if let Some(first) = map.extension_map.get(&key)
                    && first != category
                {
                    return Err(ConfigError::DuplicateExtension {
                        extension: key,
                        first: first.clone(),
                        second: category.clone(),
                    });
                }
                map.extension_map.insert(key, category.clone());
            }
        }
        Ok(map)
    }

    /// Maps `ext` to `category`, replacing and returning any previous mapping.
    pub fn add_mapping(&mut self, ext: &str, category: &str) -> Option<String> {
        self.extension_map
            .insert(normalize_extension(ext), category.to_string())
    }

    /// Replaces the category used for unmapped extensions.
    pub fn with_default_category(mut self, category: &str) -> Self {
        self.default_category = category.to_string();
        self
    }

    /// Returns the category mapped to `ext`, if any.
    ///
    /// ```
    /// use autosort::file_category::CategoryMap;
    ///
    /// let map = CategoryMap::default();
    /// assert_eq!(map.category_for_extension("PDF"), Some("Docs"));
    /// assert_eq!(map.category_for_extension("xyz"), None);
    /// ```
    pub fn category_for_extension(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
    }

    /// Returns the category for a file name. Never fails.
    ///
    /// The extension is the text after the last `.`; a name that only starts
    /// with a dot (`.bashrc`) has none.
    pub fn classify(&self, file_name: &str) -> &str {
        Path::new(file_name)
            .extension()
            .and_then(|ext| self.category_for_extension(&ext.to_string_lossy()))
            .unwrap_or(self.default_category.as_str())
    }

    /// The category used for unmapped extensions.
    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// All category names, including the default one, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: BTreeSet<&str> = self.extension_map.values().map(String::as_str).collect();
        names.insert(self.default_category.as_str());
        names.into_iter().collect()
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Category names become directory names under the root.
fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\']);
    if invalid {
        return Err(ConfigError::InvalidSetting {
            field: "category".to_string(),
            reason: format!("'{}' is not a valid directory name", name),
        });
    }
    Ok(())
}
