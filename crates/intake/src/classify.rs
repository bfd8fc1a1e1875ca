//! Extension to category mapping.

use tagdrop_config::{Category, Config, normalize_extension};

/// Maps file extensions to category names.
///
/// Categories are checked in their configured order and the first one
/// listing the extension wins. Lookups are case-insensitive and tolerate a
/// leading dot.
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<Category>,
    default: String,
}
impl Classifier {
    pub fn new(categories: impl IntoIterator<Item = Category>, default: impl Into<String>) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| Category::new(c.name, c.extensions.iter().map(|e| normalize_extension(e))))
            .collect();
        Self { categories, default: default.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.categories.iter().cloned(), config.default_category.clone())
    }

    /// Returns the category for `extension`, or the default category.
    ///
    /// ```
    /// use tagdrop_config::Category;
    /// use tagdrop_intake::Classifier;
    /// let classifier = Classifier::new([Category::new("images", ["jpg", "png"])], "other");
    /// assert_eq!(classifier.category_for("JPG"), "images");
    /// assert_eq!(classifier.category_for(".png"), "images");
    /// assert_eq!(classifier.category_for("exe"), "other");
    /// ```
    pub fn category_for(&self, extension: &str) -> &str {
        let extension = normalize_extension(extension);
        self.categories
            .iter()
            .find(|c| c.extensions.iter().any(|e| *e == extension))
            .map_or(self.default.as_str(), |c| c.name.as_str())
    }
}
