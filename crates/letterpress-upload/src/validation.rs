//! Upload preconditions and object key generation.
//!
//! Every check here runs before anything is signed: the content type must be
//! one of the accepted image types, the payload must be non-empty and within
//! the size limit, and delete keys must stay inside the upload prefix.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::UploadError;

/// Default upload size limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Prefix under which uploaded images are stored.
pub const UPLOAD_PREFIX: &str = "images/";

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];

/// An accepted image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/webp`
    Webp,
    /// `image/gif`
    Gif,
    /// `image/svg+xml`
    Svg,
}

impl ImageType {
    /// Match a content type, ignoring case and parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use letterpress_upload::validation::ImageType;
    ///
    /// assert_eq!(ImageType::from_content_type("IMAGE/PNG"), Some(ImageType::Png));
    /// assert_eq!(
    ///     ImageType::from_content_type("image/svg+xml; charset=utf-8"),
    ///     Some(ImageType::Svg)
    /// );
    /// assert_eq!(ImageType::from_content_type("application/pdf"), None);
    /// ```
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let parsed: mime::Mime = content_type.trim().parse().ok()?;
        match parsed.essence_str().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            "image/svg+xml" => Some(Self::Svg),
            _ => None,
        }
    }

    /// The canonical content type sent to the object store.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
        }
    }

    /// File extension used in generated object keys.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Validate a content type against [`ALLOWED_CONTENT_TYPES`].
///
/// # Errors
///
/// Returns [`UploadError::InvalidInput`] if the type is missing or not an accepted image type.
pub fn validate_content_type(content_type: Option<&str>) -> Result<ImageType, UploadError> {
    let content_type =
        content_type.ok_or_else(|| UploadError::invalid_input("Missing content type"))?;
    ImageType::from_content_type(content_type).ok_or_else(|| {
        UploadError::invalid_input(format!(
            "Invalid file type: {content_type}. Allowed types: {}",
            ALLOWED_CONTENT_TYPES.join(", ")
        ))
    })
}

/// Validate a payload size against `max_size`.
///
/// # Errors
///
/// Returns [`UploadError::InvalidInput`] if the payload is empty or larger than `max_size`.
pub fn validate_size(size: usize, max_size: usize) -> Result<(), UploadError> {
    if size == 0 {
        return Err(UploadError::invalid_input("No file provided"));
    }
    if size > max_size {
        return Err(UploadError::invalid_input(format!(
            "File too large: {size} bytes. Maximum size is {} MB",
            max_size / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Generate a fresh object key: `images/<unix-millis>-<8 hex>.<ext>`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use letterpress_upload::validation::{ImageType, generate_object_key};
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let key = generate_object_key(ImageType::Png, now);
/// assert!(key.starts_with("images/1704067200000-"));
/// assert!(key.ends_with(".png"));
/// ```
#[must_use]
pub fn generate_object_key(image_type: ImageType, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{UPLOAD_PREFIX}{}-{}.{}",
        now.timestamp_millis(),
        &suffix[..8],
        image_type.extension()
    )
}

/// Validate a key supplied for deletion.
///
/// Keys must be non-empty, relative, free of `..` segments and inside
/// [`UPLOAD_PREFIX`].
///
/// # Errors
///
/// Returns [`UploadError::InvalidInput`] describing the first violated rule.
pub fn validate_object_key(key: Option<&str>) -> Result<&str, UploadError> {
    let key = key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| UploadError::invalid_input("No key provided"))?;

    if key.starts_with('/') {
        return Err(UploadError::invalid_input("Key must not start with '/'"));
    }
    if key.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(UploadError::invalid_input(
            "Key must not contain relative path segments",
        ));
    }
    if !key.starts_with(UPLOAD_PREFIX) || key.len() == UPLOAD_PREFIX.len() {
        return Err(UploadError::invalid_input(format!(
            "Key must be under {UPLOAD_PREFIX}"
        )));
    }
    Ok(key)
}

/// Reduce a client-supplied file name to its final path component.
///
/// Returns `None` for names that are empty after trimming.
#[must_use]
pub fn sanitize_file_name(name: Option<&str>) -> Option<String> {
    let name = name?.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.chars().filter(|c| !c.is_control()).take(255).collect())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_should_accept_every_allowed_content_type() {
        for content_type in ALLOWED_CONTENT_TYPES {
            let image_type = validate_content_type(Some(content_type)).unwrap();
            assert_eq!(image_type.content_type(), content_type);
        }
    }

    #[test]
    fn test_should_reject_disallowed_content_types() {
        for content_type in ["application/pdf", "image/bmp", "text/html", "not a mime"] {
            let err = validate_content_type(Some(content_type)).unwrap_err();
            assert!(matches!(err, UploadError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_should_reject_missing_content_type() {
        assert!(matches!(
            validate_content_type(None),
            Err(UploadError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_should_ignore_content_type_parameters_and_case() {
        assert_eq!(
            ImageType::from_content_type("Image/JPEG; q=0.9"),
            Some(ImageType::Jpeg)
        );
    }

    #[test]
    fn test_should_enforce_size_limit() {
        assert!(validate_size(1, DEFAULT_MAX_UPLOAD_SIZE).is_ok());
        assert!(validate_size(DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_MAX_UPLOAD_SIZE).is_ok());

        let err = validate_size(DEFAULT_MAX_UPLOAD_SIZE + 1, DEFAULT_MAX_UPLOAD_SIZE).unwrap_err();
        assert!(err.to_string().contains("Maximum size is 10 MB"));
    }

    #[test]
    fn test_should_reject_empty_payload() {
        assert!(matches!(
            validate_size(0, DEFAULT_MAX_UPLOAD_SIZE),
            Err(UploadError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_should_generate_unique_keys_with_extension() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = generate_object_key(ImageType::Svg, now);
        let second = generate_object_key(ImageType::Svg, now);

        assert_ne!(first, second);
        assert!(first.starts_with("images/1704067200000-"));
        assert!(first.ends_with(".svg"));
        assert_eq!(first.len(), "images/1704067200000-".len() + 8 + ".svg".len());
        assert!(validate_object_key(Some(first.as_str())).is_ok());
    }

    #[test]
    fn test_should_validate_delete_keys() {
        assert_eq!(
            validate_object_key(Some(" images/a.png ")).unwrap(),
            "images/a.png"
        );
        assert!(validate_object_key(None).is_err());
        assert!(validate_object_key(Some("")).is_err());
        assert!(validate_object_key(Some("/images/a.png")).is_err());
        assert!(validate_object_key(Some("images/../secrets.txt")).is_err());
        assert!(validate_object_key(Some("other/a.png")).is_err());
        assert!(validate_object_key(Some("images/")).is_err());
    }

    #[test]
    fn test_should_sanitize_file_names() {
        assert_eq!(
            sanitize_file_name(Some("C:\\Users\\me\\cat.png")).as_deref(),
            Some("cat.png")
        );
        assert_eq!(
            sanitize_file_name(Some("../../etc/passwd")).as_deref(),
            Some("passwd")
        );
        assert_eq!(sanitize_file_name(Some("   ")), None);
        assert_eq!(sanitize_file_name(None), None);
    }
}
