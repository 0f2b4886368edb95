pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;

pub const EMAIL_MAX_LENGTH: usize = 255;
pub const NAME_MAX_LENGTH: usize = 150;

pub const TITLE_MAX_LENGTH: usize = 255;
pub const LINK_MAX_LENGTH: usize = 255;
pub const LABEL_MAX_LENGTH: usize = 255;

/// NUMERIC(5, 2)
pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Raw token length in bytes; the wire form is hex encoded.
pub const TOKEN_BYTES: usize = 20;

pub const JSON_BODY_LIMIT: u64 = 64 * 1024;
pub const IMAGE_UPLOAD_LIMIT: u64 = 10 * 1024 * 1024;

pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

/// Accepted upload extensions and the image format each must contain.
pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "jpeg"),
    ("jpeg", "jpeg"),
    ("png", "png"),
    ("gif", "gif"),
    ("webp", "webp"),
];
