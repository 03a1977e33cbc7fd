use serde_json::Value;

use crate::config::coerce_integer;
use crate::error::ConfigError;
use crate::services::UserOptions;

pub const THUMB_SIZE_OPTION: &str = "thumbsize";
pub const THUMB_LIMITS_SETTING: &str = "ThumbLimits";
pub const DEFAULT_THUMB_LIMITS: [u32; 6] = [120, 150, 180, 200, 250, 300];

/// Thumbnail width in pixels: `explicit` when given, else the default size.
///
/// The default `thumbsize` option is a key into `limits`, which may be a list
/// (key read as an ordinal) or a table keyed by name.
pub fn resolve_width(
    explicit: Option<u32>,
    options: &dyn UserOptions,
    limits: Option<&Value>,
) -> Result<u32, ConfigError> {
    if let Some(width) = explicit {
        return Ok(width);
    }

    let key = options
        .default_option(THUMB_SIZE_OPTION)
        .ok_or_else(|| ConfigError::UnsetUserOption {
            option: THUMB_SIZE_OPTION.to_string(),
        })?;
    let key = key.trim();

    let missing = || ConfigError::MissingThumbSize {
        key: key.to_string(),
    };
    let value = match limits {
        None => {
            let index: usize = key.parse().map_err(|_| missing())?;
            return DEFAULT_THUMB_LIMITS.get(index).copied().ok_or_else(missing);
        }
        Some(Value::Array(sizes)) => {
            let index: usize = key.parse().map_err(|_| missing())?;
            sizes.get(index).ok_or_else(missing)?
        }
        Some(Value::Object(sizes)) => sizes.get(key).ok_or_else(missing)?,
        Some(_) => {
            return Err(ConfigError::InvalidSetting {
                name: THUMB_LIMITS_SETTING.to_string(),
                expected: "a list or table of pixel widths",
            });
        }
    };

    coerce_integer(value)
        .and_then(|width| u32::try_from(width).ok())
        .ok_or_else(|| ConfigError::InvalidSetting {
            name: THUMB_LIMITS_SETTING.to_string(),
            expected: "non-negative pixel widths",
        })
}
