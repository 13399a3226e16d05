//! Display helpers for record-backed views

/// Shown in place of the date when a history title is missing.
pub const DATA_ERROR_PLACEHOLDER: &str = "数据错误";
/// Shown in place of the season when a history title is missing.
pub const SEASON_PLACEHOLDER: &str = "o(*≧▽≦)ツ";

const SEASON_CHARS: usize = 3;

/// A history title split into its date and season parts,
/// e.g. `"2024年10月 第三季"` becomes `"2024年10月 "` and `"第三季"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTitle {
    pub date: String,
    pub season: String,
}

impl HistoryTitle {
    /// Splits off the last three characters as the season.
    pub fn split(title: Option<&str>) -> Self {
        let title = match title {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                return Self {
                    date: DATA_ERROR_PLACEHOLDER.to_string(),
                    season: SEASON_PLACEHOLDER.to_string(),
                }
            }
        };

        let len = title.chars().count();
        let cut = len.saturating_sub(SEASON_CHARS);
        let byte_cut = title
            .char_indices()
            .nth(cut)
            .map(|(i, _)| i)
            .unwrap_or(title.len());

        Self {
            date: title[..byte_cut].to_string(),
            season: title[byte_cut..].to_string(),
        }
    }
}

/// `(title, url)` to open a play page with, if both are present.
pub fn play_target<'a>(title: Option<&'a str>, url: Option<&'a str>) -> Option<(&'a str, &'a str)> {
    match (title, url) {
        (Some(t), Some(u)) if !t.trim().is_empty() && !u.trim().is_empty() => Some((t, u)),
        _ => None,
    }
}
