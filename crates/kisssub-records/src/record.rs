//! Record data structure

use serde::{Deserialize, Serialize};

/// Whether a record renders with a cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    #[default]
    NoImage,
    WithImage,
}

impl RecordType {
    pub fn as_i32(&self) -> i32 {
        match self {
            RecordType::NoImage => 0,
            RecordType::WithImage => 1,
        }
    }

    /// Unknown values fall back to `NoImage`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => RecordType::WithImage,
            _ => RecordType::NoImage,
        }
    }
}

/// A persisted content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Assigned by the store on insert
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RecordType,
    pub category: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    /// Cover image URL
    pub cover: Option<String>,
    /// Subtitle group descriptor
    pub sub: Option<String>,
    /// Human readable size, e.g. "1.2GB"
    pub size: Option<String>,
    /// Source page URL
    pub url: Option<String>,
    pub desc: Option<String>,
    pub magnet: Option<String>,
}

impl Record {
    /// Cover URL, or `fallback` when the record has none.
    pub fn cover_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.cover.as_deref() {
            Some(cover) if !cover.trim().is_empty() => cover,
            _ => fallback,
        }
    }

    /// Keyword used to search for more releases of this entry.
    ///
    /// Anime cards are only clickable when they carry a title.
    pub fn search_keyword(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }

    pub fn has_cover(&self) -> bool {
        self.kind == RecordType::WithImage
    }
}

/// A record that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(rename = "type")]
    pub kind: RecordType,
    pub category: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub cover: Option<String>,
    pub sub: Option<String>,
    pub size: Option<String>,
    pub url: Option<String>,
    pub desc: Option<String>,
    pub magnet: Option<String>,
}

impl NewRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self.kind = RecordType::WithImage;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_magnet(mut self, magnet: impl Into<String>) -> Self {
        self.magnet = Some(magnet.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn into_record(self, id: i64) -> Record {
        Record {
            id,
            kind: self.kind,
            category: self.category,
            title: self.title,
            date: self.date,
            cover: self.cover,
            sub: self.sub,
            size: self.size,
            url: self.url,
            desc: self.desc,
            magnet: self.magnet,
        }
    }
}
