//! All values handed to templates and JSON responses are defined here
//! along with the conversions from gallery data

use chrono::{DateTime, Utc};
use serde::Serialize;
use shutter_gallery::{AlbumData, AlbumSummary, MediaStorage, PhotoData, ProfileData};

#[derive(Debug, Serialize)]
pub struct Album {
    id: i32,
    name: String,
    created_at: String,
    cover_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Photo {
    id: i32,
    url: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    full_name: String,
    first_name: String,
    last_name: String,
    phone: Option<i64>,
    avatar_url: String,
}

/// Answer to a photo upload
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Helper trait to convert gallery data into its serialized version.
/// Media URLs are resolved through the storage.
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self, media: &dyn MediaStorage) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self, media: &dyn MediaStorage) -> Vec<O> {
        self.iter().map(|x| x.to_serialized(media)).collect()
    }
}

fn display_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%B %-d, %Y").to_string()
}

impl ToSerialized<Album> for AlbumData {
    fn to_serialized(&self, _media: &dyn MediaStorage) -> Album {
        Album {
            id: self.id,
            name: self.name.clone(),
            created_at: display_date(&self.created_at),
            cover_url: None,
        }
    }
}

impl ToSerialized<Album> for AlbumSummary {
    fn to_serialized(&self, media: &dyn MediaStorage) -> Album {
        Album {
            cover_url: self.cover.as_ref().map(|c| media.url(&c.image)),
            ..self.album.to_serialized(media)
        }
    }
}

impl ToSerialized<Photo> for PhotoData {
    fn to_serialized(&self, media: &dyn MediaStorage) -> Photo {
        Photo {
            id: self.id,
            url: media.url(&self.image),
            created_at: display_date(&self.created_at),
        }
    }
}

impl ToSerialized<Profile> for ProfileData {
    fn to_serialized(&self, media: &dyn MediaStorage) -> Profile {
        Profile {
            full_name: self.full_name(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone,
            avatar_url: media.url(&self.image),
        }
    }
}
