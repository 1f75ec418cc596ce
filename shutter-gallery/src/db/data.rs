use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// The avatar every new profile starts out with, relative to the media root
pub const DEFAULT_AVATAR: &str = "profiles/default_user.png";

/// A shutter account
#[derive(Debug, Clone, FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    /// The argon2 hash of the password, never the password itself
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, stored in the session cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// Editable details about a user, exactly one per user
#[derive(Debug, Clone, FromRow)]
pub struct ProfileData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<i64>,
    /// Storage name of the avatar
    pub image: String,
}

impl ProfileData {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A named collection of photos
#[derive(Debug, Clone, FromRow)]
pub struct AlbumData {
    pub id: PrimaryKey,
    pub name: String,
    /// Set once when the album is created
    pub created_at: DateTime<Utc>,
    /// The user that created the album
    pub owner_id: PrimaryKey,
}

/// An uploaded image inside an album
#[derive(Debug, Clone, FromRow)]
pub struct PhotoData {
    pub id: PrimaryKey,
    /// Storage name of the image
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub album_id: PrimaryKey,
}
