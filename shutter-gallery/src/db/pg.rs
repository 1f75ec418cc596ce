use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError, FromRow, PgPool,
};

use crate::{
    AlbumData, AlbumRepository, DatabaseError, DatabaseResult, IntoDatabaseError, NewAlbum,
    NewPhoto, NewSession, NewUser, PhotoData, PhotoRepository, PrimaryKey, ProfileData,
    ProfileRepository, Result, SessionData, SessionRepository, UpsertProfile, UserData,
    UserRepository, DEFAULT_AVATAR,
};

/// A postgres database implementation for shutter
pub struct PgDatabase {
    pool: PgPool,
}

/// A session joined with its user
#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    username: String,
    password: String,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                created_at: row.created_at,
            },
        }
    }
}

impl PgDatabase {
    /// Connects to the database and applies pending migrations
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl UserRepository for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user_with_profile(
        &self,
        new_user: NewUser,
    ) -> Result<(UserData, ProfileData)> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let user = query_as::<_, UserData>(
            "INSERT INTO users (username, password) VALUES ($1, $2) RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let profile = query_as::<_, ProfileData>(
            "INSERT INTO profiles (user_id, image) VALUES ($1, $2) RETURNING *",
        )
        .bind(user.id)
        .bind(DEFAULT_AVATAR)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok((user, profile))
    }
}

#[async_trait]
impl SessionRepository for PgDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        query_as::<_, SessionRow>(
            "SELECT
                sessions.id,
                sessions.token,
                sessions.expires_at,
                sessions.user_id,
                users.username,
                users.password,
                users.created_at
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "token"))
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

#[async_trait]
impl ProfileRepository for PgDatabase {
    async fn profile_by_user(&self, user_id: PrimaryKey) -> Result<ProfileData> {
        query_as::<_, ProfileData>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("profile", "user_id"))
    }

    async fn upsert_profile(&self, profile: UpsertProfile) -> Result<ProfileData> {
        query_as::<_, ProfileData>(
            "INSERT INTO profiles (user_id, first_name, last_name, phone, image)
                VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                phone = EXCLUDED.phone,
                image = EXCLUDED.image
            RETURNING *",
        )
        .bind(profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.phone)
        .bind(&profile.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }
}

#[async_trait]
impl AlbumRepository for PgDatabase {
    async fn album_by_id(&self, album_id: PrimaryKey) -> Result<AlbumData> {
        query_as::<_, AlbumData>("SELECT * FROM albums WHERE id = $1")
            .bind(album_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("album", "id"))
    }

    async fn list_albums_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<AlbumData>> {
        query_as::<_, AlbumData>(
            "SELECT * FROM albums WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_album(&self, new_album: NewAlbum) -> Result<AlbumData> {
        query_as::<_, AlbumData>("INSERT INTO albums (name, owner_id) VALUES ($1, $2) RETURNING *")
            .bind(&new_album.name)
            .bind(new_album.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn rename_album(&self, album_id: PrimaryKey, name: &str) -> Result<AlbumData> {
        query_as::<_, AlbumData>("UPDATE albums SET name = $1 WHERE id = $2 RETURNING *")
            .bind(name)
            .bind(album_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("album", "id"))
    }

    async fn delete_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        // Ensure album exists
        query("SELECT id FROM albums WHERE id = $1 FOR UPDATE")
            .bind(album_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| e.not_found_or("album", "id"))?;

        let photos = query_as::<_, PhotoData>("DELETE FROM photos WHERE album_id = $1 RETURNING *")
            .bind(album_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("DELETE FROM albums WHERE id = $1")
            .bind(album_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        Ok(photos)
    }
}

#[async_trait]
impl PhotoRepository for PgDatabase {
    async fn list_photos_by_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>> {
        query_as::<_, PhotoData>(
            "SELECT * FROM photos WHERE album_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn cover_photos(&self, album_ids: &[PrimaryKey]) -> Result<Vec<PhotoData>> {
        query_as::<_, PhotoData>(
            "SELECT DISTINCT ON (album_id) * FROM photos
            WHERE album_id = ANY($1)
            ORDER BY album_id, created_at DESC, id DESC",
        )
        .bind(album_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn recent_photos_by_owner(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<PhotoData>> {
        query_as::<_, PhotoData>(
            "SELECT photos.* FROM photos
                INNER JOIN albums ON photos.album_id = albums.id
            WHERE albums.owner_id = $1
            ORDER BY photos.created_at DESC, photos.id DESC
            LIMIT $2",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn count_photos_by_album(&self, album_id: PrimaryKey) -> Result<i64> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM photos WHERE album_id = $1")
            .bind(album_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_photo(&self, new_photo: NewPhoto) -> Result<PhotoData> {
        // Ensure album exists
        let _ = self.album_by_id(new_photo.album_id).await?;

        query_as::<_, PhotoData>("INSERT INTO photos (image, album_id) VALUES ($1, $2) RETURNING *")
            .bind(&new_photo.image)
            .bind(new_photo.album_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
