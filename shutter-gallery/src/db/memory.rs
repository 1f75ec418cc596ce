use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    AlbumData, AlbumRepository, DatabaseError, NewAlbum, NewPhoto, NewSession, NewUser,
    PhotoData, PhotoRepository, PrimaryKey, ProfileData, ProfileRepository, Result, SessionData,
    SessionRepository, UpsertProfile, UserData, UserRepository, DEFAULT_AVATAR,
};

/// An in-process database, used for tests and for running without postgres.
///
/// Every operation holds the lock for its whole duration, so multi-step
/// writes are atomic.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<UserData>,
    sessions: Vec<SessionRecord>,
    profiles: Vec<ProfileData>,
    albums: Vec<AlbumData>,
    photos: Vec<PhotoData>,
    sequences: Sequences,
}

struct SessionRecord {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Sequences {
    user: PrimaryKey,
    session: PrimaryKey,
    profile: PrimaryKey,
    album: PrimaryKey,
    photo: PrimaryKey,
}

fn next(sequence: &mut PrimaryKey) -> PrimaryKey {
    *sequence += 1;
    *sequence
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

fn newest_first(photos: &mut [PhotoData]) {
    photos.sort_by_key(|p| Reverse((p.created_at, p.id)));
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(not_found("user", "id"))
    }

    fn session(&self, token: &str) -> Result<SessionData> {
        let now = Utc::now();

        let record = self
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .ok_or(not_found("session", "token"))?;

        Ok(SessionData {
            id: record.id,
            token: record.token.clone(),
            expires_at: record.expires_at,
            user: self.user(record.user_id)?.clone(),
        })
    }

    fn album(&self, album_id: PrimaryKey) -> Result<&AlbumData> {
        self.albums
            .iter()
            .find(|a| a.id == album_id)
            .ok_or(not_found("album", "id"))
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id).cloned()
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(not_found("user", "username"))
    }

    async fn create_user_with_profile(
        &self,
        new_user: NewUser,
    ) -> Result<(UserData, ProfileData)> {
        let mut state = self.state.lock();

        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        let user = UserData {
            id: next(&mut state.sequences.user),
            username: new_user.username,
            password: new_user.password,
            created_at: Utc::now(),
        };

        let profile = ProfileData {
            id: next(&mut state.sequences.profile),
            user_id: user.id,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            image: DEFAULT_AVATAR.to_string(),
        };

        state.users.push(user.clone());
        state.profiles.push(profile.clone());

        Ok((user, profile))
    }
}

#[async_trait]
impl SessionRepository for MemoryDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state.lock().session(token)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();

        if state.sessions.iter().any(|s| s.token == new_session.token) {
            return Err(DatabaseError::Conflict {
                resource: "session",
                field: "token",
                value: new_session.token,
            });
        }

        let session = SessionData {
            id: next(&mut state.sequences.session),
            token: new_session.token,
            expires_at: new_session.expires_at,
            user: state.user(new_session.user_id)?.clone(),
        };

        state.sessions.push(SessionRecord {
            id: session.id,
            token: session.token.clone(),
            user_id: session.user.id,
            expires_at: session.expires_at,
        });

        Ok(session)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.sessions.len();

        state.sessions.retain(|s| s.token != token);

        if state.sessions.len() == before {
            return Err(not_found("session", "token"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|s| s.expires_at > now);

        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryDatabase {
    async fn profile_by_user(&self, user_id: PrimaryKey) -> Result<ProfileData> {
        self.state
            .lock()
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(not_found("profile", "user_id"))
    }

    async fn upsert_profile(&self, profile: UpsertProfile) -> Result<ProfileData> {
        let mut state = self.state.lock();
        state.user(profile.user_id)?;

        if let Some(existing) = state
            .profiles
            .iter_mut()
            .find(|p| p.user_id == profile.user_id)
        {
            existing.first_name = profile.first_name;
            existing.last_name = profile.last_name;
            existing.phone = profile.phone;
            existing.image = profile.image;

            return Ok(existing.clone());
        }

        let created = ProfileData {
            id: next(&mut state.sequences.profile),
            user_id: profile.user_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone: profile.phone,
            image: profile.image,
        };

        state.profiles.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl AlbumRepository for MemoryDatabase {
    async fn album_by_id(&self, album_id: PrimaryKey) -> Result<AlbumData> {
        self.state.lock().album(album_id).cloned()
    }

    async fn list_albums_by_owner(&self, owner_id: PrimaryKey) -> Result<Vec<AlbumData>> {
        let mut albums: Vec<_> = self
            .state
            .lock()
            .albums
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();

        albums.sort_by_key(|a| Reverse((a.created_at, a.id)));
        Ok(albums)
    }

    async fn create_album(&self, new_album: NewAlbum) -> Result<AlbumData> {
        let mut state = self.state.lock();
        state.user(new_album.owner_id)?;

        let album = AlbumData {
            id: next(&mut state.sequences.album),
            name: new_album.name,
            created_at: Utc::now(),
            owner_id: new_album.owner_id,
        };

        state.albums.push(album.clone());
        Ok(album)
    }

    async fn rename_album(&self, album_id: PrimaryKey, name: &str) -> Result<AlbumData> {
        let mut state = self.state.lock();

        let album = state
            .albums
            .iter_mut()
            .find(|a| a.id == album_id)
            .ok_or(not_found("album", "id"))?;

        album.name = name.to_string();
        Ok(album.clone())
    }

    async fn delete_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>> {
        let mut state = self.state.lock();
        state.album(album_id)?;

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.photos)
            .into_iter()
            .partition(|p| p.album_id == album_id);

        state.photos = kept;
        state.albums.retain(|a| a.id != album_id);

        Ok(removed)
    }
}

#[async_trait]
impl PhotoRepository for MemoryDatabase {
    async fn list_photos_by_album(&self, album_id: PrimaryKey) -> Result<Vec<PhotoData>> {
        let mut photos: Vec<_> = self
            .state
            .lock()
            .photos
            .iter()
            .filter(|p| p.album_id == album_id)
            .cloned()
            .collect();

        newest_first(&mut photos);
        Ok(photos)
    }

    async fn cover_photos(&self, album_ids: &[PrimaryKey]) -> Result<Vec<PhotoData>> {
        let mut photos: Vec<_> = self
            .state
            .lock()
            .photos
            .iter()
            .filter(|p| album_ids.contains(&p.album_id))
            .cloned()
            .collect();

        newest_first(&mut photos);

        let mut covers: Vec<PhotoData> = Vec::new();
        for photo in photos {
            if !covers.iter().any(|c| c.album_id == photo.album_id) {
                covers.push(photo);
            }
        }

        Ok(covers)
    }

    async fn recent_photos_by_owner(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<PhotoData>> {
        let state = self.state.lock();

        let owned: Vec<_> = state
            .albums
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.id)
            .collect();

        let mut photos: Vec<_> = state
            .photos
            .iter()
            .filter(|p| owned.contains(&p.album_id))
            .cloned()
            .collect();

        newest_first(&mut photos);
        photos.truncate(limit.max(0) as usize);

        Ok(photos)
    }

    async fn count_photos_by_album(&self, album_id: PrimaryKey) -> Result<i64> {
        let count = self
            .state
            .lock()
            .photos
            .iter()
            .filter(|p| p.album_id == album_id)
            .count();

        Ok(count as i64)
    }

    async fn create_photo(&self, new_photo: NewPhoto) -> Result<PhotoData> {
        let mut state = self.state.lock();
        state.album(new_photo.album_id)?;

        let photo = PhotoData {
            id: next(&mut state.sequences.photo),
            image: new_photo.image,
            created_at: Utc::now(),
            album_id: new_photo.album_id,
        };

        state.photos.push(photo.clone());
        Ok(photo)
    }
}
