use log::{info, warn};

use crate::{
    validate_image, AlbumData, DatabaseError, GalleryContext, GalleryError, NewAlbum, NewPhoto,
    PhotoData, PrimaryKey, Upload,
};

pub type AlbumId = PrimaryKey;

/// An album as it appears in a listing, with the photo shown on its cover
#[derive(Debug, Clone)]
pub struct AlbumSummary {
    pub album: AlbumData,
    /// The most recent photo of the album
    pub cover: Option<PhotoData>,
}

pub struct AlbumManager {
    context: GalleryContext,
}

impl AlbumManager {
    pub fn new(context: &GalleryContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Lists the albums of a user, most recent first, each with its cover photo
    pub async fn list_for_owner(
        &self,
        owner_id: PrimaryKey,
    ) -> Result<Vec<AlbumSummary>, DatabaseError> {
        let db = &self.context.database;

        let albums = db.list_albums_by_owner(owner_id).await?;
        let ids: Vec<_> = albums.iter().map(|a| a.id).collect();
        let mut covers = db.cover_photos(&ids).await?;

        let summaries = albums
            .into_iter()
            .map(|album| {
                let cover = covers
                    .iter()
                    .position(|c| c.album_id == album.id)
                    .map(|index| covers.swap_remove(index));

                AlbumSummary { album, cover }
            })
            .collect();

        Ok(summaries)
    }

    /// Creates a new album
    pub async fn create_album(
        &self,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<AlbumData, DatabaseError> {
        let album = self
            .context
            .database
            .create_album(NewAlbum {
                name: name.to_string(),
                owner_id,
            })
            .await?;

        info!("Album {} created by user {}", album.id, owner_id);
        Ok(album)
    }

    /// Returns the album if it belongs to the user.
    /// Albums of other users are reported as missing.
    pub async fn album_for_owner(
        &self,
        album_id: AlbumId,
        owner_id: PrimaryKey,
    ) -> Result<AlbumData, DatabaseError> {
        let album = self.context.database.album_by_id(album_id).await?;

        if album.owner_id != owner_id {
            return Err(DatabaseError::NotFound {
                resource: "album",
                identifier: "id",
            });
        }

        Ok(album)
    }

    /// Photos of the album, most recent first
    pub async fn photos(&self, album: &AlbumData) -> Result<Vec<PhotoData>, DatabaseError> {
        self.context.database.list_photos_by_album(album.id).await
    }

    pub async fn photo_count(&self, album: &AlbumData) -> Result<i64, DatabaseError> {
        self.context.database.count_photos_by_album(album.id).await
    }

    /// Stores an uploaded image and adds it to the album
    pub async fn upload_photo(
        &self,
        album: &AlbumData,
        upload: Upload,
    ) -> Result<PhotoData, GalleryError> {
        validate_image(&upload.contents)?;

        let storage = &self.context.storage;
        let name = storage
            .save(None, &upload.file_name, &upload.contents)
            .await?;

        let created = self
            .context
            .database
            .create_photo(NewPhoto {
                image: name.clone(),
                album_id: album.id,
            })
            .await;

        match created {
            Ok(photo) => {
                info!("Photo {} added to album {}", name, album.id);
                Ok(photo)
            }
            Err(e) => {
                if let Err(cleanup) = storage.delete(&name).await {
                    warn!("Could not remove orphaned upload {}: {}", name, cleanup)
                }

                Err(e.into())
            }
        }
    }

    /// Renames an album owned by the user
    pub async fn rename_album(
        &self,
        album_id: AlbumId,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<AlbumData, DatabaseError> {
        let album = self.album_for_owner(album_id, owner_id).await?;

        self.context.database.rename_album(album.id, name).await
    }

    /// Deletes an album owned by the user along with all of its photos,
    /// returning how many photos were removed
    pub async fn delete_album(
        &self,
        album_id: AlbumId,
        owner_id: PrimaryKey,
    ) -> Result<usize, DatabaseError> {
        let album = self.album_for_owner(album_id, owner_id).await?;
        let photos = self.context.database.delete_album(album.id).await?;

        for photo in &photos {
            if let Err(e) = self.context.storage.delete(&photo.image).await {
                warn!("Could not remove {} from storage: {}", photo.image, e)
            }
        }

        info!("Album {} deleted with {} photos", album.id, photos.len());
        Ok(photos.len())
    }

    /// The public URL of a photo
    pub fn photo_url(&self, photo: &PhotoData) -> String {
        self.context.storage.url(&photo.image)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        storage::tests::png, testing::gallery_with_user, AlbumRepository, StorageError,
    };

    use super::*;

    fn upload(name: &str, contents: Vec<u8>) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            contents,
        }
    }

    #[tokio::test]
    async fn listing_only_contains_own_albums() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let bob = fixture.user("bob").await;
        let albums = &fixture.gallery.albums;

        albums.create_album(alice.id, "Trip").await.unwrap();
        albums.create_album(bob.id, "Secret").await.unwrap();
        albums.create_album(alice.id, "Home").await.unwrap();

        let names: Vec<_> = albums
            .list_for_owner(alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.album.name)
            .collect();

        assert_eq!(names, vec!["Home", "Trip"]);
    }

    #[tokio::test]
    async fn cover_is_the_most_recent_photo() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let albums = &fixture.gallery.albums;

        let trip = albums.create_album(alice.id, "Trip").await.unwrap();
        let empty = albums.create_album(alice.id, "Empty").await.unwrap();

        albums.upload_photo(&trip, upload("first.png", png())).await.unwrap();
        let newest = albums
            .upload_photo(&trip, upload("second.png", png()))
            .await
            .unwrap();

        let summaries = albums.list_for_owner(alice.id).await.unwrap();
        let trip_summary = summaries.iter().find(|s| s.album.id == trip.id).unwrap();
        let empty_summary = summaries.iter().find(|s| s.album.id == empty.id).unwrap();

        assert_eq!(trip_summary.cover.as_ref().unwrap().id, newest.id);
        assert!(empty_summary.cover.is_none());
    }

    #[tokio::test]
    async fn upload_adds_exactly_one_photo() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let albums = &fixture.gallery.albums;
        let trip = albums.create_album(alice.id, "Trip").await.unwrap();

        let photo = albums
            .upload_photo(&trip, upload("beach.png", png()))
            .await
            .unwrap();

        assert_eq!(albums.photo_count(&trip).await.unwrap(), 1);
        assert_eq!(albums.photo_url(&photo), "/media/beach.png");
        assert!(fixture.storage.contains("beach.png"));
    }

    #[tokio::test]
    async fn invalid_upload_changes_nothing() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let albums = &fixture.gallery.albums;
        let trip = albums.create_album(alice.id, "Trip").await.unwrap();

        let result = albums
            .upload_photo(&trip, upload("video.mp4", b"not an image".to_vec()))
            .await;

        assert!(matches!(
            result,
            Err(GalleryError::Storage(StorageError::InvalidImage))
        ));
        assert_eq!(albums.photo_count(&trip).await.unwrap(), 0);
        assert!(fixture.storage.is_empty());
    }

    #[tokio::test]
    async fn other_users_albums_are_missing() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let bob = fixture.user("bob").await;
        let albums = &fixture.gallery.albums;
        let trip = albums.create_album(alice.id, "Trip").await.unwrap();

        assert!(albums
            .album_for_owner(trip.id, bob.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(albums
            .rename_album(trip.id, bob.id, "Mine now")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(albums
            .delete_album(trip.id, bob.id)
            .await
            .unwrap_err()
            .is_not_found());

        assert_eq!(
            albums.album_for_owner(trip.id, alice.id).await.unwrap().name,
            "Trip"
        );
    }

    #[tokio::test]
    async fn rename_keeps_creation_time() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let albums = &fixture.gallery.albums;
        let trip = albums.create_album(alice.id, "Trip").await.unwrap();

        let renamed = albums
            .rename_album(trip.id, alice.id, "Road trip")
            .await
            .unwrap();

        assert_eq!(renamed.name, "Road trip");
        assert_eq!(renamed.created_at, trip.created_at);
    }

    #[tokio::test]
    async fn delete_removes_album_photos_and_files() {
        let (fixture, alice) = gallery_with_user("alice").await;
        let albums = &fixture.gallery.albums;
        let trip = albums.create_album(alice.id, "Trip").await.unwrap();

        for name in ["a.png", "b.png", "c.png"] {
            albums.upload_photo(&trip, upload(name, png())).await.unwrap();
        }

        let removed = albums.delete_album(trip.id, alice.id).await.unwrap();

        assert_eq!(removed, 3);
        assert!(fixture.storage.is_empty());
        assert!(fixture
            .database
            .album_by_id(trip.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
