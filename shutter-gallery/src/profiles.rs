use log::{info, warn};

use crate::{
    validate_image, DatabaseError, GalleryContext, GalleryError, PhotoData, PrimaryKey,
    ProfileData, UpsertProfile, Upload, DEFAULT_AVATAR,
};

pub struct ProfileManager {
    context: GalleryContext,
}

/// New values for a profile
#[derive(Debug)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<i64>,
    /// A new avatar. The current one is kept when this is [None].
    pub image: Option<Upload>,
}

impl ProfileManager {
    /// How many photos the profile page shows
    pub const RECENT_PHOTO_COUNT: i64 = 6;

    /// Avatars are stored in this directory of the media root
    const AVATAR_DIRECTORY: &'static str = "profiles";

    pub fn new(context: &GalleryContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn profile(&self, user_id: PrimaryKey) -> Result<ProfileData, DatabaseError> {
        self.context.database.profile_by_user(user_id).await
    }

    /// The most recent photos across all of the user's albums
    pub async fn recent_photos(&self, user_id: PrimaryKey) -> Result<Vec<PhotoData>, DatabaseError> {
        self.context
            .database
            .recent_photos_by_owner(user_id, Self::RECENT_PHOTO_COUNT)
            .await
    }

    /// Updates the profile of the user, creating it if it is somehow missing
    pub async fn update_profile(
        &self,
        user_id: PrimaryKey,
        update: ProfileUpdate,
    ) -> Result<ProfileData, GalleryError> {
        let storage = &self.context.storage;

        let (image, saved) = match update.image {
            Some(upload) => {
                validate_image(&upload.contents)?;

                let name = storage
                    .save(
                        Some(Self::AVATAR_DIRECTORY),
                        &upload.file_name,
                        &upload.contents,
                    )
                    .await?;

                (name.clone(), Some(name))
            }
            None => match self.profile(user_id).await {
                Ok(current) => (current.image, None),
                Err(DatabaseError::NotFound { .. }) => (DEFAULT_AVATAR.to_string(), None),
                Err(e) => return Err(e.into()),
            },
        };

        let upserted = self
            .context
            .database
            .upsert_profile(UpsertProfile {
                user_id,
                first_name: update.first_name,
                last_name: update.last_name,
                phone: update.phone,
                image,
            })
            .await;

        match upserted {
            Ok(profile) => {
                info!("Profile of user {} updated", user_id);
                Ok(profile)
            }
            Err(e) => {
                if let Some(name) = saved {
                    if let Err(cleanup) = storage.delete(&name).await {
                        warn!("Could not remove orphaned avatar {}: {}", name, cleanup)
                    }
                }

                Err(e.into())
            }
        }
    }

    /// The public URL of the avatar
    pub fn avatar_url(&self, profile: &ProfileData) -> String {
        self.context.storage.url(&profile.image)
    }
}
