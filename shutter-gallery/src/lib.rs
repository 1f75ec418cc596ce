mod albums;
mod auth;
mod contact;
mod db;
mod mail;
mod profiles;
mod storage;
mod util;

use std::sync::Arc;

use thiserror::Error;

pub use albums::*;
pub use auth::*;
pub use contact::*;
pub use db::*;
pub use mail::*;
pub use profiles::*;
pub use storage::*;

/// The shutter gallery, facilitating accounts, albums, profiles, and contact messages.
pub struct Gallery {
    context: GalleryContext,

    pub auth: Auth,
    pub albums: AlbumManager,
    pub profiles: ProfileManager,
    pub contact: ContactDesk,
}

/// A type passed to the components of the gallery to reach shared collaborators.
#[derive(Clone)]
pub struct GalleryContext {
    pub database: Arc<dyn Database>,
    pub storage: Arc<dyn MediaStorage>,
    pub mailer: Arc<dyn Mailer>,
    /// Who receives messages sent through the contact form
    pub contact_recipients: Arc<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl Gallery {
    pub fn new(
        database: Arc<dyn Database>,
        storage: Arc<dyn MediaStorage>,
        mailer: Arc<dyn Mailer>,
        contact_recipients: Vec<String>,
    ) -> Self {
        let context = GalleryContext {
            database,
            storage,
            mailer,
            contact_recipients: Arc::new(contact_recipients),
        };

        Self {
            auth: Auth::new(&context.database),
            albums: AlbumManager::new(&context),
            profiles: ProfileManager::new(&context),
            contact: ContactDesk::new(&context),
            context,
        }
    }

    /// Where uploaded files live
    pub fn storage(&self) -> &dyn MediaStorage {
        self.context.storage.as_ref()
    }
}
