use log::info;

use crate::{GalleryContext, GalleryError, OutgoingMail};

/// A message submitted through the contact form
#[derive(Debug)]
pub struct ContactMessage {
    pub first_name: String,
    pub last_name: String,
    /// Used as the sender of the mail
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactMessage {
    /// The mail body, the sender's name followed by the message
    pub fn body(&self) -> String {
        format!("{} {}\n {}", self.first_name, self.last_name, self.message)
    }
}

/// Forwards contact messages to the configured recipients
pub struct ContactDesk {
    context: GalleryContext,
}

impl ContactDesk {
    pub fn new(context: &GalleryContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn send(&self, message: ContactMessage) -> Result<(), GalleryError> {
        let mail = OutgoingMail {
            body: message.body(),
            subject: message.subject,
            from: message.email,
            recipients: self.context.contact_recipients.as_ref().clone(),
        };

        info!(
            "Forwarding contact message from {} to {} recipient(s)",
            mail.from,
            mail.recipients.len()
        );

        self.context.mailer.send(mail).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Fixture;

    use super::*;

    fn message() -> ContactMessage {
        ContactMessage {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.com".to_string(),
            subject: "Hello".to_string(),
            message: "Lovely gallery".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_to_nobody_by_default() {
        let fixture = Fixture::new(vec![]);
        fixture.gallery.contact.send(message()).await.unwrap();

        let sent = fixture.mailer.sent();
        assert_eq!(
            sent,
            vec![OutgoingMail {
                subject: "Hello".to_string(),
                body: "Alice Liddell\n Lovely gallery".to_string(),
                from: "alice@example.com".to_string(),
                recipients: vec![],
            }]
        );
    }

    #[tokio::test]
    async fn sends_to_configured_recipients() {
        let fixture = Fixture::new(vec!["owner@example.com".to_string()]);
        fixture.gallery.contact.send(message()).await.unwrap();

        assert_eq!(
            fixture.mailer.sent()[0].recipients,
            vec!["owner@example.com".to_string()]
        );
    }
}
