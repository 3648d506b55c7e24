use error_stack::{report, ResultExt};
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};

use crate::config::mail_config::MailConfig;
use crate::ports::mailer::{MailError, OutgoingMail};

/// Plain-text part plus the workbook as an `application/octet-stream`
/// base64 attachment.
pub fn compose(
    config: &MailConfig,
    mail: &OutgoingMail,
    attachment: Vec<u8>,
) -> error_stack::Result<Message, MailError> {
    let from_address = config
        .from_address
        .parse::<Address>()
        .change_context(MailError::Compose)
        .attach_printable_lazy(|| format!("from_address: {}", config.from_address))?;
    let to = config
        .to_address
        .parse::<Mailbox>()
        .change_context(MailError::Compose)
        .attach_printable_lazy(|| format!("to_address: {}", config.to_address))?;
    let from = Mailbox::new(Some(config.sender_name.to_string()), from_address);

    let file_name = mail
        .attachment
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| report!(MailError::Attachment))
        .attach_printable_lazy(|| format!("attachment: {}", mail.attachment.display()))?;

    let content_type =
        ContentType::parse("application/octet-stream").change_context(MailError::Compose)?;
    let body = Body::new_with_encoding(attachment, ContentTransferEncoding::Base64)
        .map_err(|_| report!(MailError::Compose))
        .attach_printable("attachment could not be base64 encoded")?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.as_str())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body.clone()))
                .singlepart(Attachment::new(file_name).body(body, content_type)),
        )
        .change_context(MailError::Compose)
}
