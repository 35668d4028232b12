use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::{NestwatchError, Result};

/// Sends plain-text risk notifications to a parent over SMTP (STARTTLS +
/// credential login). Delivery mechanics beyond a single send attempt are out
/// of scope.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NestwatchError::Config(e.to_string()))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        let from = match &config.sender_name {
            Some(name) => format!("{name} <{}>", config.from_address),
            None => config.from_address.clone(),
        };
        let from: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| NestwatchError::Config(e.to_string()))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub async fn send_risk_notification(
        &self,
        to_email: &str,
        child_name: &str,
        risk_level: &str,
        redirect_url: &str,
    ) -> Result<()> {
        let to: Mailbox = to_email
            .parse()
            .map_err(|e: lettre::address::AddressError| NestwatchError::Validation(e.to_string()))?;

        let subject = format!("AI Chat Risk Notification for {child_name}");
        let body = format!(
            "Dear Parent,\n\n\
             We have detected a {risk_level} risk level in your child's AI chat activities.\n\n\
             Please click the following link to view the conversation: {redirect_url}\n\n\
             Best regards,\nThe Nestwatch Team\n"
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| NestwatchError::Validation(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NestwatchError::Upstream(e.to_string()))?;
        Ok(())
    }
}
