use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::core::{config::Config, error::AppError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// 邮件发送出口。发送失败由调用方决定是否忽略。
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

/// 把邮件写入日志，开发环境使用，验证链接可直接从日志中复制
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        tracing::info!(to = %email.to, subject = %email.subject, "📧 Outgoing email");
        tracing::debug!("📧 Body:\n{}", email.body);
        Ok(())
    }
}

/// 通过 SMTP（STARTTLS）发送，连接池由 lettre 管理
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config, host: &str) -> Result<Self, AppError> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .map_err(|e| AppError::InternalServerError(format!("Invalid MAIL_FROM: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::InternalServerError(format!("Invalid SMTP relay: {e}")))?
            .port(config.smtp_port);

        // 只配置了用户名或只配置了密码时按匿名发送
        if let (Some(user), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self { transport: builder.build(), from })
    }
}

fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, AppError> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| AppError::InternalServerError(format!("Invalid recipient: {e}")))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| AppError::InternalServerError(format!("Failed to build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let message = build_message(&self.from, &email)?;
        self.transport.send(message).await.map_err(|e| {
            tracing::error!("❌ SMTP send to {} failed: {}", email.to, e);
            AppError::InternalServerError("Failed to send email".to_string())
        })?;
        tracing::info!(to = %email.to, "📧 Email sent via SMTP");
        Ok(())
    }
}

pub fn verification_email(base_url: &str, to: &str, username: &str, token: &str) -> OutgoingEmail {
    let link = format!("{}/auth/verify?token={}", base_url.trim_end_matches('/'), token);
    OutgoingEmail {
        to: to.to_string(),
        subject: "Confirm your email address".to_string(),
        body: format!(
            "Hi {username},\n\nPlease confirm your email address to activate your account:\n\n{link}\n\n\
             If you did not create an account you can ignore this message.\n"
        ),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// 总是失败的出口，用于验证发信失败不会中断业务流程
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: OutgoingEmail) -> Result<(), AppError> {
            Err(AppError::InternalServerError("smtp down".to_string()))
        }
    }

    /// 记录所有发出的邮件，供断言使用
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
            self.sent.lock().await.push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_link_has_no_double_slash() {
        let email = verification_email("https://league.example/", "a@b.c", "alice", "tok123");
        assert_eq!(email.to, "a@b.c");
        assert!(email.body.contains("https://league.example/auth/verify?token=tok123"));
        assert!(email.body.contains("Hi alice"));
    }

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = testing::RecordingMailer::default();
        mailer
            .send(verification_email("http://x", "a@b.c", "alice", "t"))
            .await
            .unwrap();
        assert_eq!(mailer.sent.lock().await.len(), 1);
    }

    #[test]
    fn smtp_message_carries_headers_and_body() {
        let from: Mailbox = "League <no-reply@league.example>".parse().unwrap();
        let email = verification_email("https://league.example", "alice@example.com", "alice", "tok");
        let message = build_message(&from, &email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Subject: Confirm your email address"));
        assert!(raw.contains("no-reply@league.example"));
        assert!(raw.contains("/auth/verify?token=tok"));
    }

    #[test]
    fn smtp_message_rejects_bad_recipient() {
        let from: Mailbox = "no-reply@league.example".parse().unwrap();
        let email = verification_email("http://x", "not an address", "bob", "t");
        assert!(matches!(build_message(&from, &email), Err(AppError::InternalServerError(_))));
    }
}
