use std::path::{Path, PathBuf};

use chrono::Utc;

pub const DEFAULT_FROM: &str = "webmaster@localhost";

/// A plain-text message.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    fn render(&self, from: &str) -> String {
        format!(
            "Subject: {}\nFrom: {}\nTo: {}\nDate: {}\n\n{}\n",
            self.subject,
            from,
            self.to,
            Utc::now().to_rfc2822(),
            self.body
        )
    }
}

/// File-based mail delivery: every message becomes one `.log` file in
/// `dir`.
#[derive(Debug, Clone)]
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `email` to the outbox and return the file it landed in.
    pub async fn send(&self, email: &Email) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!(
            "{}-{}.log",
            Utc::now().format("%Y%m%d-%H%M%S"),
            uuid::Uuid::now_v7().simple()
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, email.render(DEFAULT_FROM)).await?;
        tracing::info!(
            "Mail \"{}\" to {} written to {}",
            email.subject,
            email.to,
            path.display()
        );
        Ok(path)
    }
}
