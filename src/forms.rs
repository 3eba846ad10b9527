//! Form input parsing and validation.
//!
//! Validation failures are reported per field so pages can re-render the
//! form with messages next to the offending inputs.

use axum::extract::Multipart;
use serde::Deserialize;

use crate::db::models::Group;
use crate::error::AppResult;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Raw fields of the create/edit post form.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<Upload>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFormErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
    pub image: Vec<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.group.is_empty() && self.image.is_empty()
    }
}

/// Post form fields that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostForm {
    /// Collect the `text`, `group` and `image` parts. Unknown parts are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("text") => form.text = field.text().await?,
                Some("group") => form.group = field.text().await?,
                Some("image") => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen
                    if !file_name.is_empty() || !data.is_empty() {
                        form.image = Some(Upload {
                            file_name,
                            data: data.to_vec(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    /// Check text and group against the known groups.
    pub fn clean(&self, groups: &[Group]) -> Result<CleanPost, PostFormErrors> {
        let mut errors = PostFormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.text.push(REQUIRED.to_string());
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.group.push(INVALID_GROUP.to_string());
                    None
                }
            },
        };

        if errors.is_empty() {
            Ok(CleanPost {
                text: text.to_string(),
                group_id,
            })
        } else {
            Err(errors)
        }
    }

    /// Selected group id, for re-rendering the form.
    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    /// Trimmed text, or `None` when there is nothing to post.
    pub fn clean(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupErrors {
    pub username: Vec<String>,
    pub email: Vec<String>,
    pub password1: Vec<String>,
    pub password2: Vec<String>,
}

impl SignupErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
            && self.email.is_empty()
            && self.password1.is_empty()
            && self.password2.is_empty()
    }
}

impl SignupForm {
    /// Field checks that need no database. Username uniqueness is checked by
    /// the caller.
    pub fn validate(&self) -> SignupErrors {
        let mut errors = SignupErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.username.push(REQUIRED.to_string());
        } else if username.chars().count() > USERNAME_MAX_LEN {
            errors.username.push(format!(
                "Ensure this value has at most {USERNAME_MAX_LEN} characters."
            ));
        } else if !is_valid_username(username) {
            errors.username.push(
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                    .to_string(),
            );
        }

        let email = self.email.trim();
        if !email.is_empty() && !looks_like_email(email) {
            errors.email.push(INVALID_EMAIL.to_string());
        }

        errors.password1 = password_problems(&self.password1);
        if self.password2.is_empty() {
            errors.password2.push(REQUIRED.to_string());
        } else if self.password1 != self.password2 {
            errors.password2.push(PASSWORD_MISMATCH.to_string());
        }

        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordChangeErrors {
    pub old_password: Vec<String>,
    pub new_password1: Vec<String>,
    pub new_password2: Vec<String>,
}

impl PasswordChangeErrors {
    pub fn is_empty(&self) -> bool {
        self.old_password.is_empty() && self.new_password1.is_empty() && self.new_password2.is_empty()
    }
}

impl PasswordChangeForm {
    /// Checks on the new password pair; the old password is verified by the caller.
    pub fn validate(&self) -> PasswordChangeErrors {
        let mut errors = PasswordChangeErrors {
            new_password1: password_problems(&self.new_password1),
            ..Default::default()
        };
        if self.old_password.is_empty() {
            errors.old_password.push(REQUIRED.to_string());
        }
        if self.new_password1 != self.new_password2 {
            errors.new_password2.push(PASSWORD_MISMATCH.to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordResetForm {
    pub email: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> Vec<String> {
        let email = self.email.trim();
        if email.is_empty() {
            vec![REQUIRED.to_string()]
        } else if !looks_like_email(email) {
            vec![INVALID_EMAIL.to_string()]
        } else {
            Vec::new()
        }
    }
}

/// New password pair submitted from a reset link.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetPasswordErrors {
    pub new_password1: Vec<String>,
    pub new_password2: Vec<String>,
}

impl SetPasswordErrors {
    pub fn is_empty(&self) -> bool {
        self.new_password1.is_empty() && self.new_password2.is_empty()
    }
}

impl SetPasswordForm {
    pub fn validate(&self) -> SetPasswordErrors {
        let mut errors = SetPasswordErrors {
            new_password1: password_problems(&self.new_password1),
            ..Default::default()
        };
        if self.new_password1 != self.new_password2 {
            errors.new_password2.push(PASSWORD_MISMATCH.to_string());
        }
        errors
    }
}

fn password_problems(password: &str) -> Vec<String> {
    if password.is_empty() {
        vec![REQUIRED.to_string()]
    } else if password.chars().count() < PASSWORD_MIN_LEN {
        vec![format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
        )]
    } else if password.chars().all(|c| c.is_ascii_digit()) {
        vec!["This password is entirely numeric.".to_string()]
    } else {
        Vec::new()
    }
}

pub fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
