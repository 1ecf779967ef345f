//! User identity, profile and password-reset OTP state.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    #[default]
    User,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAddress {
    pub houseno: Option<String>,
    pub society: Option<String>,
    pub landmark: Option<String>,
    pub area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub usertype: UserType,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: String,
    pub contactno: Option<String>,
    pub address: Option<UserAddress>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub reset_password_otp: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("No password reset was requested")]
    NotRequested,
    #[error("Invalid OTP")]
    Mismatch,
    #[error("OTP has expired")]
    Expired,
}

impl User {
    pub fn create(
        usertype: UserType,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: String,
        gender: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            usertype,
            username: username.into(),
            email: email.into(),
            password_hash,
            gender: gender.into(),
            contactno: None,
            address: None,
            is_verified: false,
            reset_password_otp: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.usertype == UserType::Admin
    }

    /// Generates a 6-digit OTP valid for `ttl` and stores it on the user.
    pub fn issue_reset_otp(&mut self, now: DateTime<Utc>, ttl: Duration) -> String {
        let otp = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.reset_password_otp = Some(otp.clone());
        self.reset_password_expires = Some(now + ttl);
        self.updated_at = now;
        otp
    }

    /// Checks an OTP and clears it on success.
    pub fn consume_reset_otp(&mut self, otp: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let (stored, expires) = match (&self.reset_password_otp, self.reset_password_expires) {
            (Some(stored), Some(expires)) => (stored, expires),
            _ => return Err(OtpError::NotRequested),
        };
        if stored != otp.trim() {
            return Err(OtpError::Mismatch);
        }
        if now > expires {
            return Err(OtpError::Expired);
        }
        self.reset_password_otp = None;
        self.reset_password_expires = None;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::create(UserType::User, "asha", "asha@example.com", "hash".into(), "Female")
    }

    #[test]
    fn otp_is_six_digits_and_single_use() {
        let mut u = user();
        let now = Utc::now();
        let otp = u.issue_reset_otp(now, Duration::minutes(10));
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(u.consume_reset_otp("xxxxxx", now), Err(OtpError::Mismatch));
        assert!(u.consume_reset_otp(&otp, now + Duration::minutes(9)).is_ok());
        assert_eq!(u.consume_reset_otp(&otp, now), Err(OtpError::NotRequested));
    }

    #[test]
    fn expired_otp_is_rejected() {
        let mut u = user();
        let now = Utc::now();
        let otp = u.issue_reset_otp(now, Duration::minutes(10));
        assert_eq!(u.consume_reset_otp(&otp, now + Duration::minutes(11)), Err(OtpError::Expired));
        assert!(u.reset_password_otp.is_some());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut u = user();
        u.issue_reset_otp(Utc::now(), Duration::minutes(10));
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("resetPasswordOtp").is_none());
        assert_eq!(json["usertype"], "user");
    }
}
