use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

pub const MAX_FIRST_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 255;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sanitized submission, ready to be stamped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitlistSubmission {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    /// Free-form and stored exactly as received.
    pub reason: Value,
}

/// Document persisted to the `waitlistform` collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitlistEntry {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub reason: Value,
    pub timestamp: String,
}

impl WaitlistEntry {
    /// Stamps the submission with the server's local time.
    pub fn new(submission: WaitlistSubmission, created_at: NaiveDateTime) -> Self {
        let WaitlistSubmission {
            first_name,
            email,
            phone,
            reason,
        } = submission;

        Self {
            first_name,
            email,
            phone,
            reason,
            timestamp: created_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn entry_serializes_with_formatted_timestamp() {
        let created_at = NaiveDate::from_ymd_opt(2025, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 0))
            .expect("valid timestamp");
        let entry = WaitlistEntry::new(
            WaitlistSubmission {
                first_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: String::new(),
                reason: json!(""),
            },
            created_at,
        );

        assert_eq!(
            serde_json::to_value(&entry).expect("serializes"),
            json!({
                "first_name": "Ada",
                "email": "ada@example.com",
                "phone": "",
                "reason": "",
                "timestamp": "2025-03-09 07:05:00",
            })
        );
    }
}
