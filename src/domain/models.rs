use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Educator,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Educator => "EDUCATOR",
            UserRole::Student => "STUDENT",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "ADMIN" => Some(UserRole::Admin),
            "EDUCATOR" => Some(UserRole::Educator),
            "STUDENT" => Some(UserRole::Student),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "activity_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
    FileUpload,
}

impl ActivityKind {
    /// Quiz-style activities are graded from a question bank; file uploads go
    /// through the delivery review cycle instead.
    pub fn has_question_bank(&self) -> bool {
        !matches!(self, ActivityKind::FileUpload)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "camelCase")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "delivery_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Reviewed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "transcription_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Assigned,
    Closed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn from_gateway(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" | "in_process" => Some(PaymentStatus::Pending),
            "approved" | "accredited" => Some(PaymentStatus::Approved),
            "rejected" | "cancelled" | "refunded" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PaymentStatus::from_gateway("approved"), Some(PaymentStatus::Approved));
        assert_eq!(PaymentStatus::from_gateway("IN_PROCESS"), Some(PaymentStatus::Pending));
        assert_eq!(PaymentStatus::from_gateway("refunded"), Some(PaymentStatus::Rejected));
        assert_eq!(PaymentStatus::from_gateway("weird"), None);
    }

    #[test]
    fn file_uploads_have_no_question_bank() {
        assert!(ActivityKind::MultipleChoice.has_question_bank());
        assert!(!ActivityKind::FileUpload.has_question_bank());
    }
}
