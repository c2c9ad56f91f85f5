use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pagination::PageRequest;
use crate::domain::text_enum;

text_enum! {
    pub enum TicketCategory {
        Technical => "technical",
        Billing => "billing",
        Equipment => "equipment",
        General => "general",
        Complaint => "complaint",
    }
}

text_enum! {
    pub enum TicketPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

text_enum! {
    pub enum TicketStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub description: String,
    pub status: TicketStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub page: PageRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_database_enum() {
        assert_eq!(TicketStatus::InProgress.as_db(), "in_progress");
        assert_eq!(TicketStatus::from_db("closed"), Some(TicketStatus::Closed));
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn priority_rejects_unknown_text() {
        assert_eq!(TicketPriority::from_db("critical"), None);
        assert_eq!(TicketPriority::from_db("Urgent"), None);
    }
}
