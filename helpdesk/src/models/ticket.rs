//! Tickets, their audit history and comments

use super::{Resource, ResourceKind};
use crate::forms::{FieldSpec, FormSchema, Rule, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_by: i64,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub floor_id: Option<i64>,
    #[serde(default)]
    pub area_id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Create/edit payload for a ticket
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketDraft {
    pub title: String,
    /// Rich-text body, passed through untouched
    pub description: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<i64>,
}

pub const TICKET_SCHEMA: FormSchema = FormSchema {
    entity: "ticket",
    fields: &[
        FieldSpec {
            name: "title",
            label: "Title",
            rules: &[Rule::Required, Rule::MaxLength(200)],
        },
        FieldSpec {
            name: "description",
            label: "Description",
            rules: &[Rule::Required],
        },
        FieldSpec {
            name: "priority",
            label: "Priority",
            rules: &[Rule::Required],
        },
        FieldSpec {
            name: "assigned_to",
            label: "Assignee",
            rules: &[Rule::PositiveId],
        },
        FieldSpec {
            name: "floor_id",
            label: "Floor",
            rules: &[Rule::PositiveId],
        },
        FieldSpec {
            name: "area_id",
            label: "Area",
            rules: &[Rule::PositiveId],
        },
    ],
};

impl Resource for Ticket {
    const KIND: ResourceKind = ResourceKind::Tickets;

    type Draft = TicketDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn validate(draft: &TicketDraft) -> Result<(), ValidationErrors> {
        TICKET_SCHEMA.validate(draft)
    }
}

/// Append-only audit row for a ticket; order is whatever the backend sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketHistory {
    pub id: i64,
    pub ticket_id: i64,
    #[serde(default)]
    pub changed_by: Option<i64>,
    pub field_name: String,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A comment on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub ticket_id: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentDraft {
    pub content: String,
}

pub const COMMENT_SCHEMA: FormSchema = FormSchema {
    entity: "comment",
    fields: &[FieldSpec {
        name: "content",
        label: "Comment",
        rules: &[Rule::Required, Rule::MaxLength(5000)],
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_parses_backend_payload() {
        let json = r#"{
            "id": 12,
            "title": "Printer down",
            "description": "<p>Floor 2</p>",
            "status": "Abierto",
            "priority": "Alta",
            "created_by": 3,
            "assigned_to": null,
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T11:00:00Z"
        }"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();

        assert_eq!(ticket.id(), 12);
        assert!(ticket.assigned_to.is_none());
        assert!(ticket.floor_id.is_none());
        assert!(ticket.updated_at > ticket.created_at);
    }

    #[test]
    fn test_ticket_draft_requires_title_and_description() {
        let errors = Ticket::validate(&TicketDraft {
            priority: "Alta".to_string(),
            ..TicketDraft::default()
        })
        .unwrap_err();

        assert!(errors.for_field("title").is_some());
        assert!(errors.for_field("description").is_some());
        assert!(errors.for_field("priority").is_none());
    }
}
