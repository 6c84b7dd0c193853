//! Tickets service
//!
//! Ticket list through the generic resource service, plus the
//! per-ticket detail views: audit history and comments.

use super::resource::{failure_message, ResourceService};
use crate::error::Result;
use crate::models::{Comment, CommentDraft, Ticket, TicketHistory, COMMENT_SCHEMA};

/// Everything shown on a ticket's detail page
#[derive(Debug, Clone)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub history: Vec<TicketHistory>,
    pub comments: Vec<Comment>,
}

/// Service for ticket lists and details
#[derive(Clone)]
pub struct TicketsService {
    tickets: ResourceService<Ticket>,
}

impl TicketsService {
    pub fn new(tickets: ResourceService<Ticket>) -> Self {
        Self { tickets }
    }

    pub fn list(&self) -> &ResourceService<Ticket> {
        &self.tickets
    }

    /// Fetch a ticket with its history and comments
    pub async fn detail(&self, id: i64) -> Result<TicketDetail> {
        let api = self.tickets.api();

        let (ticket, history, comments) = tokio::try_join!(
            api.get::<Ticket>(id),
            api.ticket_history(id),
            api.ticket_comments(id),
        )?;

        tracing::debug!(
            "Loaded ticket {} ({} history rows, {} comments)",
            id,
            history.len(),
            comments.len()
        );

        Ok(TicketDetail {
            ticket,
            history,
            comments,
        })
    }

    /// Post a comment; the caller refetches the detail afterwards
    pub async fn add_comment(&self, ticket_id: i64, content: String) -> Result<Comment> {
        let draft = CommentDraft { content };
        COMMENT_SCHEMA.validate(&draft)?;

        tracing::info!("Adding comment to ticket {}", ticket_id);
        match self.tickets.api().add_comment(ticket_id, &draft).await {
            Ok(comment) => Ok(comment),
            Err(e) => {
                self.tickets
                    .notifications()
                    .error(failure_message("add", "comment", &e));
                Err(e)
            }
        }
    }
}
