use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::app::query::push_page;
use crate::domain::pagination::Pagination;
use crate::domain::support::{
    NewTicket, SupportTicket, TicketCategory, TicketFilter, TicketPriority, TicketStatus,
};
use crate::domain::user::Actor;
use crate::infra::db::Db;

const TICKET_COLUMNS: &str = "id, user_id, subject, category::text AS category, \
     priority::text AS priority, description, status::text AS status, created_at, updated_at";

#[derive(Clone)]
pub struct SupportService {
    db: Db,
}

impl SupportService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_ticket(&self, actor: &Actor, ticket: NewTicket) -> Result<SupportTicket> {
        let row = sqlx::query(&format!(
            "INSERT INTO support_tickets (user_id, subject, category, priority, description) \
             VALUES ($1, $2, $3::ticket_category, $4::ticket_priority, $5) \
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(actor.user_id)
        .bind(ticket.subject)
        .bind(ticket.category.as_db())
        .bind(ticket.priority.as_db())
        .bind(ticket.description)
        .fetch_one(self.db.pool())
        .await?;

        ticket_from_row(&row)
    }

    pub async fn list_own(&self, actor: &Actor) -> Result<Vec<SupportTicket>> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(actor.user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(ticket_from_row).collect()
    }

    pub async fn list(&self, filter: &TicketFilter) -> Result<(Vec<SupportTicket>, Pagination)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM support_tickets");
        push_ticket_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {TICKET_COLUMNS} FROM support_tickets"));
        push_ticket_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut query, filter.page.limit, filter.page.offset());

        let rows = query.build().fetch_all(self.db.pool()).await?;
        let tickets = rows
            .iter()
            .map(ticket_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok((tickets, Pagination::new(total, filter.page)))
    }

    pub async fn update_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Option<SupportTicket>> {
        let row = sqlx::query(&format!(
            "UPDATE support_tickets SET status = $2::ticket_status, updated_at = now() \
             WHERE id = $1 \
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(ticket_id)
        .bind(status.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(ticket_from_row).transpose()
    }
}

fn push_ticket_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    builder.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        builder
            .push(" AND status = ")
            .push_bind(status.as_db())
            .push("::ticket_status");
    }
    if let Some(priority) = filter.priority {
        builder
            .push(" AND priority = ")
            .push_bind(priority.as_db())
            .push("::ticket_priority");
    }
    if let Some(category) = filter.category {
        builder
            .push(" AND category = ")
            .push_bind(category.as_db())
            .push("::ticket_category");
    }
}

fn ticket_from_row(row: &PgRow) -> Result<SupportTicket> {
    let category: String = row.get("category");
    let category = TicketCategory::from_db(&category)
        .ok_or_else(|| anyhow!("unknown ticket category: {}", category))?;
    let priority: String = row.get("priority");
    let priority = TicketPriority::from_db(&priority)
        .ok_or_else(|| anyhow!("unknown ticket priority: {}", priority))?;
    let status: String = row.get("status");
    let status =
        TicketStatus::from_db(&status).ok_or_else(|| anyhow!("unknown ticket status: {}", status))?;

    Ok(SupportTicket {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subject: row.get("subject"),
        category,
        priority,
        description: row.get("description"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_filter_binds_each_selector() {
        let filter = TicketFilter {
            status: Some(TicketStatus::Open),
            priority: Some(TicketPriority::Urgent),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM support_tickets");
        push_ticket_filter(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM support_tickets WHERE TRUE \
             AND status = $1::ticket_status AND priority = $2::ticket_priority"
        );
    }
}
