//! Policy event persistence

use crate::models::{PolicyEvent, PolicyEventType};
use crate::Result;
use sqlx::{Row, SqlitePool};

/// Insert or update a policy event by id
pub async fn upsert_policy_event(pool: &SqlitePool, event: &PolicyEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO policy_events (id, date, title, description, source_url, type)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            date = excluded.date,
            title = excluded.title,
            description = excluded.description,
            source_url = excluded.source_url,
            type = excluded.type
        "#,
    )
    .bind(&event.id)
    .bind(&event.date)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.source_url)
    .bind(event.event_type.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// The `limit` most recent policy events, newest first
pub async fn get_recent_policy_events(pool: &SqlitePool, limit: u32) -> Result<Vec<PolicyEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, date, title, description, source_url, type
        FROM policy_events
        ORDER BY date DESC, id
        LIMIT ?
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let event_type: String = row.get("type");
        events.push(PolicyEvent {
            id: row.get("id"),
            date: row.get("date"),
            title: row.get("title"),
            description: row.get("description"),
            source_url: row.get("source_url"),
            event_type: event_type.parse::<PolicyEventType>()?,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    fn event(id: &str, date: &str) -> PolicyEvent {
        PolicyEvent {
            id: id.to_string(),
            date: date.to_string(),
            title: format!("Event {}", id),
            description: "Tariff action".to_string(),
            source_url: Some("https://ustr.gov/".to_string()),
            event_type: PolicyEventType::Tariff,
        }
    }

    #[tokio::test]
    async fn test_recent_events_newest_first_with_limit() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();

        upsert_policy_event(&pool, &event("a", "2018-03-23")).await.unwrap();
        upsert_policy_event(&pool, &event("b", "2018-09-24")).await.unwrap();
        upsert_policy_event(&pool, &event("c", "2018-07-06")).await.unwrap();
        upsert_policy_event(&pool, &event("c", "2018-07-06")).await.unwrap();

        let events = get_recent_policy_events(&pool, 2).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let all = get_recent_policy_events(&pool, 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
