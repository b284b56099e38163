//! Postgres [`EventStore`] backed by sqlx.
//!
//! Plans compile to SQL with `QueryBuilder`; the predicates mirror
//! `QueryPlan::matches` exactly so the in-memory backend and Postgres agree.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{AvailabilityWindow, Event, Location, Tag};
use crate::scheduling::planner::{QueryPlan, SortOrder};

use super::{EventStore, StoreError};

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, plan: &QueryPlan) {
        if let Some(ids) = &plan.id_set {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some((creator, co_hosted)) = &plan.created_by_or_in {
            qb.push(" AND (created_by = ").push_bind(*creator);
            if !co_hosted.is_empty() {
                qb.push(" OR id = ANY(")
                    .push_bind(co_hosted.clone())
                    .push(")");
            }
            qb.push(")");
        }
        if let Some((day_start, day_end)) = plan.day {
            qb.push(" AND start_at < ")
                .push_bind(day_end)
                .push(" AND end_at > ")
                .push_bind(day_start);
        }
        if let Some((from, to)) = plan.starts_within {
            qb.push(" AND start_at >= ")
                .push_bind(from)
                .push(" AND start_at < ")
                .push_bind(to);
        }
        if let Some(after) = plan.starts_after {
            qb.push(" AND start_at > ").push_bind(after);
        }
        if let Some(before) = plan.ends_before {
            qb.push(" AND end_at < ").push_bind(before);
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn event_ids_with_any_tag(&self, tag_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT event_id FROM event_tag_relations WHERE tag_id = ANY($1)",
        )
        .bind(tag_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn rsvp_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT event_id FROM event_rsvps WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn co_host_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT event_id FROM event_co_hosts WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn fetch_events(&self, plan: &QueryPlan) -> Result<Vec<Event>, StoreError> {
        let mut qb = QueryBuilder::new("SELECT * FROM events WHERE TRUE");
        Self::push_predicates(&mut qb, plan);
        match plan.order {
            SortOrder::StartAsc => qb.push(" ORDER BY start_at ASC, id ASC"),
            SortOrder::StartDesc => qb.push(" ORDER BY start_at DESC, id DESC"),
        };
        qb.push(" LIMIT ")
            .push_bind(plan.limit as i64)
            .push(" OFFSET ")
            .push_bind(plan.offset as i64);

        let events = qb.build_query_as::<Event>().fetch_all(&self.pool).await?;
        Ok(events)
    }

    async fn count_events(&self, plan: &QueryPlan) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM events WHERE TRUE");
        Self::push_predicates(&mut qb, plan);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn events_at_location(
        &self,
        location_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Event>, StoreError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE location_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(location_id)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn availability_windows(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let windows = sqlx::query_as::<_, AvailabilityWindow>(
            "SELECT id, location_id, start_at, end_at, is_available
             FROM location_availability WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(windows)
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, StoreError> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    async fn locations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Location>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let locations =
            sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ANY($1)")
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        Ok(locations)
    }

    async fn tags_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, StoreError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String)>(
            "SELECT r.event_id, t.id, t.name
             FROM event_tag_relations r
             JOIN tags t ON t.id = r.tag_id
             WHERE r.event_id = ANY($1)
             ORDER BY t.name",
        )
        .bind(event_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for (event_id, id, name) in rows {
            map.entry(event_id).or_default().push(Tag { id, name });
        }
        Ok(map)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO events (
                id, title, description, start_at, end_at, is_all_day,
                location_id, location_text, timezone, color, created_by,
                recurring_pattern_id, is_recurring_instance, av_needs,
                speakers, link, qa_enabled, qa_url, created_at, updated_at
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
             )",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.is_all_day)
        .bind(event.location_id)
        .bind(&event.location_text)
        .bind(&event.timezone)
        .bind(&event.color)
        .bind(event.created_by)
        .bind(event.recurring_pattern_id)
        .bind(event.is_recurring_instance)
        .bind(&event.av_needs)
        .bind(&event.speakers)
        .bind(&event.link)
        .bind(event.qa_enabled)
        .bind(&event.qa_url)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE events SET
                title = $2, description = $3, start_at = $4, end_at = $5,
                is_all_day = $6, location_id = $7, location_text = $8,
                timezone = $9, av_needs = $10, speakers = $11, link = $12,
                qa_enabled = $13, qa_url = $14, updated_at = $15
             WHERE id = $1",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.is_all_day)
        .bind(event.location_id)
        .bind(&event.location_text)
        .bind(&event.timezone)
        .bind(&event.av_needs)
        .bind(&event.speakers)
        .bind(&event.link)
        .bind(event.qa_enabled)
        .bind(&event.qa_url)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_event_tags(&self, event_id: Uuid, tag_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM event_tag_relations WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO event_tag_relations (event_id, tag_id) VALUES ($1, $2)")
                .bind(event_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn toggle_availability(
        &self,
        location_id: Uuid,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, AvailabilityWindow>(
            "SELECT id, location_id, start_at, end_at, is_available
             FROM location_availability
             WHERE location_id = $1 AND start_at = $2
             FOR UPDATE",
        )
        .bind(location_id)
        .bind(slot_start)
        .fetch_optional(&mut *tx)
        .await?;

        let window = match existing {
            Some(window) => {
                sqlx::query_as::<_, AvailabilityWindow>(
                    "UPDATE location_availability
                     SET is_available = NOT is_available
                     WHERE id = $1
                     RETURNING id, location_id, start_at, end_at, is_available",
                )
                .bind(window.id)
                .fetch_one(&mut *tx)
                .await?
            }
            // Unset cells default to available, so the first toggle
            // materializes a blackout.
            None => {
                sqlx::query_as::<_, AvailabilityWindow>(
                    "INSERT INTO location_availability
                        (id, location_id, start_at, end_at, is_available)
                     VALUES ($1, $2, $3, $4, FALSE)
                     RETURNING id, location_id, start_at, end_at, is_available",
                )
                .bind(Uuid::new_v4())
                .bind(location_id)
                .bind(slot_start)
                .bind(slot_end)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(window)
    }
}
