use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AchievementDefinition, AttendanceSource, BeltProgress, BillingCycle, ClassRecord, ClassStatus,
    ClassWithAttendances, LeaderboardRow, MembershipBilling, Modality, StagedAward,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let gym_id = Uuid::parse_str("7d0f2a7e-5f63-4c2e-9a41-6b2f9a1c3d58")?;
    sqlx::query(
        r#"
        INSERT INTO academy.gyms (id, name, slug, country, status, invite_token, invite_enabled)
        VALUES ($1, $2, $3, $4, 'active', $5, TRUE)
        ON CONFLICT (slug) DO UPDATE
        SET name = EXCLUDED.name, country = EXCLUDED.country
        "#,
    )
    .bind(gym_id)
    .bind("Arte Suave BJJ")
    .bind("arte-suave")
    .bind("Europe/Lisbon")
    .bind("seed-invite-token")
    .execute(pool)
    .await?;

    let people = vec![
        ("user-ana", "Ana Ribeiro", Some("blue"), "student"),
        ("user-bruno", "Bruno Costa", Some("white"), "student"),
        ("user-carla", "Carla Mendes", Some("purple"), "student"),
        ("user-diego", "Diego Santos", Some("black"), "admin"),
    ];

    for (user_id, name, belt, role) in people {
        sqlx::query(
            r#"
            INSERT INTO academy.profiles (id, user_id, name, belt)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name, belt = EXCLUDED.belt
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(belt)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO academy.memberships (id, user_id, gym_id, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, gym_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(gym_id)
        .bind(role)
        .execute(pool)
        .await?;
    }

    let catalog = vec![
        (
            "first-class",
            "First Class",
            "Attend your first class",
            "milestone",
            serde_json::json!({"type": "total", "count": 1}),
        ),
        (
            "ten-classes",
            "Ten Classes",
            "Attend ten classes",
            "attendance",
            serde_json::json!({"type": "total", "count": 10}),
        ),
        (
            "week-streak",
            "Week Streak",
            "Train five days in a row",
            "attendance",
            serde_json::json!({"type": "streak", "count": 5}),
        ),
    ];

    for (id, name, description, category, requirement) in catalog {
        sqlx::query(
            r#"
            INSERT INTO academy.achievement_types (id, name, description, category, requirement)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, requirement = EXCLUDED.requirement
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(category)
        .bind(requirement)
        .execute(pool)
        .await?;
    }

    let plan_id = Uuid::parse_str("c3a6e0d1-98b4-4f3e-b21d-f0a7c5e8d942")?;
    sqlx::query(
        r#"
        INSERT INTO academy.membership_plans
        (id, gym_id, name, price, currency, billing_cycle, attendance_limit_type)
        VALUES ($1, $2, $3, $4, 'eur', 'monthly', 'unlimited')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(plan_id)
    .bind(gym_id)
    .bind("Adults Unlimited")
    .bind(8900)
    .execute(pool)
    .await?;

    let today = Utc::now().date_naive();
    let memberships = vec![
        ("user-ana", today + Duration::days(20)),
        ("user-bruno", today - Duration::days(3)),
    ];
    for (student_id, next_billing) in memberships {
        sqlx::query(
            r#"
            INSERT INTO academy.student_memberships
            (id, student_id, gym_id, membership_plan_id, status, payment_method,
             start_date, next_billing_date)
            VALUES ($1, $2, $3, $4, 'active', 'cash', $5, $6)
            ON CONFLICT (student_id, gym_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(gym_id)
        .bind(plan_id)
        .bind(today - Duration::days(90))
        .bind(next_billing)
        .execute(pool)
        .await?;
    }

    for (belt, required) in [("white", 120), ("blue", 300)] {
        sqlx::query(
            r#"
            INSERT INTO academy.belt_promotion_rules (id, gym_id, belt, required_classes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (gym_id, belt) DO UPDATE
            SET required_classes = EXCLUDED.required_classes
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(belt)
        .bind(required)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO academy.classes
        (id, gym_id, title, date, start_at, end_at, modality, coach_name, status, qr_token)
        VALUES ($1, $2, $3, $4, $5, $6, 'gi', $7, 'active', $8)
        ON CONFLICT (qr_token) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(gym_id)
    .bind("Fundamentals Gi")
    .bind(today)
    .bind(NaiveTime::from_hms_opt(19, 0, 0).context("invalid time")?)
    .bind(NaiveTime::from_hms_opt(20, 30, 0).context("invalid time")?)
    .bind("Diego Santos")
    .bind("seed-qr-token")
    .execute(pool)
    .await?;

    Ok(())
}

pub struct ClassBatch {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: Vec<Weekday>,
    pub start_at: NaiveTime,
    pub end_at: NaiveTime,
    pub modality: Modality,
    pub capacity: Option<i32>,
    pub coach_name: Option<String>,
}

/// Creates one class row per date in the range whose weekday is selected,
/// each with a fresh QR token. Returns the number of classes created.
pub async fn create_recurring_classes(
    pool: &PgPool,
    gym_id: Uuid,
    batch: &ClassBatch,
) -> anyhow::Result<usize> {
    let mut created = 0usize;
    let mut date = batch.start_date;

    while date <= batch.end_date {
        if batch.weekdays.contains(&date.weekday()) {
            sqlx::query(
                r#"
                INSERT INTO academy.classes
                (id, gym_id, title, date, start_at, end_at, modality, capacity,
                 coach_name, status, qr_token)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', $10)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(gym_id)
            .bind(&batch.title)
            .bind(date)
            .bind(batch.start_at)
            .bind(batch.end_at)
            .bind(batch.modality.as_str())
            .bind(batch.capacity)
            .bind(batch.coach_name.as_deref())
            .bind(Uuid::new_v4().to_string())
            .execute(pool)
            .await?;
            created += 1;
        }
        date += Duration::days(1);
    }

    Ok(created)
}

fn map_class(row: &PgRow) -> anyhow::Result<ClassRecord> {
    let modality: String = row.get("modality");
    let status: String = row.get("status");
    Ok(ClassRecord {
        id: row.get("id"),
        gym_id: row.get("gym_id"),
        title: row.get("title"),
        date: row.get("date"),
        start_at: row.get("start_at"),
        end_at: row.get("end_at"),
        modality: Modality::parse(&modality)?,
        capacity: row.get("capacity"),
        coach_name: row.get("coach_name"),
        status: ClassStatus::parse(&status)?,
        qr_token: row.get("qr_token"),
    })
}

const CLASS_WITH_ATTENDANCES: &str =
    "SELECT c.id, c.gym_id, c.title, c.date, c.start_at, c.end_at, c.modality, \
     c.capacity, c.coach_name, c.status, c.qr_token, \
     a.user_id AS attendee_id \
     FROM academy.classes c \
     LEFT JOIN academy.attendances a \
     ON a.class_id = c.id AND a.revoked_at IS NULL";

fn collect_class(rows: Vec<PgRow>) -> anyhow::Result<Option<ClassWithAttendances>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };

    let class = map_class(first)?;
    let mut attendee_ids = Vec::new();
    for row in &rows {
        let attendee_id: Option<String> = row.get("attendee_id");
        if let Some(id) = attendee_id {
            attendee_ids.push(id);
        }
    }

    Ok(Some(ClassWithAttendances { class, attendee_ids }))
}

pub async fn fetch_class_by_qr_token(
    pool: &PgPool,
    token: &str,
) -> anyhow::Result<Option<ClassWithAttendances>> {
    let query = format!("{CLASS_WITH_ATTENDANCES} WHERE c.qr_token = $1");
    let rows = sqlx::query(&query).bind(token).fetch_all(pool).await?;
    collect_class(rows)
}

pub async fn fetch_class_by_id(
    pool: &PgPool,
    class_id: Uuid,
) -> anyhow::Result<Option<ClassWithAttendances>> {
    let query = format!("{CLASS_WITH_ATTENDANCES} WHERE c.id = $1");
    let rows = sqlx::query(&query).bind(class_id).fetch_all(pool).await?;
    collect_class(rows)
}

/// Insert-or-ignore on the (class, user) unique key. Returns false when the
/// user was already checked in.
pub async fn insert_attendance(
    pool: &PgPool,
    class_id: Uuid,
    user_id: &str,
    source: AttendanceSource,
    checked_by_user_id: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academy.attendances (id, class_id, user_id, source, checked_by_user_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (class_id, user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(class_id)
    .bind(user_id)
    .bind(source.as_str())
    .bind(checked_by_user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn revoke_attendance(pool: &PgPool, attendance_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM academy.attendances WHERE id = $1")
        .bind(attendance_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves an active class to a terminal status. Finished and cancelled rows
/// are left alone; the return value reports whether the transition happened.
pub async fn update_class_status(
    pool: &PgPool,
    class_id: Uuid,
    status: ClassStatus,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE academy.classes SET status = $2, updated_at = now() \
         WHERE id = $1 AND status = 'active'",
    )
    .bind(class_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Dates of every non-revoked attendance for a user within a gym, newest
/// first. Stats are recomputed from this list on each read.
pub async fn fetch_attendance_dates(
    pool: &PgPool,
    gym_id: Uuid,
    user_id: &str,
) -> anyhow::Result<Vec<NaiveDate>> {
    let rows = sqlx::query(
        r#"
        SELECT c.date
        FROM academy.attendances a
        JOIN academy.classes c ON c.id = a.class_id AND c.gym_id = $1
        WHERE a.user_id = $2 AND a.revoked_at IS NULL
        ORDER BY c.date DESC
        "#,
    )
    .bind(gym_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("date")).collect())
}

pub async fn fetch_achievement_definitions(
    pool: &PgPool,
) -> anyhow::Result<Vec<AchievementDefinition>> {
    let rows = sqlx::query("SELECT id, name, category, requirement FROM academy.achievement_types")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| AchievementDefinition {
            id: row.get("id"),
            name: row.get("name"),
            category: row.get("category"),
            requirement: row.get("requirement"),
        })
        .collect())
}

pub async fn fetch_earned_achievement_types(
    pool: &PgPool,
    gym_id: Uuid,
    user_id: &str,
) -> anyhow::Result<HashSet<String>> {
    let rows = sqlx::query("SELECT type FROM academy.achievements WHERE gym_id = $1 AND user_id = $2")
        .bind(gym_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get("type")).collect())
}

/// Batch insert of staged awards in one statement. Duplicate keys lose the
/// race silently; the return value counts the rows that actually landed.
pub async fn insert_awards(pool: &PgPool, awards: &[StagedAward]) -> anyhow::Result<u64> {
    if awards.is_empty() {
        return Ok(0);
    }

    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        "INSERT INTO academy.achievements (id, user_id, gym_id, type, data) ",
    );
    builder.push_values(awards, |mut b, award| {
        b.push_bind(Uuid::new_v4())
            .push_bind(&award.user_id)
            .push_bind(award.gym_id)
            .push_bind(&award.achievement_type)
            .push_bind(&award.data);
    });
    builder.push(" ON CONFLICT (user_id, gym_id, type) DO NOTHING");

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn fetch_overdue_membership_ids(
    pool: &PgPool,
    today: NaiveDate,
) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT id FROM academy.student_memberships
        WHERE status = 'active'
          AND next_billing_date IS NOT NULL
          AND next_billing_date <= $1
        "#,
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

pub async fn mark_membership_past_due(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE academy.student_memberships \
         SET status = 'past_due', updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_membership_billing(
    pool: &PgPool,
    membership_id: Uuid,
    gym_id: Uuid,
) -> anyhow::Result<Option<MembershipBilling>> {
    let row = sqlx::query(
        r#"
        SELECT sm.id, sm.status, sm.next_billing_date, p.billing_cycle
        FROM academy.student_memberships sm
        LEFT JOIN academy.membership_plans p ON p.id = sm.membership_plan_id
        WHERE sm.id = $1 AND sm.gym_id = $2
        "#,
    )
    .bind(membership_id)
    .bind(gym_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let cycle: Option<String> = row.get("billing_cycle");
    let billing_cycle = match cycle {
        Some(raw) => Some(BillingCycle::parse(&raw)?),
        None => None,
    };

    Ok(Some(MembershipBilling {
        id: row.get("id"),
        status: row.get("status"),
        next_billing_date: row.get("next_billing_date"),
        billing_cycle,
    }))
}

pub async fn update_membership_paid(
    pool: &PgPool,
    membership_id: Uuid,
    next_billing: NaiveDate,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE academy.student_memberships \
         SET status = 'active', next_billing_date = $2, updated_at = now() WHERE id = $1",
    )
    .bind(membership_id)
    .bind(next_billing)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_plan_cycle(pool: &PgPool, plan_id: Uuid) -> anyhow::Result<Option<BillingCycle>> {
    let row = sqlx::query("SELECT billing_cycle FROM academy.membership_plans WHERE id = $1")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let raw: String = row.get("billing_cycle");
            Ok(Some(BillingCycle::parse(&raw)?))
        }
        None => Ok(None),
    }
}

/// Upserts the single (student, gym) billing membership.
pub async fn assign_student_membership(
    pool: &PgPool,
    student_id: &str,
    gym_id: Uuid,
    plan_id: Option<Uuid>,
    payment_method: &str,
    start_date: NaiveDate,
    next_billing_date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academy.student_memberships
        (id, student_id, gym_id, membership_plan_id, status, payment_method,
         start_date, next_billing_date)
        VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
        ON CONFLICT (student_id, gym_id) DO UPDATE
        SET membership_plan_id = EXCLUDED.membership_plan_id,
            status = 'active',
            payment_method = EXCLUDED.payment_method,
            next_billing_date = EXCLUDED.next_billing_date,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(gym_id)
    .bind(plan_id)
    .bind(payment_method)
    .bind(start_date)
    .bind(next_billing_date)
    .execute(pool)
    .await?;
    Ok(())
}

/// Attendance counts per member of a gym, optionally restricted to a class
/// date range, highest first. Members without attendance still appear.
pub async fn fetch_leaderboard(
    pool: &PgPool,
    slug: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<Vec<LeaderboardRow>> {
    let mut join = String::from(
        "LEFT JOIN academy.classes c \
         ON c.id = a.class_id AND c.gym_id = g.id",
    );
    let mut index = 2;
    if from.is_some() {
        join.push_str(&format!(" AND c.date >= ${index}"));
        index += 1;
    }
    if to.is_some() {
        join.push_str(&format!(" AND c.date <= ${index}"));
    }

    let query = format!(
        "SELECT m.user_id, p.name, count(c.id) AS attendances \
         FROM academy.memberships m \
         JOIN academy.gyms g ON g.id = m.gym_id \
         JOIN academy.profiles p ON p.user_id = m.user_id \
         LEFT JOIN academy.attendances a \
         ON a.user_id = m.user_id AND a.revoked_at IS NULL \
         {join} \
         WHERE g.slug = $1 \
         GROUP BY m.user_id, p.name \
         ORDER BY attendances DESC, p.name"
    );

    let mut rows = sqlx::query(&query).bind(slug);
    if let Some(value) = from {
        rows = rows.bind(value);
    }
    if let Some(value) = to {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .iter()
        .map(|row| LeaderboardRow {
            user_id: row.get("user_id"),
            name: row.get("name"),
            attendances: row.get("attendances"),
        })
        .collect())
}

pub async fn fetch_belt_progress(
    pool: &PgPool,
    gym_id: Uuid,
    user_id: &str,
) -> anyhow::Result<BeltProgress> {
    let profile = sqlx::query("SELECT belt FROM academy.profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .context("profile not found")?;
    let belt: Option<String> = profile.get("belt");

    let required_classes = match &belt {
        Some(belt) => {
            let row = sqlx::query(
                "SELECT required_classes FROM academy.belt_promotion_rules \
                 WHERE gym_id = $1 AND belt = $2",
            )
            .bind(gym_id)
            .bind(belt)
            .fetch_optional(pool)
            .await?;
            row.map(|r| r.get("required_classes"))
        }
        None => None,
    };

    let dates = fetch_attendance_dates(pool, gym_id, user_id).await?;

    Ok(BeltProgress {
        belt,
        required_classes,
        total_classes: dates.len() as i64,
    })
}

/// Resolves a gym from its slug and a live invite token.
pub async fn fetch_gym_by_slug_and_invite(
    pool: &PgPool,
    slug: &str,
    invite: &str,
) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query(
        "SELECT id FROM academy.gyms \
         WHERE slug = $1 AND invite_token = $2 AND invite_enabled",
    )
    .bind(slug)
    .bind(invite)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("id")))
}

pub async fn ensure_membership(
    pool: &PgPool,
    user_id: &str,
    gym_id: Uuid,
    role: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO academy.memberships (id, user_id, gym_id, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, gym_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(gym_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_profile_belt(pool: &PgPool, user_id: &str, belt: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE academy.profiles SET belt = $2, updated_at = now() WHERE user_id = $1")
        .bind(user_id)
        .bind(belt)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn subscription_exists_for_customer(
    pool: &PgPool,
    customer_id: &str,
) -> anyhow::Result<bool> {
    let row = sqlx::query("SELECT 1 AS one FROM academy.subscriptions WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub struct ProvisionedAcademy {
    pub user_id: String,
    pub gym_name: String,
    pub slug: String,
    pub timezone: String,
    pub plan_type: String,
    pub customer_id: String,
    pub subscription_id: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Provisions a new academy after a completed checkout: the gym itself with a
/// fresh invite token, the processor subscription record, and an admin role
/// membership for the purchasing user.
pub async fn provision_academy(pool: &PgPool, data: &ProvisionedAcademy) -> anyhow::Result<Uuid> {
    let gym_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academy.gyms
        (id, name, slug, country, status, invite_token, invite_enabled, invite_token_updated_at)
        VALUES ($1, $2, $3, $4, 'active', $5, TRUE, now())
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&data.gym_name)
    .bind(&data.slug)
    .bind(&data.timezone)
    .bind(Uuid::new_v4().to_string())
    .fetch_one(pool)
    .await?
    .get("id");

    sqlx::query(
        r#"
        INSERT INTO academy.subscriptions
        (id, user_id, gym_id, customer_id, subscription_id, plan_name, status,
         current_period_start, current_period_end)
        VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&data.user_id)
    .bind(gym_id)
    .bind(&data.customer_id)
    .bind(&data.subscription_id)
    .bind(&data.plan_type)
    .bind(data.current_period_start)
    .bind(data.current_period_end)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO academy.profiles (id, user_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&data.user_id)
    .bind(&data.user_id)
    .execute(pool)
    .await?;

    ensure_membership(pool, &data.user_id, gym_id, "admin").await?;

    Ok(gym_id)
}

pub async fn import_members_csv(
    pool: &PgPool,
    gym_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        user_id: String,
        name: String,
        belt: Option<String>,
        role: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        sqlx::query(
            r#"
            INSERT INTO academy.profiles (id, user_id, name, belt)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name, belt = EXCLUDED.belt
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.user_id)
        .bind(&row.name)
        .bind(row.belt.as_deref())
        .execute(pool)
        .await?;

        let role = row.role.unwrap_or_else(|| "student".to_string());
        let result = sqlx::query(
            r#"
            INSERT INTO academy.memberships (id, user_id, gym_id, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, gym_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.user_id)
        .bind(gym_id)
        .bind(&role)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
