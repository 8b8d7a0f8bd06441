use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveTime, Weekday};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod achievements;
mod attendance;
mod billing;
mod db;
mod models;
mod server;

use models::{AttendanceSource, ClassStatus};

#[derive(Parser)]
#[command(name = "academy-ops")]
#[command(about = "Attendance, achievements, and membership billing for BJJ academies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import a member roster from a CSV file
    ImportMembers {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        gym: Uuid,
    },
    /// Create a recurring batch of classes over a date range
    CreateClasses {
        #[arg(long)]
        gym: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        start_date: NaiveDate,
        #[arg(long)]
        end_date: NaiveDate,
        /// Comma-separated weekdays, e.g. mon,wed,fri
        #[arg(long)]
        weekdays: String,
        #[arg(long)]
        start_at: String,
        #[arg(long)]
        end_at: String,
        #[arg(long, default_value = "gi")]
        modality: String,
        #[arg(long)]
        capacity: Option<i32>,
        #[arg(long)]
        coach: Option<String>,
    },
    /// Self-service QR check-in for a class
    CheckIn {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user: String,
    },
    /// Admin check-in with no time-window validation
    ManualCheckIn {
        #[arg(long)]
        class: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        admin: String,
    },
    /// Remove an attendance record
    RevokeAttendance {
        #[arg(long)]
        attendance: Uuid,
    },
    /// Finish a class and evaluate achievements for its attendees
    FinishClass {
        #[arg(long)]
        class: Uuid,
    },
    /// Cancel a class
    CancelClass {
        #[arg(long)]
        class: Uuid,
    },
    /// Lifetime attendance stats for a user within a gym
    Stats {
        #[arg(long)]
        gym: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Attendance leaderboard for a gym
    Leaderboard {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Belt promotion progress for a user within a gym
    BeltProgress {
        #[arg(long)]
        gym: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Join a gym through its invite token
    Join {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        invite: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        belt: Option<String>,
    },
    /// Assign or replace a student's billing membership
    AssignMembership {
        #[arg(long)]
        gym: Uuid,
        #[arg(long)]
        student: String,
        #[arg(long)]
        plan: Option<Uuid>,
        #[arg(long, default_value = "cash")]
        payment_method: String,
    },
    /// Mark a student membership paid and roll the billing date forward
    MarkPaid {
        #[arg(long)]
        membership: Uuid,
        #[arg(long)]
        gym: Uuid,
    },
    /// Flip overdue active memberships to past_due
    SweepMemberships,
    /// Run the HTTP server for webhook and cron endpoints
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn parse_time(value: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("invalid time of day: {value}"))
}

fn parse_weekdays(value: &str) -> anyhow::Result<Vec<Weekday>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<Weekday>()
                .map_err(|_| anyhow::anyhow!("invalid weekday: {part}"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportMembers { csv, gym } => {
            let inserted = db::import_members_csv(&pool, gym, &csv).await?;
            println!("Added {inserted} members from {}.", csv.display());
        }
        Commands::CreateClasses {
            gym,
            title,
            start_date,
            end_date,
            weekdays,
            start_at,
            end_at,
            modality,
            capacity,
            coach,
        } => {
            let batch = db::ClassBatch {
                title,
                start_date,
                end_date,
                weekdays: parse_weekdays(&weekdays)?,
                start_at: parse_time(&start_at)?,
                end_at: parse_time(&end_at)?,
                modality: models::Modality::parse(&modality)?,
                capacity,
                coach_name: coach,
            };
            let created = db::create_recurring_classes(&pool, gym, &batch).await?;
            println!("Created {created} classes.");
        }
        Commands::CheckIn { token, user } => {
            let class_data = db::fetch_class_by_qr_token(&pool, &token)
                .await?
                .context("class does not exist")?;
            let already = class_data.attendee_ids.iter().any(|id| id == &user);
            let now = Local::now().naive_local();

            let mut decision = attendance::decide_check_in(
                class_data.class.date,
                class_data.class.start_at,
                class_data.class.end_at,
                now,
                already,
            );

            if decision == attendance::CheckInDecision::Accepted {
                let inserted = db::insert_attendance(
                    &pool,
                    class_data.class.id,
                    &user,
                    AttendanceSource::QrCode,
                    None,
                )
                .await?;
                decision = attendance::resolve_insert(decision, inserted);
            }
            println!("{}", decision.message());
        }
        Commands::ManualCheckIn { class, user, admin } => {
            let inserted =
                db::insert_attendance(&pool, class, &user, AttendanceSource::Manual, Some(&admin))
                    .await?;
            if inserted {
                println!("Checked-in {user}.");
            } else {
                println!("{user} is already checked-in.");
            }
        }
        Commands::RevokeAttendance { attendance } => {
            if db::revoke_attendance(&pool, attendance).await? {
                println!("Attendance revoked.");
            } else {
                println!("No attendance record found.");
            }
        }
        Commands::FinishClass { class } => {
            let class_data = db::fetch_class_by_id(&pool, class)
                .await?
                .context("class does not exist")?;
            if class_data.class.status.is_terminal() {
                println!("Class is already {}.", class_data.class.status.as_str());
                return Ok(());
            }
            if !db::update_class_status(&pool, class, ClassStatus::Finished).await? {
                println!("Class is no longer active.");
                return Ok(());
            }

            let awarded = achievements::evaluate_finished_class(
                &pool,
                class_data.class.gym_id,
                &class_data.attendee_ids,
            )
            .await?;
            println!("Class finished; {awarded} achievements awarded.");
        }
        Commands::CancelClass { class } => {
            let class_data = db::fetch_class_by_id(&pool, class)
                .await?
                .context("class does not exist")?;
            if class_data.class.status.is_terminal() {
                println!("Class is already {}.", class_data.class.status.as_str());
                return Ok(());
            }
            if db::update_class_status(&pool, class, ClassStatus::Cancelled).await? {
                println!("Class cancelled.");
            } else {
                println!("Class is no longer active.");
            }
        }
        Commands::Stats { gym, user } => {
            let dates = db::fetch_attendance_dates(&pool, gym, &user).await?;
            let stats = attendance::compute_stats(&dates, Local::now().date_naive());
            println!(
                "{user}: {} classes, current streak {} days",
                stats.total_classes, stats.current_streak
            );
        }
        Commands::Leaderboard {
            slug,
            from,
            to,
            limit,
        } => {
            let rows = db::fetch_leaderboard(&pool, &slug, from, to).await?;
            if rows.is_empty() {
                println!("No members found for this gym.");
                return Ok(());
            }
            println!("Leaderboard for {slug}:");
            for row in rows.iter().take(limit) {
                println!("- {} ({}) {} classes", row.name, row.user_id, row.attendances);
            }
        }
        Commands::BeltProgress { gym, user } => {
            let progress = db::fetch_belt_progress(&pool, gym, &user).await?;
            let belt = progress.belt.as_deref().unwrap_or("none");
            match progress.required_classes {
                Some(required) => println!(
                    "{user}: {belt} belt, {}/{required} classes toward promotion",
                    progress.total_classes
                ),
                None => println!(
                    "{user}: {belt} belt, {} classes (no promotion rule set)",
                    progress.total_classes
                ),
            }
        }
        Commands::Join {
            slug,
            invite,
            user,
            belt,
        } => {
            let gym_id = db::fetch_gym_by_slug_and_invite(&pool, &slug, &invite)
                .await?
                .context("this invite is invalid or has expired")?;
            if let Some(belt) = belt.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
                db::update_profile_belt(&pool, &user, belt).await?;
            }
            db::ensure_membership(&pool, &user, gym_id, "student").await?;
            println!("{user} joined {slug}.");
        }
        Commands::AssignMembership {
            gym,
            student,
            plan,
            payment_method,
        } => {
            let today = Local::now().date_naive();
            let next_billing = match plan {
                Some(plan_id) => db::fetch_plan_cycle(&pool, plan_id)
                    .await?
                    .map(|cycle| billing::roll_next_billing(today, None, cycle)),
                None => None,
            };
            db::assign_student_membership(
                &pool,
                &student,
                gym,
                plan,
                &payment_method,
                today,
                next_billing,
            )
            .await?;
            match next_billing {
                Some(date) => println!("Membership assigned; next billing {date}."),
                None => println!("Membership assigned."),
            }
        }
        Commands::MarkPaid { membership, gym } => {
            let today = Local::now().date_naive();
            let (previous_status, next_billing) =
                billing::mark_membership_paid(&pool, membership, gym, today).await?;
            println!(
                "Membership marked paid (was {previous_status}); next billing {next_billing}."
            );
        }
        Commands::SweepMemberships => {
            let today = Local::now().date_naive();
            let updated = billing::sweep_overdue_memberships(&pool, today).await?;
            println!("Marked {updated} memberships past_due.");
        }
        Commands::Serve { port } => {
            let state = server::AppState {
                pool,
                cron_secret: std::env::var("CRON_SECRET").ok(),
                webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            };
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            server::serve(state, addr).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_parse_with_and_without_seconds() {
        assert_eq!(
            parse_time("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("19:30:15").unwrap(),
            NaiveTime::from_hms_opt(19, 30, 15).unwrap()
        );
        assert!(parse_time("9pm").is_err());
    }

    #[test]
    fn weekday_lists_parse() {
        let days = parse_weekdays("mon, wed,fri").unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert!(parse_weekdays("mon,funday").is_err());
    }
}
