use std::collections::HashSet;

use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::{AchievementDefinition, AttendanceStats, StagedAward};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    Streak,
    Total,
}

impl RequirementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementKind::Streak => "streak",
            RequirementKind::Total => "total",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub count: f64,
}

/// Parses a catalog requirement payload. Anything that does not amount to a
/// `{type: streak|total, count: <finite number>}` object is treated as
/// malformed and skipped by callers. Counts stored as numeric strings parse.
pub fn parse_requirement(raw: &Value) -> Option<Requirement> {
    let obj = raw.as_object()?;

    let kind = match obj.get("type")?.as_str()? {
        "streak" => RequirementKind::Streak,
        "total" => RequirementKind::Total,
        _ => return None,
    };

    let count = match obj.get("count")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !count.is_finite() {
        return None;
    }

    Some(Requirement { kind, count })
}

/// Stages awards for one attendee: every eligible definition whose metric is
/// met and which the user does not already hold.
pub fn stage_awards(
    definitions: &[AchievementDefinition],
    earned: &HashSet<String>,
    stats: AttendanceStats,
    user_id: &str,
    gym_id: Uuid,
) -> Vec<StagedAward> {
    let mut awards = Vec::new();

    for definition in definitions {
        let Some(requirement) = parse_requirement(&definition.requirement) else {
            continue;
        };

        let progress = match requirement.kind {
            RequirementKind::Streak => stats.current_streak,
            RequirementKind::Total => stats.total_classes,
        };

        if (progress as f64) < requirement.count {
            continue;
        }
        if earned.contains(&definition.id) {
            continue;
        }

        awards.push(StagedAward {
            user_id: user_id.to_string(),
            gym_id,
            achievement_type: definition.id.clone(),
            data: json!({
                "progress": progress,
                "requirementType": requirement.kind.as_str(),
                "requirementTarget": requirement.count,
            }),
        });
    }

    awards
}

/// Runs the evaluation for a just-finished class: dedupes attendees, stages
/// awards against the live catalog, and batch-inserts them. Conflicting rows
/// from a concurrent evaluation are dropped by the insert, so re-running for
/// the same class is a no-op. Returns the number of awards actually written.
pub async fn evaluate_finished_class(
    pool: &PgPool,
    gym_id: Uuid,
    attendee_ids: &[String],
) -> anyhow::Result<u64> {
    let unique_ids: Vec<&String> = {
        let mut seen = HashSet::new();
        attendee_ids.iter().filter(|id| seen.insert(*id)).collect()
    };

    if unique_ids.is_empty() {
        return Ok(0);
    }

    let definitions = db::fetch_achievement_definitions(pool).await?;
    let eligible: Vec<AchievementDefinition> = definitions
        .into_iter()
        .filter(|d| parse_requirement(&d.requirement).is_some())
        .collect();

    if eligible.is_empty() {
        return Ok(0);
    }

    let mut staged = Vec::new();
    for user_id in unique_ids {
        let (earned, dates) = tokio::try_join!(
            db::fetch_earned_achievement_types(pool, gym_id, user_id),
            db::fetch_attendance_dates(pool, gym_id, user_id),
        )?;
        let stats = crate::attendance::compute_stats(&dates, chrono::Local::now().date_naive());

        staged.extend(stage_awards(&eligible, &earned, stats, user_id, gym_id));
    }

    if staged.is_empty() {
        return Ok(0);
    }

    let written = db::insert_awards(pool, &staged).await?;
    if written > 0 {
        log::info!("awarded {written} achievements for gym {gym_id}");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str, requirement: Value) -> AchievementDefinition {
        AchievementDefinition {
            id: id.to_string(),
            name: id.to_string(),
            category: "attendance".to_string(),
            requirement,
        }
    }

    fn gym() -> Uuid {
        Uuid::nil()
    }

    #[test]
    fn parses_valid_requirements() {
        let req = parse_requirement(&json!({"type": "total", "count": 10})).unwrap();
        assert_eq!(req.kind, RequirementKind::Total);
        assert_eq!(req.count, 10.0);

        let req = parse_requirement(&json!({"type": "streak", "count": 5})).unwrap();
        assert_eq!(req.kind, RequirementKind::Streak);
    }

    #[test]
    fn numeric_string_counts_parse() {
        let req = parse_requirement(&json!({"type": "total", "count": "25"})).unwrap();
        assert_eq!(req.count, 25.0);
    }

    #[test]
    fn malformed_requirements_are_rejected() {
        assert!(parse_requirement(&json!({})).is_none());
        assert!(parse_requirement(&json!(null)).is_none());
        assert!(parse_requirement(&json!({"type": "belt", "count": 3})).is_none());
        assert!(parse_requirement(&json!({"type": "total"})).is_none());
        assert!(parse_requirement(&json!({"type": "total", "count": "lots"})).is_none());
        assert!(parse_requirement(&json!({"type": "total", "count": true})).is_none());
    }

    #[test]
    fn stages_award_when_total_is_met() {
        let defs = vec![definition("ten-classes", json!({"type": "total", "count": 10}))];
        let stats = AttendanceStats {
            total_classes: 10,
            current_streak: 3,
        };
        let awards = stage_awards(&defs, &HashSet::new(), stats, "u1", gym());
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].achievement_type, "ten-classes");
        assert_eq!(awards[0].data["progress"], json!(10));
        assert_eq!(awards[0].data["requirementType"], json!("total"));
        assert_eq!(awards[0].data["requirementTarget"], json!(10.0));
    }

    #[test]
    fn stages_nothing_below_streak_target() {
        let defs = vec![definition("week-streak", json!({"type": "streak", "count": 5}))];
        let stats = AttendanceStats {
            total_classes: 10,
            current_streak: 3,
        };
        let awards = stage_awards(&defs, &HashSet::new(), stats, "u1", gym());
        assert!(awards.is_empty());
    }

    #[test]
    fn already_earned_achievements_are_not_restaged() {
        let defs = vec![definition("ten-classes", json!({"type": "total", "count": 10}))];
        let stats = AttendanceStats {
            total_classes: 40,
            current_streak: 0,
        };
        let earned: HashSet<String> = ["ten-classes".to_string()].into_iter().collect();
        assert!(stage_awards(&defs, &earned, stats, "u1", gym()).is_empty());
    }

    #[test]
    fn malformed_catalog_entries_are_skipped_not_fatal() {
        let defs = vec![
            definition("broken", json!({"type": "total"})),
            definition("first-class", json!({"type": "total", "count": 1})),
        ];
        let stats = AttendanceStats {
            total_classes: 1,
            current_streak: 1,
        };
        let awards = stage_awards(&defs, &HashSet::new(), stats, "u1", gym());
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].achievement_type, "first-class");
    }
}
