use anyhow::bail;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Gi,
    NoGi,
    Kids,
    OpenMat,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Gi => "gi",
            Modality::NoGi => "no_gi",
            Modality::Kids => "kids",
            Modality::OpenMat => "open_mat",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "gi" => Ok(Modality::Gi),
            "no_gi" | "nogi" => Ok(Modality::NoGi),
            "kids" => Ok(Modality::Kids),
            "open_mat" => Ok(Modality::OpenMat),
            other => bail!("unknown modality: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
    Active,
    Finished,
    Cancelled,
}

impl ClassStatus {
    /// Finished and cancelled are terminal; only active classes may change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClassStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Active => "active",
            ClassStatus::Finished => "finished",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "active" => Ok(ClassStatus::Active),
            "finished" => Ok(ClassStatus::Finished),
            "cancelled" => Ok(ClassStatus::Cancelled),
            other => bail!("unknown class status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceSource {
    QrCode,
    Manual,
}

impl AttendanceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceSource::QrCode => "qr_code",
            AttendanceSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => bail!("unknown billing cycle: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub start_at: NaiveTime,
    pub end_at: NaiveTime,
    pub modality: Modality,
    pub capacity: Option<i32>,
    pub coach_name: Option<String>,
    pub status: ClassStatus,
    pub qr_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassWithAttendances {
    pub class: ClassRecord,
    pub attendee_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    pub requirement: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceStats {
    pub total_classes: i64,
    pub current_streak: i64,
}

#[derive(Debug, Clone)]
pub struct StagedAward {
    pub user_id: String,
    pub gym_id: Uuid,
    pub achievement_type: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct MembershipBilling {
    pub id: Uuid,
    pub status: String,
    pub next_billing_date: Option<NaiveDate>,
    pub billing_cycle: Option<BillingCycle>,
}

#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub name: String,
    pub attendances: i64,
}

#[derive(Debug, Clone)]
pub struct BeltProgress {
    pub belt: Option<String>,
    pub required_classes: Option<i32>,
    pub total_classes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_round_trips() {
        for raw in ["gi", "no_gi", "kids", "open_mat"] {
            assert_eq!(Modality::parse(raw).unwrap().as_str(), raw);
        }
        assert_eq!(Modality::parse("nogi").unwrap(), Modality::NoGi);
        assert!(Modality::parse("judo").is_err());
    }

    #[test]
    fn only_active_classes_are_mutable() {
        assert!(!ClassStatus::Active.is_terminal());
        assert!(ClassStatus::Finished.is_terminal());
        assert!(ClassStatus::Cancelled.is_terminal());
    }

    #[test]
    fn billing_cycle_rejects_unknown() {
        assert_eq!(BillingCycle::parse("monthly").unwrap(), BillingCycle::Monthly);
        assert_eq!(BillingCycle::parse("yearly").unwrap(), BillingCycle::Yearly);
        assert!(BillingCycle::parse("weekly").is_err());
    }
}
