use chrono::{Months, NaiveDate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::BillingCycle;

/// Computes the next billing anchor after a payment. The base is clamped to
/// today so a stale overdue anchor never produces another date in the past,
/// while an anchor still in the future keeps its cycle-day alignment.
pub fn roll_next_billing(
    today: NaiveDate,
    current: Option<NaiveDate>,
    cycle: BillingCycle,
) -> NaiveDate {
    let base = current.map_or(today, |anchor| anchor.max(today));
    match cycle {
        BillingCycle::Monthly => base + Months::new(1),
        BillingCycle::Yearly => base + Months::new(12),
    }
}

/// Flips every active membership with a due billing date to past_due. Rows
/// are independent: a failed update is logged and the sweep moves on.
pub async fn sweep_overdue_memberships(pool: &PgPool, today: NaiveDate) -> anyhow::Result<u64> {
    let overdue = db::fetch_overdue_membership_ids(pool, today).await?;
    let mut updated = 0u64;

    for id in overdue {
        match db::mark_membership_past_due(pool, id).await {
            Ok(()) => updated += 1,
            Err(err) => log::warn!("failed to mark membership {id} past_due: {err:#}"),
        }
    }

    Ok(updated)
}

/// Admin marks a membership paid: recompute the anchor from the plan's cycle
/// (monthly when the plan is gone) and set the membership active again.
/// Returns the status the membership held before the payment and the new
/// billing anchor.
pub async fn mark_membership_paid(
    pool: &PgPool,
    membership_id: Uuid,
    gym_id: Uuid,
    today: NaiveDate,
) -> anyhow::Result<(String, NaiveDate)> {
    let membership = db::fetch_membership_billing(pool, membership_id, gym_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("student membership not found for this gym"))?;

    let cycle = membership.billing_cycle.unwrap_or(BillingCycle::Monthly);
    let next_billing = roll_next_billing(today, membership.next_billing_date, cycle);

    db::update_membership_paid(pool, membership_id, next_billing).await?;
    Ok((membership.status, next_billing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn stale_anchor_is_clamped_to_today() {
        let today = day(2024, 5, 15);
        let stale = Some(day(2024, 3, 15));
        assert_eq!(
            roll_next_billing(today, stale, BillingCycle::Monthly),
            day(2024, 6, 15)
        );
    }

    #[test]
    fn future_anchor_keeps_cycle_alignment() {
        let today = day(2024, 5, 10);
        let ahead = Some(day(2024, 5, 20));
        assert_eq!(
            roll_next_billing(today, ahead, BillingCycle::Monthly),
            day(2024, 6, 20)
        );
    }

    #[test]
    fn missing_anchor_rolls_from_today() {
        let today = day(2024, 5, 10);
        assert_eq!(
            roll_next_billing(today, None, BillingCycle::Monthly),
            day(2024, 6, 10)
        );
    }

    #[test]
    fn yearly_cycle_adds_a_year() {
        let today = day(2024, 5, 10);
        assert_eq!(
            roll_next_billing(today, Some(day(2024, 7, 1)), BillingCycle::Yearly),
            day(2025, 7, 1)
        );
    }

    #[test]
    fn month_end_anchors_clamp_to_shorter_months() {
        let today = day(2025, 1, 31);
        assert_eq!(
            roll_next_billing(today, None, BillingCycle::Monthly),
            day(2025, 2, 28)
        );
    }
}
