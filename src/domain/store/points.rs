//! Points, streaks and reward operations.
//!
//! ## Business Rules
//! - `points` is the spendable balance, `total_points` the lifetime count;
//!   levels derive from lifetime points, so spending never demotes
//! - Daily login: the first call of a local day pays a fixed bonus; an
//!   exact yesterday match continues the streak, any gap restarts it at 1
//! - Gift cards spend points and mint a one-time redemption badge keyed
//!   by the card id
//! - Insufficient balance is a structured refusal, not an error

use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use log::{info, warn};

use crate::domain::achievements;
use crate::domain::commands::points::{
    AchievementCheckResult, DailyLoginResult, DeductPointsResult, PointAward,
    RedeemGiftCardCommand, RedeemGiftCardResult, StreakResult,
};
use crate::domain::models::{Badge, Child};
use crate::sync::{SyncTask, SyncTicket};

use super::{require_child_mut, require_user_mut, FamilyStore};

/// Bonus paid on the first login of each local day.
pub const STREAK_BONUS_POINTS: u32 = 25;

impl FamilyStore {
    /// Manual point grant (bonuses, appeasement). Raises both balances and
    /// re-runs the achievement check when a level boundary was crossed.
    pub fn add_points(&self, child_id: &str, delta: u32) -> Result<PointAward> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = Utc::now();

        let tasks_ref = &state.tasks;
        let child = state
            .current_user
            .as_mut()
            .ok_or_else(|| anyhow!("No user is signed in"))?
            .child_mut(child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;

        child.points = child.points.saturating_add(delta);
        child.total_points = child.total_points.saturating_add(delta);
        let level_before = child.level;
        child.level = Child::level_for(child.total_points);
        let level_up = child.level > level_before;

        let mut unlocked = Vec::new();
        if level_up {
            unlocked = achievements::check_achievements(child, tasks_ref, now);
            child.badges.extend(unlocked.iter().cloned());
            info!("🎉 {} leveled up to {}", child.name, child.level);
        }
        info!("💰 +{} points for {} (balance {})", delta, child.name, child.points);

        Ok(PointAward {
            points: child.points,
            total_points: child.total_points,
            level: child.level,
            level_up,
            unlocked_badges: unlocked,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Spend points. Refuses without mutating when the balance is short.
    /// Lifetime points and level are untouched either way.
    pub fn deduct_points(&self, child_id: &str, delta: u32) -> Result<DeductPointsResult> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;

        if child.points < delta {
            warn!(
                "Deduction of {} refused for {}: balance is {}",
                delta, child.name, child.points
            );
            return Ok(DeductPointsResult {
                success: false,
                new_balance: child.points,
                tickets: Vec::new(),
            });
        }

        child.points -= delta;
        info!("💸 -{} points for {} (balance {})", delta, child.name, child.points);
        Ok(DeductPointsResult {
            success: true,
            new_balance: child.points,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Redeem a reward card. Failures are structured so the redemption
    /// sheet can show `message` directly. The first redemption of a card
    /// mints its keepsake badge; redeeming the same card again only spends
    /// points.
    pub fn redeem_gift_card(&self, cmd: RedeemGiftCardCommand) -> Result<RedeemGiftCardResult> {
        {
            let state = self.state();
            let known = state
                .current_user
                .as_ref()
                .and_then(|u| u.child(&cmd.child_id))
                .is_some();
            if !known {
                return Ok(RedeemGiftCardResult {
                    success: false,
                    message: format!("Child not found: {}", cmd.child_id),
                    new_balance: 0,
                    badge: None,
                    tickets: Vec::new(),
                });
            }
        }

        let deduction = self.deduct_points(&cmd.child_id, cmd.cost)?;
        if !deduction.success {
            return Ok(RedeemGiftCardResult {
                success: false,
                message: format!(
                    "Not enough points for {} ({} needed)",
                    cmd.card_name, cmd.cost
                ),
                new_balance: deduction.new_balance,
                badge: None,
                tickets: Vec::new(),
            });
        }

        let badge_id = format!("gift-{}", cmd.card_id);
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, &cmd.child_id)?;

        let badge = if child.has_badge(&badge_id) {
            None
        } else {
            let badge = Badge {
                id: badge_id,
                child_id: cmd.child_id.clone(),
                name: cmd.card_name.clone(),
                description: format!("Redeemed {}", cmd.card_name),
                icon: "🎁".to_string(),
                earned_at: Utc::now(),
                redeemed: true,
            };
            child.badges.push(badge.clone());
            Some(badge)
        };

        info!("🎁 {} redeemed {} for {} points", child.name, cmd.card_name, cmd.cost);
        Ok(RedeemGiftCardResult {
            success: true,
            message: format!("Enjoy {}!", cmd.card_name),
            new_balance: deduction.new_balance,
            badge,
            tickets: deduction.tickets,
        })
    }

    pub fn increment_streak(&self, child_id: &str) -> Result<StreakResult> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;

        child.streak_days += 1;
        child.last_completed_date = Some(Local::now().date_naive());
        info!("🔥 {} is on a {}-day streak", child.name, child.streak_days);

        Ok(StreakResult {
            streak_days: child.streak_days,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    pub fn reset_streak(&self, child_id: &str) -> Result<StreakResult> {
        let mut state = self.state();
        let user = require_user_mut(&mut state)?;
        let child = require_child_mut(user, child_id)?;

        child.streak_days = 0;
        info!("Streak reset for {}", child.name);

        Ok(StreakResult {
            streak_days: 0,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Once-per-local-day login bonus and streak bookkeeping. The second
    /// call of the same day is a no-op answer, not an error.
    pub fn check_daily_login(&self, child_id: &str) -> Result<DailyLoginResult> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = Utc::now();
        let today = Local::now().date_naive();

        let tasks_ref = &state.tasks;
        let child = state
            .current_user
            .as_mut()
            .ok_or_else(|| anyhow!("No user is signed in"))?
            .child_mut(child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;

        if child.last_completed_date == Some(today) {
            return Ok(DailyLoginResult {
                is_new_day: false,
                bonus_awarded: false,
                streak_days: child.streak_days,
                tickets: Vec::new(),
            });
        }

        let continued = match (child.last_completed_date, today.pred_opt()) {
            (Some(last), Some(yesterday)) => last == yesterday,
            _ => false,
        };
        if continued {
            child.streak_days += 1;
        } else {
            child.streak_days = 1;
        }
        child.last_completed_date = Some(today);

        child.points = child.points.saturating_add(STREAK_BONUS_POINTS);
        child.total_points = child.total_points.saturating_add(STREAK_BONUS_POINTS);
        child.level = Child::level_for(child.total_points);

        let unlocked = achievements::check_achievements(child, tasks_ref, now);
        child.badges.extend(unlocked.iter().cloned());

        info!(
            "🔥 Daily login: {} is on day {} (+{} points)",
            child.name, child.streak_days, STREAK_BONUS_POINTS
        );

        Ok(DailyLoginResult {
            is_new_day: true,
            bonus_awarded: true,
            streak_days: child.streak_days,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }

    /// Explicit achievement sweep, for screens that want to surface newly
    /// earned badges without waiting for the next approval.
    pub fn check_achievements(&self, child_id: &str) -> Result<AchievementCheckResult> {
        let mut guard = self.state();
        let state = &mut *guard;
        let now = Utc::now();

        let tasks_ref = &state.tasks;
        let child = state
            .current_user
            .as_mut()
            .ok_or_else(|| anyhow!("No user is signed in"))?
            .child_mut(child_id)
            .ok_or_else(|| anyhow!("Child not found: {}", child_id))?;

        let unlocked = achievements::check_achievements(child, tasks_ref, now);
        if unlocked.is_empty() {
            return Ok(AchievementCheckResult { unlocked_badges: unlocked, tickets: Vec::new() });
        }

        child.badges.extend(unlocked.iter().cloned());
        info!("🏅 {} unlocked {} new badge(s)", child.name, unlocked.len());
        Ok(AchievementCheckResult {
            unlocked_badges: unlocked,
            tickets: vec![SyncTicket::new(SyncTask::PushChild {
                child_id: child_id.to_string(),
            })],
        })
    }
}
