//! Admission rules for a submission, given the records already stored for
//! the same `(campaign, identity)`.
//!
//! The decision itself is a pure function. Atomicity comes from the store:
//! the slot returned by [`GuardDecision::Admit`] is inserted under a unique
//! `(campaign_id, identity_key, use_slot)` constraint, so two racing
//! submissions cannot both claim it.

use crate::models::Participation;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Create a new pending record in this slot.
    Admit { use_slot: u32 },
    /// An unspun record already exists; reuse it instead of inserting again.
    Resume(Participation),
    /// Limit reached; surface the most recent outcome.
    AlreadyParticipated(Participation),
}

pub fn decide(existing: &[Participation], max_uses_per_identity: u32) -> GuardDecision {
    if let Some(pending) = existing.iter().find(|p| !p.has_spun) {
        return GuardDecision::Resume(pending.clone());
    }

    let used = u32::try_from(existing.len()).unwrap_or(u32::MAX);
    if used >= max_uses_per_identity.max(1)
        && let Some(latest) = existing
            .iter()
            .filter(|p| p.has_spun)
            .max_by_key(|p| (p.spun_at, p.use_slot))
    {
        return GuardDecision::AlreadyParticipated(latest.clone());
    }

    // 第一个未被占用的名额
    let use_slot = (0..=used)
        .find(|slot| existing.iter().all(|p| p.use_slot != *slot))
        .unwrap_or(used);
    GuardDecision::Admit { use_slot }
}
