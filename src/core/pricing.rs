// Tiered registration pricing

use chrono::{Datelike, NaiveDateTime};

/// Flat shirt add-on, applied iff the registrant opts in.
pub const SHIRT_FEE: u32 = 40;

/// Calendar cutoffs for the registration fee, each inclusive through the
/// end of the named day (a submission made at any time on the boundary
/// date still receives that tier's price).
const FEE_TIERS: [((i32, u32, u32), u32); 4] = [
    ((2025, 12, 31), 150),
    ((2026, 1, 15), 170),
    ((2026, 1, 30), 180),
    ((2026, 2, 10), 200),
];

/// Price after the last cutoff. Late registrations are not rejected; they
/// pay the final tier.
const LATE_FEE: u32 = 200;

/// Tier price for a submission made at `now` (local wall-clock).
pub fn registration_fee(now: NaiveDateTime) -> u32 {
    let day = (now.year(), now.month(), now.day());
    FEE_TIERS
        .iter()
        .find(|(cutoff, _)| day <= *cutoff)
        .map(|(_, fee)| *fee)
        .unwrap_or(LATE_FEE)
}

/// Shirt charge for a submission.
pub fn shirt_fee(wants_shirt: bool) -> u32 {
    if wants_shirt {
        SHIRT_FEE
    } else {
        0
    }
}

/// Total owed: tier price plus shirt add-on when opted in.
pub fn total_fee(now: NaiveDateTime, wants_shirt: bool) -> u32 {
    registration_fee(now) + shirt_fee(wants_shirt)
}
