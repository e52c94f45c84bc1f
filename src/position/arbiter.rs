//! Fix arbitration
//!
//! Decides whether a freshly delivered fix should replace the one currently
//! trusted. Pure and deterministic: no clock, no I/O.

use super::PositionFix;

/// Age difference beyond which the newer fix wins regardless of accuracy
pub const SIGNIFICANT_AGE_MILLIS: i64 = 2 * 60 * 1000;

/// Accuracy loss (whole meters) tolerated for a newer fix from the same source
pub const SIGNIFICANT_ACCURACY_LOSS_METERS: i32 = 200;

/// Determine whether `candidate` should replace `trusted`
///
/// Rules, first match wins:
/// 1. No candidate never displaces anything.
/// 2. Any candidate beats no trusted fix.
/// 3. More than two minutes newer wins; more than two minutes older loses.
/// 4. Otherwise the candidate wins if it is more accurate, or newer and not
///    less accurate, or newer, from the same source and not significantly
///    less accurate.
///
/// The accuracy difference is truncated toward zero to whole meters before
/// any comparison, so sub-meter differences count as equal.
pub fn is_better_fix(candidate: Option<&PositionFix>, trusted: Option<&PositionFix>) -> bool {
    let Some(candidate) = candidate else {
        return false;
    };
    let Some(trusted) = trusted else {
        return true;
    };

    let age_delta = candidate
        .timestamp_millis
        .saturating_sub(trusted.timestamp_millis);

    if age_delta > SIGNIFICANT_AGE_MILLIS {
        return true;
    }
    if age_delta < -SIGNIFICANT_AGE_MILLIS {
        return false;
    }

    // `as` truncates toward zero (and maps NaN to 0)
    let accuracy_delta = (candidate.accuracy_meters - trusted.accuracy_meters) as i32;

    let is_newer = age_delta > 0;
    let is_less_accurate = accuracy_delta > 0;
    let is_more_accurate = accuracy_delta < 0;
    let is_significantly_less_accurate = accuracy_delta > SIGNIFICANT_ACCURACY_LOSS_METERS;
    let same_source = candidate.source_id == trusted.source_id;

    is_more_accurate
        || (is_newer && !is_less_accurate)
        || (is_newer && !is_significantly_less_accurate && same_source)
}
