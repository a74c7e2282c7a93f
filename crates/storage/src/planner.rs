//! Size variant planning.
//!
//! Precedence: an explicit overwrite uses the caller's sizes alone; otherwise
//! module defaults come first, followed by caller sizes. The baseline width
//! is then guaranteed.

use crate::models::{REQUIRED_BASELINE_WIDTH, SizeSpec};

/// Compute the variants to produce for an upload.
///
/// `defaults` is the module-wide list from settings (`None` when settings
/// define none). Duplicates are kept; every entry is normalized.
pub fn plan_sizes(
    defaults: Option<Vec<SizeSpec>>,
    caller: Option<Vec<SizeSpec>>,
    overwrite_sizes: bool,
) -> Vec<SizeSpec> {
    let mut sizes = match (defaults, caller, overwrite_sizes) {
        (Some(defaults), None, false) => defaults,
        (Some(mut defaults), Some(caller), false) if !caller.is_empty() => {
            defaults.extend(caller);
            defaults
        }
        (Some(_), Some(caller), false) => caller,
        (_, caller, _) => caller.unwrap_or_default(),
    };

    if !sizes.iter().any(SizeSpec::is_baseline) {
        sizes.push(SizeSpec::width(REQUIRED_BASELINE_WIDTH));
    }

    sizes.into_iter().map(SizeSpec::normalized).collect()
}
