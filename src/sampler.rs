//! Power-of-two downsample factor selection.

/// Largest power-of-two factor that keeps both halved dimensions above the
/// target, so the decoded image stays at least as large as requested.
///
/// Returns 1 when the source already fits, including degenerate zero sizes.
pub fn compute_sample_factor(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> u32 {
    let mut factor = 1u32;
    if src_h > target_h || src_w > target_w {
        let half_h = src_h / 2;
        let half_w = src_w / 2;
        // factor never exceeds half_h, so doubling cannot overflow
        while half_h / factor > target_h && half_w / factor > target_w {
            factor *= 2;
        }
    }
    factor
}
