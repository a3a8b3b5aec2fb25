use rand::Rng;

/// Picks one index out of `weights` with probability proportional to its weight.
///
/// Non-positive and non-finite weights count as zero. An empty slice yields `None`; a
/// single candidate is returned without consuming randomness; when every weight is
/// zero the first candidate wins.
pub(crate) fn choose_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    match weights.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    let effective = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = weights.iter().copied().map(effective).sum();
    if total <= 0.0 {
        return Some(0);
    }

    let roll = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_viable = 0;
    for (index, weight) in weights.iter().copied().map(effective).enumerate() {
        if weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_viable = index;
        if roll < cumulative {
            return Some(index);
        }
    }
    // Only reachable through floating point rounding at the upper edge.
    Some(last_viable)
}
