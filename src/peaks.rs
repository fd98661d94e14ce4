/*!
 * Plateau-tolerant local maxima detection.
 *
 * Word boundaries are inferred from a numeric series (inter-onset durations
 * of the recognized phoneme stream). A plain `v[i-1] < v[i] > v[i+1]` scan
 * misses maxima that sit on flat runs, so the scan widens each candidate to
 * its full plateau and compares against the values just outside it.
 */

/// Returns the indices of the plateau-tolerant local maxima of `v`.
///
/// A plateau counts as a peak when the values on both sides of it are
/// strictly lower; the reported index is the middle of the plateau, ties
/// settling on the even index. The first and last index are always included
/// as sentinels. The scan jumps past each processed plateau, so long flat
/// runs terminate in one step and no index is emitted twice.
pub fn level_peaks(v: &[f64]) -> Vec<usize> {
    if v.is_empty() {
        return Vec::new();
    }
    let mut peaks = vec![0];

    let mut i = 1;
    while i < v.len() - 1 {
        let mut pos_left = i;
        let mut pos_right = i;

        while v[pos_left] == v[i] && pos_left > 0 {
            pos_left -= 1;
        }
        while v[pos_right] == v[i] && pos_right < v.len() - 1 {
            pos_right += 1;
        }

        let is_upper_peak = v[pos_left] < v[i] && v[i] > v[pos_right];
        if is_upper_peak {
            peaks.push(plateau_mid(pos_left, pos_right));
        }

        i = if pos_right > i { pos_right } else { i + 1 };
    }

    if v.len() > 1 {
        peaks.push(v.len() - 1);
    }
    peaks.dedup();
    peaks
}

/// Middle index between the exclusive plateau boundaries, rounding a
/// half-way tie to the even index.
fn plateau_mid(left: usize, right: usize) -> usize {
    let sum = left + right;
    if sum % 2 == 0 {
        sum / 2
    } else {
        let low = sum / 2;
        if (low + 1) % 2 == 0 { low + 1 } else { low }
    }
}
