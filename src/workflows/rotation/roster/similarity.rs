/// Case-insensitive edit distance between two names.
pub(crate) fn levenshtein(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.to_lowercase().chars().collect();
    let right: Vec<char> = right.to_lowercase().chars().collect();

    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];

    for (i, left_char) in left.iter().enumerate() {
        current[0] = i + 1;
        for (j, right_char) in right.iter().enumerate() {
            let cost = usize::from(left_char != right_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

/// Flags likely typos or renames between an imported name and an existing one.
///
/// Names equal ignoring case are the same member, not "similar".
pub(crate) fn are_similar(candidate: &str, existing: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let existing = existing.to_lowercase();
    if candidate == existing {
        return false;
    }

    let distance = levenshtein(&candidate, &existing);
    let longest = candidate.chars().count().max(existing.chars().count());
    let similarity = 1.0 - distance as f64 / longest as f64;
    if similarity >= 0.7 || distance <= 3 {
        return true;
    }

    let contains = candidate.contains(&existing) || existing.contains(&candidate);
    contains && candidate.chars().count() >= 3 && existing.chars().count() >= 3
}
