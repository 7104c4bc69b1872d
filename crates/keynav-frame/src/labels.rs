//! Hint labels.
//!
//! Labels are fixed width within a frame: with `n` candidates and an
//! alphabet of `b` characters, every label has the smallest width `w` with
//! `b^w >= n`, and label `i` spells `i` in base `b`.

/// Label width needed for `count` labels over an alphabet of `base`.
pub fn label_width(count: usize, base: usize) -> usize {
    if base < 2 {
        return count.max(1);
    }
    let mut width = 1;
    let mut capacity = base;
    while capacity < count {
        width += 1;
        capacity = capacity.saturating_mul(base);
    }
    width
}

/// `count` labels over `alphabet`, in position order.
pub fn generate(count: usize, alphabet: &[char]) -> Vec<String> {
    if count == 0 || alphabet.is_empty() {
        return Vec::new();
    }
    let base = alphabet.len();
    if base == 1 {
        return (1..=count).map(|n| alphabet[0].to_string().repeat(n)).collect();
    }
    let width = label_width(count, base);
    (0..count)
        .map(|mut n| {
            let mut digits = vec![alphabet[0]; width];
            for slot in digits.iter_mut().rev() {
                *slot = alphabet[n % base];
                n /= base;
            }
            digits.into_iter().collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vec<char> {
        vec!['a', 'b', 'c']
    }

    #[test]
    fn width_grows_with_count() {
        assert_eq!(label_width(1, 3), 1);
        assert_eq!(label_width(3, 3), 1);
        assert_eq!(label_width(4, 3), 2);
        assert_eq!(label_width(9, 3), 2);
        assert_eq!(label_width(10, 3), 3);
    }

    #[test]
    fn single_width_labels() {
        assert_eq!(generate(3, &abc()), vec!["a", "b", "c"]);
    }

    #[test]
    fn fixed_width_labels() {
        let labels = generate(5, &abc());
        assert_eq!(labels, vec!["aa", "ab", "ac", "ba", "bb"]);
        assert!(labels.iter().all(|l| l.len() == 2));
    }

    #[test]
    fn labels_are_unique() {
        let labels = generate(100, &['x', 'y', 'z', 'w']);
        let mut sorted = labels.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 100);
    }

    #[test]
    fn empty_cases() {
        assert!(generate(0, &abc()).is_empty());
        assert!(generate(4, &[]).is_empty());
    }
}
