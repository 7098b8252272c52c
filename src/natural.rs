use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two names, treating runs of ASCII digits as integers so that
/// `slide2.xml` sorts before `slide10.xml`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let ord = compare_digit_runs(&left, &right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                a.next();
                b.next();
                if x != y {
                    return x.cmp(&y);
                }
            }
        }
    }
}

/// Sort `items` in natural order of the name `key` extracts.
pub fn sort_natural<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|x, y| natural_cmp(key(x), key(y)));
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

// Compared as text so arbitrarily long runs never overflow. Equal values with
// more leading zeros sort later.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}
