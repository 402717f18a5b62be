//! Entry comparators.

use std::cmp::Ordering;

use dirlist_core::{sort_suffix, RawEntry, SortMode, TypeFlags, CURRENT_DIR, PARENT_DIR};

/// Rank shared by every sort mode: plain directories, then containers, then
/// container categories, then files; "." and ".." lead their rank.
fn generic_key(entry: &RawEntry) -> (u8, u8) {
    let flags = entry.typeflags;
    let class = if !flags.is_dir() {
        3
    } else if flags.contains(TypeFlags::LIBRARY) {
        2
    } else if flags.contains(TypeFlags::ARCHIVE) {
        1
    } else {
        0
    };
    let pseudo = match entry.relpath.as_str() {
        CURRENT_DIR => 0,
        PARENT_DIR => 1,
        _ => 2,
    };
    (class, pseudo)
}

/// Compare two entries under a sort mode.
///
/// `SortMode::None` only applies the generic rank.
pub fn compare(mode: SortMode, a: &RawEntry, b: &RawEntry) -> Ordering {
    generic_key(a)
        .cmp(&generic_key(b))
        .then_with(|| match mode {
            SortMode::None => Ordering::Equal,
            SortMode::Name => natural_cmp(&a.name, &b.name),
            SortMode::Time => b
                .modified
                .cmp(&a.modified)
                .then_with(|| natural_cmp(&a.name, &b.name)),
            SortMode::Size => b
                .size
                .cmp(&a.size)
                .then_with(|| natural_cmp(&a.name, &b.name)),
            SortMode::Extension => compare_extension(a, b).then_with(|| natural_cmp(&a.name, &b.name)),
        })
}

fn compare_extension(a: &RawEntry, b: &RawEntry) -> Ordering {
    let a_lib = a.typeflags.contains(TypeFlags::LIBRARY);
    let b_lib = b.typeflags.contains(TypeFlags::LIBRARY);

    match (a_lib, b_lib) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => {
            // Objects before category directories, then by category code.
            a.is_dir()
                .cmp(&b.is_dir())
                .then_with(|| category_code(a).cmp(&category_code(b)))
        }
        (false, false) => {
            let sa = sort_suffix(&a.relpath).to_lowercase();
            let sb = sort_suffix(&b.relpath).to_lowercase();
            sa.cmp(&sb)
        }
    }
}

fn category_code(entry: &RawEntry) -> u8 {
    entry.category.map_or(0, |c| c.code())
}

/// Natural, case-insensitive string comparison: digit runs compare by value.
///
/// Strings equal under that rule fall back to a plain byte comparison so the
/// result is a total order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_cmp_folded(a, b).then_with(|| a.cmp(b))
}

fn natural_cmp_folded(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = compare_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = iter.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        iter.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
