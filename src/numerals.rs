//! Numeral conversions.
//!
//! Artwork titles cite chapters in Roman numerals (`Genesis XXII`), and
//! chapter headings render Hebrew numerals (`כ״ב`). Both conversions live
//! here.
//!
//! Roman decoding is strict: only the canonical subtractive form of a value
//! is accepted, so `XIV` decodes to 14 while `IIII`, `IC` or an English word
//! that happens to use Roman letters (`did`, `mild`) decode to `None`.
//! Decoding never panics.

const ROMAN_TABLE: &[(u32, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

fn roman_value(c: char) -> Option<u32> {
    match c.to_ascii_uppercase() {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    }
}

/// Decode a Roman numeral, case-insensitively.
///
/// Returns `None` for empty input, unknown symbols, or non-canonical forms.
pub fn roman_to_int(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut total: u32 = 0;
    let mut prev = 0;
    for c in s.chars().rev() {
        let v = roman_value(c)?;
        if v < prev {
            total = total.checked_sub(v)?;
        } else {
            total = total.checked_add(v)?;
        }
        prev = v;
    }
    if total == 0 {
        return None;
    }
    // Subtractive decoding accepts malformed runs; the canonical re-encoding rejects them.
    match int_to_roman(total) {
        Some(canonical) if canonical.eq_ignore_ascii_case(s) => Some(total),
        _ => None,
    }
}

/// Encode a value in `1..=3999` as an uppercase Roman numeral.
pub fn int_to_roman(mut n: u32) -> Option<String> {
    if n == 0 || n > 3999 {
        return None;
    }
    let mut out = String::new();
    for &(value, symbol) in ROMAN_TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    Some(out)
}

/// True if every character is a Roman numeral symbol.
pub fn is_roman_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| roman_value(c).is_some())
}

const HEBREW_ONES: [&str; 10] = ["", "א", "ב", "ג", "ד", "ה", "ו", "ז", "ח", "ט"];
const HEBREW_TENS: [&str; 10] = ["", "י", "כ", "ל", "מ", "נ", "ס", "ע", "פ", "צ"];
const HEBREW_HUNDREDS: [&str; 5] = ["", "ק", "ר", "ש", "ת"];

/// Render a chapter number as a Hebrew numeral with geresh/gershayim.
///
/// 15 and 16 use the traditional `ט״ו` / `ט״ז` forms. Values of 500 and
/// above fall back to Arabic digits.
pub fn hebrew_numeral(n: u32) -> String {
    if n == 0 || n >= 500 {
        return n.to_string();
    }
    let mut letters: Vec<&str> = Vec::new();
    letters.push(HEBREW_HUNDREDS[(n / 100) as usize]);
    let rest = n % 100;
    match rest {
        15 => letters.extend(["ט", "ו"]),
        16 => letters.extend(["ט", "ז"]),
        _ => {
            letters.push(HEBREW_TENS[(rest / 10) as usize]);
            letters.push(HEBREW_ONES[(rest % 10) as usize]);
        }
    }
    let letters: Vec<&str> = letters.into_iter().filter(|l| !l.is_empty()).collect();
    match letters.split_last() {
        Some((last, [])) => format!("{last}׳"),
        Some((last, init)) => format!("{}״{}", init.concat(), last),
        None => n.to_string(),
    }
}
