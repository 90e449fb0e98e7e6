fn group_digits(int_part: &str, separator: char) -> String {
    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

/// Format an amount in the given currency.
///
/// Rupiah has no minor unit and groups with dots: `Rp 1.234.567`.
/// Everything else keeps two decimals and comma grouping: `USD 1,234.56`.
pub fn money(val: f64, currency: &str) -> String {
    let sign = if val < 0.0 { "-" } else { "" };
    let abs = val.abs();

    if currency.eq_ignore_ascii_case("IDR") {
        let whole = format!("{:.0}", abs);
        if whole == "0" {
            return "Rp 0".to_string();
        }
        return format!("{sign}Rp {}", group_digits(&whole, '.'));
    }

    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));
    format!("{sign}{} {}.{dec_part}", currency.to_uppercase(), group_digits(int_part, ','))
}

pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
