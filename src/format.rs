const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Placeholder shown when a row carries no usable size.
pub const SIZE_UNKNOWN: &str = "N/A";

/// Human readable size using binary (1024-based) units.
///
/// Absent and zero sizes render as [`SIZE_UNKNOWN`]. Fractions use Rust's
/// float formatting, which rounds the exact binary value half-to-even.
pub fn format_size(bytes: Option<u64>) -> String {
    let bytes = match bytes {
        Some(bytes) if bytes > 0 => bytes,
        _ => return SIZE_UNKNOWN.to_string(),
    };

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else if bytes < GIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_zero_is_unknown() {
        assert_eq!(format_size(None), "N/A");
        assert_eq!(format_size(Some(0)), "N/A");
    }

    #[test]
    fn picks_unit_by_binary_threshold() {
        assert_eq!(format_size(Some(512)), "512 B");
        assert_eq!(format_size(Some(1023)), "1023 B");
        assert_eq!(format_size(Some(1024)), "1.0 KB");
        assert_eq!(format_size(Some(2048)), "2.0 KB");
        assert_eq!(format_size(Some(1_572_864)), "1.5 MB");
        assert_eq!(format_size(Some(2_147_483_648)), "2.00 GB");
    }

    #[test]
    fn gigabytes_keep_two_decimals() {
        assert_eq!(format_size(Some(GIB)), "1.00 GB");
        assert_eq!(format_size(Some(GIB * 3 + GIB / 4)), "3.25 GB");
    }
}
