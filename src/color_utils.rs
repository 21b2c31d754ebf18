// File: ./src/color_utils.rs

// Tag color palette and contrast helpers.
// No UI dependencies: callers only get hex strings back.

/// Palette offered for tags: a vibrant row followed by a muted/pastel row.
pub const TAG_COLORS: [&str; 32] = [
    "#EF4444", "#F97316", "#F59E0B", "#EAB308", "#84CC16", "#22C55E", "#10B981", "#14B8A6",
    "#06B6D4", "#0EA5E9", "#3B82F6", "#6366F1", "#8B5CF6", "#A855F7", "#D946EF", "#EC4899",
    "#FCA5A5", "#FDBA74", "#FCD34D", "#FDE047", "#BEF264", "#86EFAC", "#6EE7B7", "#5EEAD4",
    "#67E8F9", "#7DD3FC", "#93C5FD", "#A5B4FC", "#C4B5FD", "#D8B4FE", "#F0ABFC", "#F9A8D4",
];

/// Picks a random palette color, preferring ones not in `existing`.
/// Falls back to the whole palette when every color is taken.
pub fn pick_tag_color(existing: &[&str]) -> &'static str {
    let available: Vec<&'static str> = TAG_COLORS
        .iter()
        .copied()
        .filter(|c| !existing.iter().any(|e| e.eq_ignore_ascii_case(c)))
        .collect();

    if available.is_empty() {
        TAG_COLORS[fastrand::usize(..TAG_COLORS.len())]
    } else {
        available[fastrand::usize(..available.len())]
    }
}

/// Parse a hex color string like "#RRGGBB" or "RRGGBB" into u8 tuple.
pub fn parse_hex_to_u8(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Normalizes user input to `#RRGGBB` (uppercase), or `None` if it isn't a color.
pub fn normalize_hex(hex: &str) -> Option<String> {
    let (r, g, b) = parse_hex_to_u8(hex.trim())?;
    Some(format!("#{:02X}{:02X}{:02X}", r, g, b))
}

/// Determines if text on top of this color should be black or white.
pub fn is_dark(r: f32, g: f32, b: f32) -> bool {
    // Perceptual luminance approximation
    let brightness = 0.299 * r + 0.587 * g + 0.114 * b;
    brightness < 0.5
}

/// Text color (`#000000` or `#FFFFFF`) readable on the given background.
pub fn contrast_text_color(background: &str) -> &'static str {
    match parse_hex_to_u8(background) {
        Some((r, g, b)) if is_dark(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0) => {
            "#FFFFFF"
        }
        _ => "#000000",
    }
}

/// `label` rendered as a colored terminal badge (24-bit ANSI).
/// Unparseable colors leave the label plain.
pub fn ansi_badge(label: &str, background: &str) -> String {
    let Some((r, g, b)) = parse_hex_to_u8(background) else {
        return label.to_string();
    };
    let fg = if contrast_text_color(background) == "#FFFFFF" {
        "255;255;255"
    } else {
        "0;0;0"
    };
    format!("\x1b[48;2;{};{};{}m\x1b[38;2;{}m {} \x1b[0m", r, g, b, fg, label)
}
