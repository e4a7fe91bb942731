/// Height of a big glyph in rows
pub const GLYPH_ROWS: usize = 5;

fn glyph(c: char) -> [&'static str; GLYPH_ROWS] {
    match c {
        '0' => ["███", "█ █", "█ █", "█ █", "███"],
        '1' => ["  █", "  █", "  █", "  █", "  █"],
        '2' => ["███", "  █", "███", "█  ", "███"],
        '3' => ["███", "  █", "███", "  █", "███"],
        '4' => ["█ █", "█ █", "███", "  █", "  █"],
        '5' => ["███", "█  ", "███", "  █", "███"],
        '6' => ["███", "█  ", "███", "█ █", "███"],
        '7' => ["███", "  █", "  █", "  █", "  █"],
        '8' => ["███", "█ █", "███", "█ █", "███"],
        '9' => ["███", "█ █", "███", "  █", "███"],
        ':' => [" ", "█", " ", "█", " "],
        _ => ["   ", "   ", "   ", "   ", "   "],
    }
}

/// Render `MM:SS` as block digits, one string per row
pub fn big_lines(clock: &str) -> Vec<String> {
    (0..GLYPH_ROWS)
        .map(|row| {
            clock
                .chars()
                .map(|c| glyph(c)[row])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Display width of the big rendering
pub fn big_width(clock: &str) -> usize {
    big_lines(clock)
        .first()
        .map(|row| row.chars().count())
        .unwrap_or(0)
}
