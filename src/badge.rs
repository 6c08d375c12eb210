//! SVG score badge.
//!
//! A small shields-style badge rendered as an SVG string: grade letter,
//! overall score, and one bar per category. Output is a pure function of the
//! [`ScoreResult`], so equal inputs produce byte-identical badges and the
//! artifact can be cached or diffed.

use std::fmt::Write;

use crate::score::{Grade, ScoreResult};

const BADGE_WIDTH: u32 = 220;
const BAR_HEIGHT: u32 = 6;
const BAR_GAP: u32 = 10;
const HEADER_HEIGHT: u32 = 36;
const PADDING: u32 = 12;

/// Fill color for a grade band.
fn grade_color(grade: Grade) -> &'static str {
    match grade {
        Grade::APlus | Grade::A | Grade::AMinus => "#4c1",
        Grade::BPlus | Grade::B | Grade::BMinus => "#a3c51c",
        Grade::CPlus | Grade::C | Grade::CMinus => "#dfb317",
        Grade::DPlus | Grade::D | Grade::DMinus => "#fe7d37",
        Grade::F => "#e05d44",
    }
}

/// Render the badge. Infallible; writing into a String cannot fail.
pub fn render(score: &ScoreResult) -> String {
    let bar_area = score.categories.len() as u32 * (BAR_HEIGHT + BAR_GAP);
    let height = HEADER_HEIGHT + bar_area + PADDING;
    let color = grade_color(score.grade);
    let bar_width = BADGE_WIDTH - 2 * PADDING;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img" aria-label="manifest score {overall} grade {grade}">"#,
        w = BADGE_WIDTH,
        h = height,
        overall = score.overall,
        grade = score.grade,
    );
    let _ = write!(
        svg,
        r##"<rect width="{w}" height="{h}" rx="4" fill="#2b2b2b"/>"##,
        w = BADGE_WIDTH,
        h = height,
    );
    let _ = write!(
        svg,
        r#"<text x="{x}" y="24" font-family="Verdana,DejaVu Sans,sans-serif" font-size="16" font-weight="bold" fill="{color}">{grade}</text>"#,
        x = PADDING,
        color = color,
        grade = score.grade,
    );
    let _ = write!(
        svg,
        r##"<text x="{x}" y="24" text-anchor="end" font-family="Verdana,DejaVu Sans,sans-serif" font-size="14" fill="#ffffff">{overall}/100</text>"##,
        x = BADGE_WIDTH - PADDING,
        overall = score.overall,
    );

    for (idx, category) in score.categories.iter().enumerate() {
        let y = HEADER_HEIGHT + idx as u32 * (BAR_HEIGHT + BAR_GAP);
        // Track, then fill proportional to the category score.
        let filled = (bar_width as f64 * category.score / 100.0).round() as u32;
        let _ = write!(
            svg,
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="2" fill="#444444"/>"##,
            x = PADDING,
            y = y,
            w = bar_width,
            h = BAR_HEIGHT,
        );
        if filled > 0 {
            let _ = write!(
                svg,
                r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="2" fill="{color}"/>"#,
                x = PADDING,
                y = y,
                w = filled,
                h = BAR_HEIGHT,
                color = color,
            );
        }
        let _ = write!(
            svg,
            r#"<title>{}: {:.2}</title>"#,
            category.category.as_str(),
            category.score,
        );
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{ScoreResult, COMPOSE_WEIGHTS};

    #[test]
    fn test_badge_is_deterministic() {
        let score = ScoreResult::perfect(&COMPOSE_WEIGHTS);
        assert_eq!(render(&score), render(&score.clone()));
    }

    #[test]
    fn test_badge_carries_grade_and_score() {
        let perfect = render(&ScoreResult::perfect(&COMPOSE_WEIGHTS));
        assert!(perfect.starts_with("<svg"));
        assert!(perfect.ends_with("</svg>"));
        assert!(perfect.contains("100/100"));
        assert!(perfect.contains(">A+</text>"));
        assert!(perfect.contains("#4c1"));

        let failed = render(&ScoreResult::zeroed(&COMPOSE_WEIGHTS));
        assert!(failed.contains("0/100"));
        assert!(failed.contains(">F</text>"));
        assert!(failed.contains("#e05d44"));
    }

    #[test]
    fn test_one_bar_per_category() {
        let svg = render(&ScoreResult::perfect(&COMPOSE_WEIGHTS));
        assert_eq!(svg.matches("<title>").count(), COMPOSE_WEIGHTS.entries().len());
    }
}
