//! Startup banner: "TG-PERSONA" in figlet letters with a vertical gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

const TITLE: &str = "TG-PERSONA";

/// Telegram blue (#229ed9).
const TG_BLUE: (u8, u8, u8) = (0x22, 0x9e, 0xd9);
/// Soft mint (#7cf5c4).
const MINT: (u8, u8, u8) = (0x7c, 0xf5, 0xc4);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |x: u8, y: u8| (f64::from(x) * (1.0 - t) + f64::from(y) * t).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn render_title() -> Option<String> {
    let font = FIGfont::standard().ok()?;
    Some(font.convert(TITLE)?.to_string())
}

/// Print the banner, the version and the active provider.
pub fn print_welcome(provider: &str) {
    let mut out = stdout();
    let art = render_title().unwrap_or_else(|| TITLE.to_string());
    let lines: Vec<&str> = art.lines().collect();
    let last = lines.len().saturating_sub(1).max(1);

    for (i, line) in lines.iter().enumerate() {
        let (r, g, b) = lerp_rgb(TG_BLUE, MINT, i as f64 / last as f64);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
    }

    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: MINT.0,
        g: MINT.1,
        b: MINT.2,
    }));
    let _ = out.execute(Print(format!(
        "v{} · replies as you · AI provider: {}\r\n\r\n",
        env!("CARGO_PKG_VERSION"),
        provider
    )));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(lerp_rgb(TG_BLUE, MINT, 0.0), TG_BLUE);
        assert_eq!(lerp_rgb(TG_BLUE, MINT, 1.0), MINT);
    }

    #[test]
    fn test_title_renders_multiline() {
        let art = render_title().unwrap();
        assert!(art.lines().count() > 1);
    }
}
