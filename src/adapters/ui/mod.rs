pub mod banner;
pub mod progress;
pub mod tui;

/// Print the banner and apply the prompt theme. Call once at startup.
pub fn init_ui(provider: &str) {
    banner::print_welcome(provider);
    tui::apply_theme();
}
