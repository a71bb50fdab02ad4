//! Panic hook that gives the terminal back before printing

use std::io::{self, Write};
use std::panic;

use crossterm::{
    cursor::Show,
    event::{DisableMouseCapture, PopKeyboardEnhancementFlags},
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use log::error;

/// Install `better-panic` output behind a hook that first leaves raw mode
/// and records the panic in the log file.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Show crashed: {panic_info}");
        restore_terminal(true);

        default_hook(panic_info);

        std::process::exit(1);
    }));
}

/// Leave raw mode and the alternate screen, release the mouse and show the
/// cursor. Errors are ignored: this runs while tearing down.
pub fn restore_terminal(pop_keyboard_flags: bool) {
    let mut stdout = io::stdout();
    let _ = disable_raw_mode();
    if pop_keyboard_flags {
        let _ = execute!(stdout, PopKeyboardEnhancementFlags);
    }
    let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture, Show);
    let _ = stdout.flush();
}
