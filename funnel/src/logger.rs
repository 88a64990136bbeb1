use logforth::{
    append::Stderr,
    layout::{JsonLayout, TextLayout},
};

use crate::args::{Args, LogStyle};

/// Initializes logging to stderr. Stdout is reserved for the MCP wire
/// protocol and must never receive a log line.
pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| {
            let d = d.filter(args.log_level.env_filter());

            match args.log_style {
                LogStyle::Color => d.append(Stderr::default().with_layout(TextLayout::default())),
                LogStyle::Text => d.append(Stderr::default().with_layout(TextLayout::default().no_color())),
                LogStyle::Json => d.append(Stderr::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();
}
