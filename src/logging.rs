use std::fmt::Display;

use colored::Colorize;
use log::Level;

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub fn init_logger() -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(|meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = ALLOWED_LEVELS.contains(&meta.level());
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
}

enum Target {
    External(String),
    /// sqlx, reporting on the gallery database
    Database,
    /// lettre, delivering contact mail
    Mail,
    Shutter,
    Server,
    Gallery,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let module = str.split("::").next().unwrap_or_default();

        match module {
            "shutter" => Self::Shutter,
            "shutter_server" => Self::Server,
            "shutter_gallery" => Self::Gallery,
            "sqlx" => Self::Database,
            "lettre" => Self::Mail,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        matches!(self, Self::Shutter | Self::Server | Self::Gallery)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Database => "DATABASE".yellow(),
            Target::Mail => "MAIL".bright_blue(),
            Target::Shutter => "SHUTTER".bright_cyan(),
            Target::Server => "SERVER".bright_green(),
            Target::Gallery => "GALLERY".bright_purple(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}
