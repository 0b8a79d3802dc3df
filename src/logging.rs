use std::sync::OnceLock;

pub const COLOR_VAR: &str = "STRATA_COLOR";
pub fn should_color() -> bool {
    COLOR.get().is_some_and(|it| *it)
}

static COLOR: OnceLock<bool> = OnceLock::new();
static COMPONENT_NAME: OnceLock<String> = OnceLock::new();

pub fn init_logger(component: impl Into<String>) {
    let component = component.into();
    let doit = || -> anyhow::Result<()> {
        use flexi_logger::*;

        COMPONENT_NAME
            .set(component.clone())
            .map_err(|_| anyhow::anyhow!("Already set"))?;

        fn format(
            w: &mut dyn std::io::Write,
            now: &mut DeferredNow,
            record: &Record,
        ) -> Result<(), std::io::Error> {
            let color = should_color();

            let line_display = record.line();
            let line_display = if let Some(line) = &line_display {
                format_args!("{}", *line)
            } else {
                format_args!("?")
            };

            let now_display = now.format("%Y-%m-%d %H:%M:%S");
            let now_display = if color {
                format_args!("\x1b[35m{now_display}\x1b[0m")
            } else {
                format_args!("{now_display}")
            };

            let level = record.level();

            let level_colored;
            let level_display = if color {
                level_colored = style(level).paint(level.to_string());
                format_args!("{level_colored}")
            } else {
                format_args!("{level}")
            };

            write!(
                w,
                "[{now_display}] {} {level_display} [{}:{line_display}] {}",
                COMPONENT_NAME.get().map_or("?", String::as_str),
                record.file().unwrap_or("<unknown>"),
                record.args(),
            )
        }

        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        let logger = Logger::try_with_env_or_str(default_level)?
            .format(format)
            .log_to_stderr();
        std::mem::forget(logger.start()?);

        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            log::error!("{info}");
            hook(info);
        }));

        let color = std::env::var(COLOR_VAR);
        let color = match color.as_deref().unwrap_or("auto") {
            "never" | "no" | "off" | "false" => false,
            "always" | "yes" | "on" | "true" => true,
            _ => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        };
        _ = COLOR.set(color);

        Ok(())
    };
    match doit() {
        Ok(_) => log::info!("Started logger for {component}"),
        Err(err) => eprintln!("Failed to start logger: {err}."),
    }
}
