use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use time::{
    format_description::{self, FormatItem},
    OffsetDateTime, UtcOffset,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields, FormattedFields},
    registry::LookupSpan,
    FmtSubscriber,
};

/// Initialize the logging system
pub fn init_logging(level: tracing::Level) -> Result<()> {
    // Getting the offset fails when other threads exist, fall back to UTC
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let my_pretty_logger = MyPrettyLogger::new(local_offset)?;

    let subscriber = FmtSubscriber::builder()
        .event_format(my_pretty_logger)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .wrap_err("Setting default subscriber failed")
}

/// Custom logger as the default ones are not as customizable as I want
struct MyPrettyLogger {
    offset: UtcOffset,
    time_format: Vec<FormatItem<'static>>,
}

impl MyPrettyLogger {
    fn new(offset: UtcOffset) -> Result<Self> {
        Ok(Self {
            offset,
            time_format: format_description::parse("[hour]:[minute]:[second]")
                .into_diagnostic()
                .wrap_err("Invalid time format description")?,
        })
    }
}

impl<S, N> FormatEvent<S, N> for MyPrettyLogger
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        let now = OffsetDateTime::now_utc().to_offset(self.offset).time();
        let now = now.format(&self.time_format).map_err(|_| std::fmt::Error)?;
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("?");

        if writer.has_ansi_escapes() {
            let level = match *metadata.level() {
                Level::ERROR => metadata.level().red().to_string(),
                Level::WARN => metadata.level().yellow().to_string(),
                Level::DEBUG | Level::TRACE => metadata.level().blue().to_string(),
                _ => metadata.level().green().to_string(),
            };

            write!(&mut writer, "{} {:>5} {} ", now, level, thread_name.yellow())?;
        } else {
            write!(
                &mut writer,
                "{} {:>5} {} ",
                now,
                metadata.level(),
                thread_name
            )?;
        }

        // Prefix the message with the spans it happened in, e.g. `space{id=1ABC}: `
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
