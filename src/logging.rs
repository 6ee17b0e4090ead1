use std::path::PathBuf;

use color_eyre::Result;

/// Set up the fern logger: console output at `console_level` (off by
/// default so the per-track progress lines stay clean) and an optional log
/// file at its own level.
pub fn setup_logging(
    console_level: log::LevelFilter,
    log_file: Option<PathBuf>,
    file_level: log::LevelFilter,
) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(
        fern::Dispatch::new()
            .level(console_level)
            .chain(std::io::stderr()),
    );

    if let Some(path) = log_file {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(file_level)
                .chain(fern::log_file(path)?),
        );
    }

    dispatch.apply()?;
    Ok(())
}
