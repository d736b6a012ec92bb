//! Common bits shared by bots in this workspace, because some things
//! are just boilerplate.

use std::{
    fs::{File, OpenOptions},
    future::Future,
    io::{self, Write},
    path::Path,
};

pub mod useful_methods;
pub mod user_resolving;

/// Retry a teloxide request expression up to 3 times if Telegram asks us to wait
/// or the network hiccups. Evaluates to the last result.
///
/// ```ignore
/// let sent = teloxide_retry!(bot.send_message(chat_id, "hi").await);
/// ```
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut tries: u8 = 0;
        loop {
            tries += 1;
            let result = $request;
            match &result {
                Err(::teloxide::RequestError::RetryAfter(wait)) if tries < 3 => {
                    ::tokio::time::sleep(wait.duration()).await;
                }
                Err(::teloxide::RequestError::Network(_)) if tries < 3 => {
                    ::tokio::time::sleep(::std::time::Duration::from_secs(1)).await;
                }
                _ => break result,
            }
        }
    }};
}

/// Writes everything both to stderr and to a log file.
struct TeeToFile {
    file: File,
}

impl Write for TeeToFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Losing stderr output is not worth failing the log file write over.
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

/// Initialize logging and start the `closure` in an async runtime.
/// Logging is enabled by default on level `info` unless overridden
/// by environment variable `RUST_LOG`. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// If `log_file` is given, every log line is also appended to that file.
/// Failing to open it is logged and otherwise ignored.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
///
/// # Panics
///
/// Panics if the tokio runtime could not be built.
pub fn start_everything(log_file: Option<&Path>, closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    let mut file_error = None;
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(TeeToFile { file })));
            }
            Err(e) => file_error = Some(e),
        }
    }

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    if let (Some(path), Some(e)) = (log_file, file_error) {
        log::warn!("Could not open log file {}: {e}", path.display());
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure);
}
