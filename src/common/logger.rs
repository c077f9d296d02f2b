use std::{
  fs::{self, File, OpenOptions},
  io::{self, BufRead, BufReader, Write},
  path::{Path, PathBuf},
  sync::{Arc, OnceLock},
};

use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt::{self, time::LocalTime}, prelude::*};

use crate::configs::{LogFileConfig, LoggingConfig};

static GLOBAL_FILE_WRITER: OnceLock<PruningFileWriter> = OnceLock::new();

/// Prints a line to stdout and mirrors it into the log file, if one is open.
#[macro_export]
macro_rules! log_println {
    () => {{
        std::println!();
        $crate::common::logger::append_to_file_raw("\n");
    }};
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        std::println!("{}", msg);
        $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
    }};
}

pub fn append_to_file_raw(msg: &str) {
  if let Some(mut writer) = GLOBAL_FILE_WRITER.get().cloned() {
    let _ = writer.write_all(strip_ansi_escapes(msg).as_bytes());
  }
}

fn strip_ansi_escapes(s: &str) -> String {
  let mut result = String::with_capacity(s.len());
  let mut in_escape = false;
  for c in s.chars() {
    if c == '\x1b' {
      in_escape = true;
    } else if in_escape {
      if c.is_ascii_alphabetic() {
        in_escape = false;
      }
    } else {
      result.push(c);
    }
  }
  result
}

/// Builds the filter directive from the configured level and extra filters.
fn filter_directive(logging: Option<&LoggingConfig>) -> String {
  let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");
  match logging.and_then(|l| l.filters.as_deref()) {
    Some(filters) if !filters.trim().is_empty() => format!("{},{}", level, filters.trim()),
    _ => level.to_string(),
  }
}

pub fn init(logging: Option<&LoggingConfig>) {
  // RUST_LOG wins over the configured directive
  let env_filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(filter_directive(logging)));

  let stdout_layer = fmt::layer()
    .with_timer(LocalTime::rfc_3339())
    .with_target(true)
    .with_line_number(true)
    .with_file(false);

  let file_layer = logging.and_then(|l| l.file.as_ref()).map(|file_config| {
    let writer = open_file_writer(file_config);
    fmt::layer()
      .with_writer(writer)
      .with_timer(LocalTime::rfc_3339())
      .with_target(true)
      .with_line_number(true)
      .with_file(false)
      .with_ansi(false)
  });

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stdout_layer)
    .with(file_layer)
    .init();
}

fn open_file_writer(file_config: &LogFileConfig) -> PruningFileWriter {
  if let Some(parent) = Path::new(&file_config.path).parent() {
    if let Err(e) = fs::create_dir_all(parent) {
      eprintln!("Failed to create log directory: {}", e);
    }
  }

  let writer = PruningFileWriter::new(PathBuf::from(&file_config.path), file_config.max_lines);
  let _ = GLOBAL_FILE_WRITER.set(writer.clone());
  writer
}

/// Appends to a file and trims it back to the newest `max_lines` lines
/// every so often.
#[derive(Clone)]
pub(crate) struct PruningFileWriter {
  path: PathBuf,
  max_lines: u32,
  lines_since_prune: Arc<Mutex<u32>>,
}

impl PruningFileWriter {
  fn new(path: PathBuf, max_lines: u32) -> Self {
    Self {
      path,
      max_lines,
      lines_since_prune: Arc::new(Mutex::new(0)),
    }
  }

  /// Prune once 10% of `max_lines` (at least 50) new lines have landed.
  fn prune_threshold(&self) -> u32 {
    (self.max_lines / 10).max(50)
  }

  fn prune(&self) -> io::Result<()> {
    if !self.path.exists() {
      return Ok(());
    }

    let reader = BufReader::new(File::open(&self.path)?);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

    if lines.len() > self.max_lines as usize {
      let start = lines.len() - self.max_lines as usize;
      let mut file = File::create(&self.path)?;
      for line in &lines[start..] {
        writeln!(file, "{}", line)?;
      }
    }
    Ok(())
  }
}

impl io::Write for PruningFileWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?
      .write_all(buf)?;

    let mut pending = self.lines_since_prune.lock();
    *pending += buf.iter().filter(|&&b| b == b'\n').count() as u32;

    if *pending >= self.prune_threshold() {
      if let Err(e) = self.prune() {
        eprintln!("Failed to prune log file: {}", e);
      }
      *pending = 0;
    }

    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> fmt::MakeWriter<'a> for PruningFileWriter {
  type Writer = Self;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}
