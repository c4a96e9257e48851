use chrono::Local;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk layout for an enumerated prime list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One decimal prime per line.
    Text,
    /// 8 bytes per prime, little-endian.
    Binary,
}

/// Read current process memory usage from /proc/self/status
/// Returns (VmRSS in MB, VmSize in MB) or None if unable to read
pub fn get_process_memory_mb() -> Option<(f64, f64)> {
    let file = File::open("/proc/self/status").ok()?;
    parse_memory_status(BufReader::new(file))
}

fn parse_memory_status(reader: impl BufRead) -> Option<(f64, f64)> {
    let mut vm_rss_kb = None;
    let mut vm_size_kb = None;

    for line in reader.lines().map_while(Result::ok) {
        // Format: "VmRSS:     12345 kB"
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            vm_rss_kb = rest.split_whitespace().next().and_then(|v| v.parse::<f64>().ok());
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            vm_size_kb = rest.split_whitespace().next().and_then(|v| v.parse::<f64>().ok());
        }

        if vm_rss_kb.is_some() && vm_size_kb.is_some() {
            break;
        }
    }

    Some((vm_rss_kb? / 1024.0, vm_size_kb? / 1024.0))
}

/// `$XDG_DATA_HOME/primer`, falling back to `~/.local/share/primer`.
pub fn get_data_dir() -> Option<PathBuf> {
    let xdg_data_home = env::var("XDG_DATA_HOME")
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".local/share"))
        })?;

    Some(xdg_data_home.join("primer"))
}

/// Write `primes` to `path` (truncating), returning bytes written.
pub fn save_primes(path: &Path, primes: &[u64], format: OutputFormat) -> io::Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    // Use BufWriter with larger buffer for better performance
    let mut writer = BufWriter::with_capacity(128 * 1024, file);
    let written = write_primes(&mut writer, primes, format)?;
    writer.flush()?;
    Ok(written)
}

/// Serialize `primes` into any writer.
pub fn write_primes(writer: &mut impl Write, primes: &[u64], format: OutputFormat) -> io::Result<u64> {
    let mut written = 0_u64;
    match format {
        OutputFormat::Text => {
            let mut itoa_buf = itoa::Buffer::new();
            for &prime in primes {
                let digits = itoa_buf.format(prime).as_bytes();
                writer.write_all(digits)?;
                writer.write_all(b"\n")?;
                written += digits.len() as u64 + 1;
            }
        }
        OutputFormat::Binary => {
            for &prime in primes {
                writer.write_all(&prime.to_le_bytes())?;
                written += 8;
            }
        }
    }
    Ok(written)
}

/// Append one line per run to `execution_log.txt` in the data directory.
pub fn log_execution(
    subcommand: &str,
    args: &str,
    strategy: &str,
    duration_us: u128,
) -> io::Result<()> {
    let data_dir = get_data_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not determine data directory"))?;
    append_log_line(&data_dir, subcommand, args, strategy, duration_us)
}

fn append_log_line(
    data_dir: &Path,
    subcommand: &str,
    args: &str,
    strategy: &str,
    duration_us: u128,
) -> io::Result<()> {
    fs::create_dir_all(data_dir)?;

    let log_path = data_dir.join("execution_log.txt");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    writeln!(
        file,
        "{} | {} | {} | {} | {}us",
        timestamp, subcommand, args, strategy, duration_us
    )?;

    Ok(())
}
