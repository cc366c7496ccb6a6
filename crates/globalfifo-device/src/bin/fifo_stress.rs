//! 多读多写压力测试工具。
//!
//! # 设计目标（Why）
//! - 在真实线程调度下验证“读出的字节多重集合 == 写入的字节多重集合”，
//!   作为单元测试之外的长时间回归手段；
//! - 输出结构化 JSON，便于 CI 归档与比对。
//!
//! # 工作机制（How）
//! - 通过 [`FifoDriver`] 挂载设备，每个写者各自打开一个阻塞文件，写入以自身编号为内容的字节；
//! - 读者共享一个取消令牌：最后一个字节被读走的读者触发取消，其余阻塞中的读者以 `Interrupted` 退出；
//! - 若设置了 `--timeout-ms`，读者每次等待都附带该超时，超时视为失败（说明存在唤醒丢失）。
//!
//! # 契约说明（What）
//! - **输入参数**：
//!   - `--writers <u8>`：写者数量，1..=255，默认 4；
//!   - `--readers <usize>`：读者数量，默认 4；
//!   - `--capacity <usize>`：缓冲区容量，默认 4096；
//!   - `--per-writer <usize>`：每个写者写入的字节数，默认 65536；
//!   - `--wake-policy <all|one>`：唤醒策略，默认 `all`；
//!   - `--timeout-ms <u64>`：可选，单次阻塞等待上限；
//!   - `--output <path>`：可选，JSON 报告写入路径；
//! - **输出**：JSON 报告打印到标准输出；多重集合不一致或任一线程失败时以非零状态退出；
//! - 日志级别由 `RUST_LOG` 控制，默认 `info`。

use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};
use std::{env, fmt, thread};

use globalfifo::{Cancellation, FifoError, FifoStats, WaitContext, WakePolicy};
use globalfifo_device::{DeviceError, FifoConfig, FifoDevice, FifoDriver, OpenFlags};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Config {
    writers: u8,
    readers: usize,
    capacity: usize,
    per_writer: usize,
    wake_policy: WakePolicy,
    timeout: Option<Duration>,
    output: Option<PathBuf>,
}

impl Config {
    fn parse() -> Result<Self, StressError> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self, StressError> {
        let mut args = args.into_iter();
        let mut config = Config {
            writers: 4,
            readers: 4,
            capacity: 4096,
            per_writer: 65_536,
            wake_policy: WakePolicy::All,
            timeout: None,
            output: None,
        };

        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| StressError::InvalidArgument(format!("{flag} 之后需要提供取值")))
            };
            match flag.as_str() {
                "--writers" => config.writers = parse_number(&flag, &value()?)?,
                "--readers" => config.readers = parse_number(&flag, &value()?)?,
                "--capacity" => config.capacity = parse_number(&flag, &value()?)?,
                "--per-writer" => config.per_writer = parse_number(&flag, &value()?)?,
                "--timeout-ms" => {
                    config.timeout = Some(Duration::from_millis(parse_number(&flag, &value()?)?));
                }
                "--wake-policy" => {
                    config.wake_policy = match value()?.as_str() {
                        "all" => WakePolicy::All,
                        "one" => WakePolicy::One,
                        other => {
                            return Err(StressError::InvalidArgument(format!(
                                "未知唤醒策略 `{other}`，可选 all/one"
                            )));
                        }
                    };
                }
                "--output" => config.output = Some(PathBuf::from(value()?)),
                other => {
                    return Err(StressError::InvalidArgument(format!("未知参数 `{other}`")));
                }
            }
        }

        if config.writers == 0 || config.readers == 0 {
            return Err(StressError::InvalidArgument(
                "--writers 与 --readers 必须大于 0".into(),
            ));
        }
        // 总字节数为 0 时没有读者会触发停止信号，读者将永远等待。
        if config.per_writer == 0 || config.capacity == 0 {
            return Err(StressError::InvalidArgument(
                "--per-writer 与 --capacity 必须大于 0".into(),
            ));
        }
        Ok(config)
    }
}

fn parse_number<T>(flag: &str, raw: &str) -> Result<T, StressError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|error| StressError::InvalidArgument(format!("无法解析 {flag} `{raw}`：{error}")))
}

#[derive(Debug)]
enum StressError {
    InvalidArgument(String),
    Device(DeviceError),
    Io(std::io::Error),
    Serialize(serde_json::Error),
    WorkerPanicked(&'static str),
}

impl fmt::Display for StressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressError::InvalidArgument(msg) => write!(f, "参数错误: {msg}"),
            StressError::Device(err) => write!(f, "设备错误: {err}"),
            StressError::Io(err) => write!(f, "IO 错误: {err}"),
            StressError::Serialize(err) => write!(f, "序列化错误: {err}"),
            StressError::WorkerPanicked(role) => write!(f, "{role} 线程 panic"),
        }
    }
}

impl Error for StressError {}

impl From<DeviceError> for StressError {
    fn from(value: DeviceError) -> Self {
        StressError::Device(value)
    }
}

impl From<FifoError> for StressError {
    fn from(value: FifoError) -> Self {
        StressError::Device(DeviceError::from(value))
    }
}

impl From<std::io::Error> for StressError {
    fn from(value: std::io::Error) -> Self {
        StressError::Io(value)
    }
}

impl From<serde_json::Error> for StressError {
    fn from(value: serde_json::Error) -> Self {
        StressError::Serialize(value)
    }
}

#[derive(Debug, Serialize)]
struct Report {
    writers: u8,
    readers: usize,
    capacity: usize,
    per_writer: usize,
    wake_policy: &'static str,
    elapsed_ms: u128,
    bytes_total: usize,
    /// 每个写者标签实际被读出的字节数。
    received: BTreeMap<u8, usize>,
    reader_errors: Vec<String>,
    balanced: bool,
    stats: FifoStats,
}

fn spawn_writers(
    device: &Arc<FifoDevice>,
    config: &Config,
    start: &Arc<Barrier>,
    stop: &Cancellation,
) -> Result<Vec<thread::JoinHandle<Result<(), DeviceError>>>, DeviceError> {
    let mut handles = Vec::with_capacity(usize::from(config.writers));
    for tag in 0..config.writers {
        let file = device.open(OpenFlags::default())?;
        let start = Arc::clone(start);
        let stop = stop.clone();
        let per_writer = config.per_writer;
        handles.push(thread::spawn(move || {
            start.wait();
            let ctx = WaitContext::blocking().with_cancellation(stop.clone());
            let payload = vec![tag; per_writer];
            let mut sent = 0;
            while sent < payload.len() {
                match file.write_with(&payload[sent..], &ctx) {
                    Ok(n) => sent += n,
                    Err(err) => {
                        tracing::error!(tag, error = %err, code = err.code(), "writer failed");
                        stop.cancel();
                        return Err(err);
                    }
                }
            }
            Ok(())
        }));
    }
    Ok(handles)
}

type ReaderOutcome = (BTreeMap<u8, usize>, Option<String>);

fn spawn_readers(
    device: &Arc<FifoDevice>,
    config: &Config,
    start: &Arc<Barrier>,
    remaining: &Arc<AtomicUsize>,
    stop: &Cancellation,
) -> Result<Vec<thread::JoinHandle<ReaderOutcome>>, DeviceError> {
    let mut handles = Vec::with_capacity(config.readers);
    for _ in 0..config.readers {
        let file = device.open(OpenFlags::default())?;
        let start = Arc::clone(start);
        let remaining = Arc::clone(remaining);
        let stop = stop.clone();
        let timeout = config.timeout;
        handles.push(thread::spawn(move || {
            start.wait();
            let mut seen = BTreeMap::new();
            let mut buf = [0u8; 256];
            loop {
                let mut ctx = WaitContext::blocking().with_cancellation(stop.clone());
                if let Some(timeout) = timeout {
                    ctx = ctx.with_timeout(timeout);
                }
                match file.read_with(&mut buf, &ctx) {
                    Ok(n) => {
                        for byte in &buf[..n] {
                            *seen.entry(*byte).or_insert(0usize) += 1;
                        }
                        if n > 0 && remaining.fetch_sub(n, Ordering::AcqRel) == n {
                            stop.cancel();
                        }
                    }
                    Err(DeviceError::Fifo(FifoError::Interrupted)) => return (seen, None),
                    Err(err) => {
                        tracing::error!(error = %err, code = err.code(), "reader failed");
                        stop.cancel();
                        return (seen, Some(err.to_string()));
                    }
                }
            }
        }));
    }
    Ok(handles)
}

fn run(config: &Config) -> Result<Report, StressError> {
    let driver = FifoDriver::new();
    let device = driver.probe(
        FifoConfig::default()
            .with_capacity(config.capacity)
            .with_wake_policy(config.wake_policy),
    )?;
    let total = usize::from(config.writers) * config.per_writer;
    let remaining = Arc::new(AtomicUsize::new(total));
    let start = Arc::new(Barrier::new(usize::from(config.writers) + config.readers));

    tracing::info!(
        writers = config.writers,
        readers = config.readers,
        capacity = config.capacity,
        total,
        "stress run started"
    );
    let began = Instant::now();
    // 任一写者或读者失败都会触发 `stop`，其余线程随之退出，不会卡在满/空的缓冲区上。
    let stop = Cancellation::new();
    let writers = spawn_writers(&device, config, &start, &stop)?;
    let readers = spawn_readers(&device, config, &start, &remaining, &stop)?;

    let mut writer_failure = None;
    for handle in writers {
        let outcome = handle
            .join()
            .map_err(|_| StressError::WorkerPanicked("writer"))?;
        if let Err(err) = outcome {
            writer_failure.get_or_insert(err);
        }
    }
    let mut received: BTreeMap<u8, usize> = BTreeMap::new();
    let mut reader_errors = Vec::new();
    for handle in readers {
        let (seen, error) = handle
            .join()
            .map_err(|_| StressError::WorkerPanicked("reader"))?;
        for (tag, count) in seen {
            *received.entry(tag).or_insert(0) += count;
        }
        reader_errors.extend(error);
    }
    let elapsed = began.elapsed();
    if let Some(err) = writer_failure {
        return Err(err.into());
    }

    let stats = device.buffer().stats()?;
    let balanced = reader_errors.is_empty()
        && received.len() == usize::from(config.writers)
        && received.values().all(|count| *count == config.per_writer);
    driver.remove()?;

    Ok(Report {
        writers: config.writers,
        readers: config.readers,
        capacity: config.capacity,
        per_writer: config.per_writer,
        wake_policy: match config.wake_policy {
            WakePolicy::All => "all",
            WakePolicy::One => "one",
        },
        elapsed_ms: elapsed.as_millis(),
        bytes_total: total,
        received,
        reader_errors,
        balanced,
        stats,
    })
}

fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    install_tracing();
    match execute() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("bytes read do not match bytes written");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = %err, "stress run aborted");
            ExitCode::FAILURE
        }
    }
}

fn execute() -> Result<bool, StressError> {
    let config = Config::parse()?;
    let report = run(&config)?;
    let payload = serde_json::to_string_pretty(&report)?;
    println!("{payload}");
    if let Some(path) = &config.output {
        let mut file = File::create(path)?;
        file.write_all(payload.as_bytes())?;
        file.write_all(b"\n")?;
    }
    Ok(report.balanced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, StressError> {
        Config::parse_from(args.iter().map(|arg| (*arg).to_owned()))
    }

    #[test]
    fn zero_sized_runs_are_rejected() {
        for args in [
            &["--per-writer", "0"][..],
            &["--capacity", "0"][..],
            &["--writers", "0"][..],
            &["--readers", "0"][..],
        ] {
            assert!(
                matches!(parse(args), Err(StressError::InvalidArgument(_))),
                "{args:?} 应被拒绝"
            );
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--writers", "2", "--readers", "3", "--capacity", "8", "--per-writer", "100",
            "--wake-policy", "one", "--timeout-ms", "5000",
        ])
        .expect("合法参数");
        assert_eq!(config.writers, 2);
        assert_eq!(config.readers, 3);
        assert_eq!(config.capacity, 8);
        assert_eq!(config.per_writer, 100);
        assert_eq!(config.wake_policy, WakePolicy::One);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(matches!(parse(&["--bogus"]), Err(StressError::InvalidArgument(_))));
    }

    #[test]
    fn small_run_is_balanced() {
        let config = parse(&[
            "--writers", "2", "--readers", "2", "--capacity", "8", "--per-writer", "100",
            "--wake-policy", "one",
        ])
        .expect("合法参数");
        let report = run(&config).expect("压力测试");
        assert!(report.balanced, "{report:?}");
        assert_eq!(report.stats.bytes_read, 200);
    }

    #[test]
    fn fifo_errors_convert_into_device_errors() {
        let err = StressError::from(FifoError::Closed);
        assert!(matches!(err, StressError::Device(DeviceError::Fifo(FifoError::Closed))));
    }
}
