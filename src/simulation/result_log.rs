//! Flat, semicolon-delimited result log.
//!
//! A run writes a configuration header followed by one metrics line per
//! evaluation:
//!
//! ```text
//! seed;42
//! size;200;100
//! number of AGVs;12
//! number of APs;3
//! number of obstacles;20
//! ad hoc network;1
//! adaptive network;1
//!
//! Logs:
//! 3.0;83.33;0
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use log::info;

/// Run parameters written at the top of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHeader {
    pub seed: u64,
    pub world_size: (f64, f64),
    pub agents: usize,
    pub access_points: usize,
    pub obstacles: usize,
    pub ad_hoc: bool,
    pub adaptive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    lines: Vec<String>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.push(line);
    }

    pub fn log_configuration(&mut self, header: &RunHeader) {
        self.log(format!("seed;{}", header.seed));
        self.log(format!("size;{};{}", header.world_size.0, header.world_size.1));
        self.log(format!("number of AGVs;{}", header.agents));
        self.log(format!("number of APs;{}", header.access_points));
        self.log(format!("number of obstacles;{}", header.obstacles));
        self.log(format!("ad hoc network;{}", u8::from(header.ad_hoc)));
        self.log(format!("adaptive network;{}", u8::from(header.adaptive)));
        self.log("");
        self.log("Logs:");
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Last `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> &[String] {
        &self.lines[self.lines.len().saturating_sub(count)..]
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }

    /// All lines, each terminated by a newline.
    pub fn assemble(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Append the assembled log to `path`, creating the file if needed.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path).with_context(|| format!("Failed to open result log {}", path.display()))?;
        file.write_all(self.assemble().as_bytes()).with_context(|| format!("Failed to write result log {}", path.display()))?;
        Ok(())
    }
}
