//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use signage_core::slider::format_schedule;
use signage_core::{ContentRecord, RecordKind, TimerSettings};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single record
    pub fn print_record(&self, record: &ContentRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("Order:       {}", record.order);
                println!("Type:        {}", record.kind);
                match record.kind {
                    RecordKind::Item => {
                        println!("Machine:     {}", record.title());
                        println!("Model:       {}", record.model.as_deref().unwrap_or("-"));
                        println!("Purpose:     {}", record.purpose.as_deref().unwrap_or("-"));
                        println!(
                            "Schedule:    {}",
                            format_schedule(record.start_date, record.end_date)
                        );
                    }
                    RecordKind::Cover => {
                        println!("Tester:      {}", record.title());
                        print_lines("Function:", &record.function);
                        print_lines("Specs:", &record.specifications);
                    }
                }
                match (&record.image_path, &record.original_image_name) {
                    (Some(path), Some(name)) => println!("Image:       {} ({})", path, name),
                    (Some(path), None) => println!("Image:       {}", path),
                    _ => {}
                }
            }
            OutputFormat::Json => match serde_json::to_string_pretty(record) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to encode record: {}", e),
            },
            OutputFormat::Quiet => {
                println!("{}", record.order);
            }
        }
    }

    /// Print a list of records, most recent first
    pub fn print_records(&self, records: &[ContentRecord]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No slides yet.");
                    return;
                }
                let count = records.len();
                for (index, record) in records.iter().enumerate() {
                    let detail = match record.kind {
                        RecordKind::Item => format_schedule(record.start_date, record.end_date),
                        RecordKind::Cover => String::new(),
                    };
                    println!(
                        "{:>2}. [{}] {:<5} | {} | {}",
                        count - index,
                        record.order,
                        record.kind,
                        truncate(record.title(), 35),
                        detail
                    );
                }
                println!("\n{} slide(s)", count);
            }
            OutputFormat::Json => match serde_json::to_string_pretty(records) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to encode records: {}", e),
            },
            OutputFormat::Quiet => {
                for record in records {
                    println!("{}", record.order);
                }
            }
        }
    }

    /// Print timer settings
    pub fn print_timers(&self, settings: &TimerSettings) {
        match self.format {
            OutputFormat::Human => {
                println!("Timers (seconds):");
                println!("  slider: {}", settings.slider_timer);
                println!("  home:   {}", settings.home_timer);
                println!("  back:   {}", settings.back_timer);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "sliderTimer": settings.slider_timer,
                        "homeTimer": settings.home_timer,
                        "backTimer": settings.back_timer
                    })
                );
            }
            OutputFormat::Quiet => {
                println!(
                    "{} {} {}",
                    settings.slider_timer, settings.home_timer, settings.back_timer
                );
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_lines(label: &str, lines: &[String]) {
    let mut shown = lines.iter().filter(|l| !l.trim().is_empty());
    match shown.next() {
        Some(first) => {
            println!("{:<12} {}", label, first);
            for line in shown {
                println!("{:<12} {}", "", line);
            }
        }
        None => println!("{:<12} -", label),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
