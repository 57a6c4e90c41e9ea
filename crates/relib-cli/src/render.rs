use std::cell::RefCell;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use relib_core::{Action, DiffResult, RecordSet, Source};
use relib_restore::{InstallOutcome, InstallReport, RestoreObserver};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// Rich output only on a terminal, and never when `NO_COLOR` is set.
pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    output_style_for(no_color, std::io::stdout().is_terminal())
}

pub(crate) fn output_style_for(no_color: bool, is_terminal: bool) -> OutputStyle {
    if no_color || !is_terminal {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!();
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars(".oO@* ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

impl TerminalProgress {
    fn advance(&mut self, message: Option<&str>) {
        self.current = (self.current + 1).min(self.total);
        let Some(progress_bar) = &self.progress_bar else {
            return;
        };
        progress_bar.set_position(self.current.min(self.total.max(1)));
        if let Some(message) = message {
            progress_bar.println(message);
        }
    }

    fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }
}

/// Drives a progress bar from restore callbacks.
pub(crate) struct ProgressObserver {
    renderer: TerminalRenderer,
    progress: RefCell<Option<TerminalProgress>>,
}

impl ProgressObserver {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            progress: RefCell::new(None),
        }
    }
}

impl RestoreObserver for ProgressObserver {
    fn batch_started(&self, total: usize) {
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        *self.progress.borrow_mut() = Some(self.renderer.start_progress("install", total));
    }

    fn package_finished(&self, name: &str, outcome: &InstallOutcome) {
        if let Some(progress) = self.progress.borrow_mut().as_mut() {
            let line = (!outcome.is_installed()).then(|| {
                render_status_line(self.renderer.style(), "err", &format!("{name}: {outcome}"))
            });
            progress.advance(line.as_deref());
        }
    }

    fn batch_finished(&self) {
        if let Some(progress) = self.progress.borrow_mut().take() {
            progress.finish_success();
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

/// One line per action: `install A` or `remove Z`.
pub(crate) fn format_action_lines(actions: &DiffResult, style: OutputStyle) -> Vec<String> {
    actions
        .iter()
        .map(|(name, action)| {
            let status = match action {
                Action::Install => "ok",
                Action::Remove => "warn",
            };
            render_status_line(style, status, &format!("{action} {name}"))
        })
        .collect()
}

pub(crate) fn format_install_report_lines(
    report: &InstallReport,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    for removed in &report.removed {
        let label = match &removed.version {
            Some(version) => format!("removed {} {version}", removed.name),
            None => format!("removed {}", removed.name),
        };
        lines.push(render_status_line(style, "ok", &label));
    }

    for (name, outcome) in &report.outcomes {
        let status = if outcome.is_installed() { "ok" } else { "err" };
        let message = match outcome {
            InstallOutcome::Installed { .. } => format!("installed {name}"),
            other => format!("{name}: {other}"),
        };
        lines.push(render_status_line(style, status, &message));
    }

    if !report.satisfied.is_empty() {
        lines.push(render_status_line(
            style,
            "info",
            &format!("{} package(s) already satisfied", report.satisfied.len()),
        ));
    }

    for conflict in &report.conflicts {
        lines.push(render_status_line(style, "warn", &conflict.to_string()));
    }

    for (name, _) in report.repairs.iter() {
        let message =
            format!("{name}: installed state differs from the lockfile; consider a refresh");
        lines.push(render_status_line(style, "warn", &message));
    }
    lines
}

/// `name version source location` for each installed record.
pub(crate) fn format_library_lines(installed: &RecordSet) -> Vec<String> {
    installed
        .records()
        .map(|record| {
            let source = match &record.source {
                Source::Repository {
                    repository: Some(repository),
                } => repository.clone(),
                other => other.kind_label().to_string(),
            };
            let location = record
                .location()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            format!("{} {} ({source}) {location}", record.package, record.version)
                .trim_end()
                .to_string()
        })
        .collect()
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{}/{}", HumanCount(current), HumanCount(total));
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
