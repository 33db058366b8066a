use std::fmt::Display;
use std::path::Path;

use console::{Style, StyledObject};
use beatflow_core::frame::FrameStack;
use beatflow_core::peaks::{PeakDetector, PeakStatistics};
use beatflow_core::pipeline::{AnalysisConfig, RoiAnalysis};
use beatflow_core::signal::Signal1D;
use beatflow_core::stats::{nan_max, nan_mean, MeanStd};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

/// One indented `label value` line of a section.
fn item<D: Display>(s: &Styles, label: &str, value: StyledObject<D>) {
    println!("    {:<12}{}", s.label.apply_to(label), value);
}

pub fn print_analysis_summary(dir: &Path, stack: &FrameStack, config: &AnalysisConfig) {
    let s = Styles::new();
    let (h, w) = stack.dim();
    let meta = stack.meta();

    println!();
    println!("  {}", s.title.apply_to("Beatflow Analysis"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(17)));
    println!();

    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(dir.display()));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!("{} @ {}x{}", stack.len(), w, h))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Recording"),
        s.value.apply_to(format!("{} fps, {} µm/px", meta.fps, meta.microns_per_pixel))
    );
    println!();

    let p = &config.parameters;
    println!("  {}", s.header.apply_to("Block Matching"));
    item(&s, "Block", s.value.apply_to(format!("{} px", p.blockwidth)));
    item(&s, "Delay", s.value.apply_to(format!("{} frames", p.delay)));
    item(&s, "Search", s.value.apply_to(format!("±{} px", p.max_shift)));
    match config.max_size {
        Some(max) => item(&s, "Max size", s.value.apply_to(format!("{max} px"))),
        None => item(&s, "Max size", s.disabled.apply_to("full resolution")),
    }
    match config.roi {
        Some(roi) => {
            let text = format!("{}x{} at ({}, {})", roi.width, roi.height, roi.x, roi.y);
            item(&s, "ROI", s.value.apply_to(text));
        }
        None => item(&s, "ROI", s.disabled.apply_to("whole frame")),
    }
    println!();

    println!("  {}", s.header.apply_to("Filters"));
    if config.filter.suppress_outliers {
        let text = format!("min support {}", config.filter.outlier_min_support);
        item(&s, "Outliers", s.method.apply_to(text));
    } else {
        item(&s, "Outliers", s.disabled.apply_to("off"));
    }
    match config.filter.max_length {
        Some(max) => item(&s, "Cutoff", s.value.apply_to(format!("{max} µm/s"))),
        None => item(&s, "Cutoff", s.disabled.apply_to("off")),
    }
    println!();

    println!("  {}", s.header.apply_to("Peaks"));
    match &config.peaks {
        Some(peaks) => {
            item(&s, "Mode", s.method.apply_to(peaks.mode));
            item(&s, "Ratio", s.value.apply_to(peaks.ratio));
            item(&s, "Neighbours", s.value.apply_to(peaks.neighbours));
        }
        None => item(&s, "Detection", s.disabled.apply_to("disabled")),
    }
    println!();
}

pub fn print_results(result: &RoiAnalysis, statistics: Option<&PeakStatistics>) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Motion"));
    let (rows, cols) = result.unit_field.grid_dim();
    let grid = format!("{} pairs, {}x{} blocks", result.unit_field.len(), cols, rows);
    item(&s, "Grid", s.value.apply_to(grid));
    match result.time_averaged.max {
        Some(max) => item(&s, "Avg max", s.value.apply_to(format!("{max:.3} µm/s"))),
        None => item(&s, "Avg max", s.disabled.apply_to("no motion")),
    }
    if let Some(scale) = result.display_scale {
        item(&s, "Display", s.value.apply_to(format!("{scale:.3} µm/s")));
    }

    print_peak_results(&result.signal, &result.detector, statistics);
}

pub fn print_peak_results(
    signal: &Signal1D,
    detector: &PeakDetector,
    statistics: Option<&PeakStatistics>,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Signal"));
    item(&s, "Quantity", s.value.apply_to(&signal.description));
    if !signal.has_data() {
        item(&s, "Values", s.disabled.apply_to("no data"));
        return;
    }
    let mean = nan_mean(signal.values.iter().copied()).unwrap_or(f64::NAN);
    let max = nan_max(signal.values.iter().copied()).unwrap_or(f64::NAN);
    item(&s, "Mean", s.value.apply_to(format!("{mean:.3}")));
    item(&s, "Max", s.value.apply_to(format!("{max:.3}")));

    let Some(peaks) = detector.peaks() else {
        return;
    };
    println!();
    println!("  {}", s.header.apply_to("Beats"));
    let counts = format!("{} high, {} low", peaks.highs.len(), peaks.lows.len());
    item(&s, "Peaks", s.value.apply_to(counts));

    let Some(stats) = statistics else {
        item(&s, "Statistics", s.disabled.apply_to("too few peaks"));
        return;
    };
    let row = |label: &str, value: &MeanStd, unit: &str| {
        let text = format!("{:.3} ± {:.3} {unit}", value.mean, value.std);
        item(&s, label, s.value.apply_to(text));
    };
    row("Rate", &stats.bpm, "bpm");
    if let Some(ref v) = stats.contraction_interval {
        row("Contraction", v, "s");
    }
    if let Some(ref v) = stats.relaxation_interval {
        row("Relaxation", v, "s");
    }
    if let Some(ref v) = stats.contraction_relaxation_delta {
        row("Amplitude", v, "");
    }
}
