//! Confidence analytics chart for `GET /stats`.
//!
//! Renders the score history as a PNG: a trend line over request index on
//! top, a 10-bucket histogram bottom-left, and a session summary panel
//! bottom-right.

use anyhow::{bail, Result};

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 800;

/// Number of scores in each `[0.1 * i, 0.1 * (i + 1))` bucket.
///
/// A score of exactly `1.0` lands in the last bucket.
pub fn bucket_counts(scores: &[f32]) -> [usize; 10] {
    let mut counts = [0usize; 10];
    for &s in scores {
        let idx = ((s * 10.0).floor().max(0.0) as usize).min(9);
        counts[idx] += 1;
    }
    counts
}

/// Summary panel lines, percentages with two decimals.
pub fn summary_lines(scores: &[f32]) -> Vec<String> {
    if scores.is_empty() {
        return Vec::new();
    }
    let count = scores.len();
    let mean = scores.iter().sum::<f32>() / count as f32;
    let max = scores.iter().copied().fold(f32::MIN, f32::max);
    let min = scores.iter().copied().fold(f32::MAX, f32::min);
    vec![
        "SESSION STATS".to_string(),
        format!("Total Requests:  {}", count),
        format!("Avg Confidence:  {:.2}%", mean * 100.0),
        format!("Max Confidence:  {:.2}%", max * 100.0),
        format!("Min Confidence:  {:.2}%", min * 100.0),
    ]
}

#[cfg(feature = "analytics-chart")]
pub fn render_png(scores: &[f32]) -> Result<Vec<u8>> {
    use plotters::prelude::*;

    const LINE: RGBColor = RGBColor(0x2c, 0x3e, 0x50);
    const BAR: RGBColor = RGBColor(0x34, 0x98, 0xdb);
    const PANEL_BG: RGBColor = RGBColor(0xec, 0xf0, 0xf1);
    const PANEL_BORDER: RGBColor = RGBColor(0xbd, 0xc3, 0xc7);

    if scores.is_empty() {
        bail!("no scores to chart");
    }

    fn chart_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
        anyhow::anyhow!("Render chart: {}", e)
    }

    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let (top, bottom) = root.split_vertically((HEIGHT / 2) as i32);
        let (hist_area, panel_area) = bottom.split_horizontally((WIDTH / 2) as i32);

        let n = scores.len();
        let mut trend = ChartBuilder::on(&top)
            .caption("Confidence Trend (Real-time)", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5f32..(n as f32 - 0.5), 0f32..1.05f32)
            .map_err(chart_err)?;
        trend
            .configure_mesh()
            .x_desc("Request Sequence ID")
            .y_desc("Confidence Score")
            .x_labels(n.min(20))
            .draw()
            .map_err(chart_err)?;
        let points: Vec<(f32, f32)> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (i as f32, s))
            .collect();
        trend
            .draw_series(LineSeries::new(points.iter().copied(), LINE.stroke_width(2)))
            .map_err(chart_err)?;
        trend
            .draw_series(points.iter().map(|&p| Circle::new(p, 5, LINE.filled())))
            .map_err(chart_err)?;

        let counts = bucket_counts(scores);
        let y_max = counts.iter().copied().max().unwrap_or(1).max(1);
        let mut hist = ChartBuilder::on(&hist_area)
            .caption("Confidence Distribution", ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0f32..1f32, 0usize..y_max + 1)
            .map_err(chart_err)?;
        hist.configure_mesh()
            .x_desc("Score Bucket")
            .disable_x_mesh()
            .draw()
            .map_err(chart_err)?;
        hist.draw_series(counts.iter().enumerate().map(|(i, &c)| {
            let x0 = i as f32 * 0.1;
            Rectangle::new([(x0, 0), (x0 + 0.1, c)], BAR.filled())
        }))
        .map_err(chart_err)?;
        hist.draw_series(counts.iter().enumerate().filter(|&(_, &c)| c > 0).map(|(i, &c)| {
            let x0 = i as f32 * 0.1;
            Rectangle::new([(x0, 0), (x0 + 0.1, c)], BLACK.stroke_width(1))
        }))
        .map_err(chart_err)?;

        let (w, h) = panel_area.dim_in_pixel();
        let (w, h) = (w as i32, h as i32);
        panel_area
            .draw(&Rectangle::new([(40, 40), (w - 40, h - 40)], PANEL_BG.filled()))
            .map_err(chart_err)?;
        panel_area
            .draw(&Rectangle::new(
                [(40, 40), (w - 40, h - 40)],
                PANEL_BORDER.stroke_width(2),
            ))
            .map_err(chart_err)?;
        for (i, line) in summary_lines(scores).into_iter().enumerate() {
            let y = 80 + i as i32 * 50;
            panel_area
                .draw(&Text::new(line, (80, y), ("monospace", 26).into_font()))
                .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
    }

    let image = image::RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .ok_or_else(|| anyhow::anyhow!("Chart buffer has the wrong size"))?;
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| anyhow::anyhow!("Encode PNG: {}", e))?;
    Ok(out.into_inner())
}

#[cfg(not(feature = "analytics-chart"))]
pub fn render_png(_scores: &[f32]) -> Result<Vec<u8>> {
    bail!("Analytics chart requires --features analytics-chart")
}
