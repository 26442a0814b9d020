//! SVG charts for the dashboard. Pure transformations: data in, SVG text out.

use crate::domain::allocation::Allocation;
use crate::ingest::types::PricePoint;
use plotters::prelude::*;
use std::f64::consts::PI;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 420;
const PIE_WIDTH: u32 = 560;
const PIE_HEIGHT: u32 = 360;

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const SLICE_COLORS: [RGBColor; 6] = [
    RGBColor(99, 110, 250),
    RGBColor(239, 85, 59),
    RGBColor(0, 204, 150),
    RGBColor(171, 99, 250),
    RGBColor(255, 161, 90),
    RGBColor(25, 211, 243),
];

fn chart_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow::anyhow!("chart rendering failed: {err}")
}

/// Close-price line chart titled `"{ticker} Price"`.
pub fn render_price_chart(ticker: &str, history: &[PricePoint]) -> anyhow::Result<String> {
    anyhow::ensure!(!history.is_empty(), "no price history to chart for {ticker}");

    let (min, max) = history
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.close), hi.max(p.close))
        });
    let pad = ((max - min) * 0.05).max(max.abs() * 0.01).max(0.01);
    let last_idx = (history.len() - 1).max(1);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{ticker} Price"), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(36)
            .y_label_area_size(64)
            .build_cartesian_2d(0usize..last_idx, (min - pad)..(max + pad))
            .map_err(chart_err)?;

        let date_label = |idx: &usize| {
            history
                .get(*idx)
                .map(|p| p.date.format("%b %d").to_string())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&date_label)
            .y_desc("Close")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(LineSeries::new(
                history.iter().enumerate().map(|(idx, p)| (idx, p.close)),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

/// Pie of an allocation with a legend. Slices are proportional to the table values as given.
pub fn render_allocation_pie(allocation: &Allocation) -> anyhow::Result<String> {
    let total = allocation.total();
    anyhow::ensure!(
        !allocation.slices.is_empty() && total > 0,
        "allocation for {} has nothing to chart",
        allocation.risk
    );

    let center = (PIE_HEIGHT as i32 / 2, PIE_HEIGHT as i32 / 2 + 10);
    let radius = f64::from(PIE_HEIGHT) / 2.0 - 30.0;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (PIE_WIDTH, PIE_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        root.draw(&Text::new(
            format!("{} Risk Allocation", allocation.risk),
            (12, 8),
            ("sans-serif", 18).into_font(),
        ))
        .map_err(chart_err)?;

        // Clockwise from 12 o'clock.
        let mut start = -PI / 2.0;
        for (idx, slice) in allocation.slices.iter().enumerate() {
            let color = SLICE_COLORS[idx % SLICE_COLORS.len()];
            let sweep = 2.0 * PI * f64::from(slice.percentage) / f64::from(total);

            if sweep > 0.0 {
                root.draw(&Polygon::new(
                    wedge(center, radius, start, start + sweep),
                    color.filled(),
                ))
                .map_err(chart_err)?;
            }
            start += sweep;

            let legend_x = PIE_HEIGHT as i32 + 10;
            let legend_y = 60 + idx as i32 * 26;
            root.draw(&Rectangle::new(
                [(legend_x, legend_y), (legend_x + 14, legend_y + 14)],
                color.filled(),
            ))
            .map_err(chart_err)?;
            root.draw(&Text::new(
                format!("{} ({}%)", slice.asset, slice.percentage),
                (legend_x + 22, legend_y),
                ("sans-serif", 15).into_font(),
            ))
            .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

fn wedge(center: (i32, i32), radius: f64, from: f64, to: f64) -> Vec<(i32, i32)> {
    // About one vertex per degree keeps full circles smooth.
    let steps = ((to - from) / (PI / 180.0)).ceil().max(1.0) as usize;
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for step in 0..=steps {
        let angle = from + (to - from) * step as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        ));
    }
    points
}
