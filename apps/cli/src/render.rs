//! Plain text table of fetched prices.

use chrono::Local;
use token_ticker_market_data::SymbolPrice;

const HEADERS: [&str; 6] = [
    "Symbol",
    "Price",
    "%Change(1h)",
    "%Change(24h)",
    "Source",
    "Updated",
];

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(value) => format!("{:.2}", value),
        None => String::new(),
    }
}

fn row(price: &SymbolPrice) -> [String; 6] {
    [
        price.symbol.clone(),
        price.price.to_string(),
        format_change(price.percent_change_1h),
        format_change(price.percent_change_24h),
        price.source.clone(),
        price
            .updated_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string(),
    ]
}

/// Render prices as an aligned table, one row per price in input order.
pub fn render_table(prices: &[SymbolPrice]) -> String {
    let rows: Vec<[String; 6]> = prices.iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");

    let mut out = String::new();
    push_line(&mut out, &HEADERS, &widths);
    out.push_str(&separator);
    out.push('\n');
    for cells in &rows {
        push_line(&mut out, cells, &widths);
    }
    out
}

fn push_line<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!(" {:<width$} ", cell.as_ref(), width = width))
        .collect::<Vec<_>>()
        .join("|");
    out.push_str(line.trim_end());
    out.push('\n');
}
