//! Text tables for the ticker page.

use htmlescape::encode_minimal;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use trigger_core::{Rule, Tick};

use crate::state::ControlSnapshot;

#[derive(Tabled)]
struct TickRow {
    #[tabled(rename = "Exchange")]
    exchange: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Bid")]
    bid: String,
    #[tabled(rename = "Ask")]
    ask: String,
    #[tabled(rename = "Last")]
    last: String,
    #[tabled(rename = "Time")]
    datetime: String,
    #[tabled(rename = "Iter")]
    iteration: u64,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Exchange")]
    exchange: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "A")]
    a: String,
    #[tabled(rename = "B")]
    b: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Percent")]
    percent: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "State")]
    state: &'static str,
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Render ticks as a text table, in the order given.
pub fn render_ticks(ticks: &[Tick]) -> String {
    let rows: Vec<TickRow> = ticks
        .iter()
        .map(|t| TickRow {
            exchange: t.market.exchange.to_string(),
            symbol: t.market.symbol.to_string(),
            bid: t.bid.to_string(),
            ask: optional(t.ask),
            last: optional(t.last),
            datetime: t.observed_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            iteration: t.iteration,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

/// Render rules as a text table, in the order given.
pub fn render_rules(rules: &[Rule]) -> String {
    let rows: Vec<RuleRow> = rules
        .iter()
        .map(|r| RuleRow {
            id: r.id.0,
            kind: r.kind.as_str(),
            exchange: r.market.exchange.to_string(),
            symbol: r.market.symbol.to_string(),
            a: r.a.to_string(),
            b: r.b.to_string(),
            amount: optional(r.amount),
            percent: format!("{:.4}", r.percent),
            price: r.price.to_string(),
            state: if r.is_active() { "active" } else { "consumed" },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

/// Full HTML page: status line, tick table and rule table.
pub fn render_ticker_page(snapshot: &ControlSnapshot) -> String {
    let mode = if snapshot.read_only { "read-only" } else { "LIVE" };
    let running = if snapshot.running { "running" } else { "stopped" };

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>trigger-bot</title></head>\n<body>\n\
         <p>mode: {mode} | monitoring: {running} | {generated}</p>\n\
         <h3>Tickers ({tick_count})</h3>\n<pre>{ticks}</pre>\n\
         <h3>Rules ({rule_count})</h3>\n<pre>{rules}</pre>\n\
         </body>\n</html>\n",
        generated = snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        tick_count = snapshot.ticks.len(),
        ticks = encode_minimal(&render_ticks(&snapshot.ticks)),
        rule_count = snapshot.rules.len(),
        rules = encode_minimal(&render_rules(&snapshot.rules)),
    )
}
