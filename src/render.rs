//! Text rendering of projections for chat-style displays.

use chrono::NaiveTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::orderbook::{PriceLevel, Projection};

/// Shown while a session has nothing to publish yet.
pub const WAITING_TEXT: &str = "⏳ Waiting for order book data...";

/// Braille blank, survives whitespace collapsing in chat clients.
const PAD: char = '⠀';
const COLUMN_WIDTH: usize = 12;
const BAR_CELLS: usize = 10;

/// Compact price text.
///
/// Prices above 1 get two decimals and thousands separators. Prices with
/// more than three leading fractional zeros use `0.0{N}digits`, keeping up
/// to five significant digits.
pub fn format_compact_price(price: Decimal) -> String {
    if price > Decimal::ONE {
        return group_thousands(&fixed(price, 2));
    }

    let plain = price.normalize().to_string();
    let Some((_, fraction)) = plain.split_once('.') else {
        return plain;
    };

    let leading_zeros = fraction.chars().take_while(|c| *c == '0').count();
    if leading_zeros > 3 {
        let digits: String = fraction.chars().skip(leading_zeros).take(5).collect();
        return format!("0.0{{{leading_zeros}}}{digits}");
    }

    price
        .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

/// Quantity text: whole units above 100, four decimals otherwise.
pub fn format_quantity(quantity: Decimal) -> String {
    if quantity > Decimal::ONE_HUNDRED {
        group_thousands(&fixed(quantity, 0))
    } else {
        fixed(quantity, 4)
    }
}

/// Render a projection as a two-sided book.
///
/// Asks are listed best-last so both best prices meet at the spread line.
/// `None`, or a view with an empty side, renders [`WAITING_TEXT`].
pub fn format_orderbook(view: Option<&Projection>, depth: usize, at: NaiveTime) -> String {
    let Some(view) = view.filter(|v| !v.asks.is_empty() && !v.bids.is_empty()) else {
        return WAITING_TEXT.to_string();
    };

    let asks: Vec<&PriceLevel> = view.asks.iter().take(depth).collect();
    let bids: Vec<&PriceLevel> = view.bids.iter().take(depth).collect();

    let mut lines = vec![
        format!("📊 {} | {}", view.symbol, at.format("%H:%M:%S")),
        pressure_bar(&asks, &bids),
        String::new(),
        "🔴 SELL (Asks):".to_string(),
    ];
    lines.extend(asks.iter().rev().map(|level| format_row(level)));
    lines.push(String::new());
    lines.push("🟢 BUY (Bids):".to_string());
    lines.extend(bids.iter().map(|level| format_row(level)));

    if let (Some(best_ask), Some(best_bid)) = (asks.first(), bids.first()) {
        if !best_ask.price.is_zero() {
            let spread = (best_ask.price - best_bid.price) / best_ask.price * Decimal::ONE_HUNDRED;
            lines.push(String::new());
            lines.push(format!("Spread: {}%", fixed(spread, 3)));
        }
    }

    lines.join("\n")
}

fn format_row(level: &PriceLevel) -> String {
    let price = format_compact_price(level.price);
    let quantity = format_quantity(level.quantity);
    let notional = group_thousands(&fixed(level.price * level.quantity, 2));
    format!(
        "{price} {}| {quantity} {}| ${notional}",
        padding(&price),
        padding(&quantity)
    )
}

fn padding(cell: &str) -> String {
    let width = COLUMN_WIDTH.saturating_sub(cell.chars().count());
    std::iter::repeat(PAD).take(width).collect()
}

/// Ten cells split by bid share of the displayed volume.
fn pressure_bar(asks: &[&PriceLevel], bids: &[&PriceLevel]) -> String {
    let ask_volume: Decimal = asks.iter().map(|l| l.quantity).sum();
    let bid_volume: Decimal = bids.iter().map(|l| l.quantity).sum();
    let total = ask_volume + bid_volume;
    let total = if total > Decimal::ZERO { total } else { Decimal::ONE };

    let buy = (bid_volume / total * Decimal::TEN)
        .floor()
        .to_usize()
        .unwrap_or(0)
        .min(BAR_CELLS);
    format!("[{}{}]", "🟥".repeat(BAR_CELLS - buy), "🟩".repeat(buy))
}

fn fixed(value: Decimal, dp: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded.to_string()
}

fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}
